//! The disk image store: maps a `(disk, directory slot)` pair onto record
//! storage, the way `alm_img_readrec`/`alm_img_writerec` map `(disk, user)`
//! onto one of a drive's backing image files.
//!
//! A `Private` drive keeps one backing image per directory slot (so each
//! user code, or rather each slot a port has selected via
//! `port.drive_dir[disk]`, is isolated); a `Public`/`PublicOnly` drive has
//! exactly one backing image shared by everyone, in slot 0.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use almmmost_core::record::{RecordError, RecordIo, RecordReader, RecordResult, RECORD_SIZE};

use crate::bam::Bam;
use crate::error::{FsError, FsResult};
use crate::params::{DirKind, DiskParams};

/// A `RecordIo` backed by a real file on the host filesystem.
pub struct FileImage {
    file: File,
    read_only: bool,
}

impl FileImage {
    pub fn open(path: &std::path::Path, read_only: bool) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)?;
        Ok(Self { file, read_only })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl RecordReader for FileImage {
    fn read_record(&mut self, record: u32, buf: &mut [u8; RECORD_SIZE]) -> RecordResult<()> {
        self.file
            .seek(SeekFrom::Start(record as u64 * RECORD_SIZE as u64))
            .map_err(|_| RecordError::Io)?;
        self.file.read_exact(buf).map_err(|_| RecordError::Io)
    }
}

impl RecordIo for FileImage {
    fn write_record(&mut self, record: u32, buf: &[u8; RECORD_SIZE]) -> RecordResult<()> {
        if self.read_only {
            return Err(RecordError::Io);
        }
        self.file
            .seek(SeekFrom::Start(record as u64 * RECORD_SIZE as u64))
            .map_err(|_| RecordError::Io)?;
        self.file.write_all(buf).map_err(|_| RecordError::Io)
    }
}

/// A backing image held entirely in memory, used by tests and by
/// `CHARGEN.SYS`-style synthesized content.
pub type MemImage = Vec<u8>;

struct DiskImage {
    params: DiskParams,
    slots: Vec<Box<dyn RecordIo + Send>>,
    bam: Option<Bam>,
}

/// Owns every drive's backing storage and, for public drives, the block
/// allocation map derived from it.
#[derive(Default)]
pub struct ImageStore {
    disks: Vec<DiskImage>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self { disks: Vec::new() }
    }

    /// Registers a new drive, returning its disk number. `slots` must have
    /// exactly one entry for `Public`/`PublicOnly` drives, and one entry
    /// per configured private directory otherwise.
    pub fn add_disk(&mut self, params: DiskParams, slots: Vec<Box<dyn RecordIo + Send>>) -> u8 {
        let bam = match params.kind {
            DirKind::Private => None,
            DirKind::Public | DirKind::PublicOnly => Some(Bam::new(&params)),
        };
        self.disks.push(DiskImage { params, slots, bam });
        (self.disks.len() - 1) as u8
    }

    fn disk(&self, disk: u8) -> FsResult<&DiskImage> {
        self.disks.get(disk as usize).ok_or(FsError::BadDrive(disk))
    }

    fn disk_mut(&mut self, disk: u8) -> FsResult<&mut DiskImage> {
        self.disks.get_mut(disk as usize).ok_or(FsError::BadDrive(disk))
    }

    pub fn params(&self, disk: u8) -> FsResult<&DiskParams> {
        Ok(&self.disk(disk)?.params)
    }

    fn slot_index(image: &DiskImage, slot: u8) -> usize {
        match image.params.kind {
            DirKind::Private => slot as usize,
            DirKind::Public | DirKind::PublicOnly => 0,
        }
    }

    pub fn read_record(&mut self, disk: u8, slot: u8, record: u32) -> FsResult<[u8; RECORD_SIZE]> {
        let image = self.disk_mut(disk)?;
        let index = Self::slot_index(image, slot);
        let backing = image
            .slots
            .get_mut(index)
            .ok_or(FsError::BadDrive(disk))?;
        let mut buf = [0u8; RECORD_SIZE];
        backing.read_record(record, &mut buf)?;
        Ok(buf)
    }

    pub fn write_record(&mut self, disk: u8, slot: u8, record: u32, buf: &[u8; RECORD_SIZE]) -> FsResult<()> {
        let image = self.disk_mut(disk)?;
        let index = Self::slot_index(image, slot);
        let backing = image
            .slots
            .get_mut(index)
            .ok_or(FsError::BadDrive(disk))?;
        backing.write_record(record, buf)?;
        Ok(())
    }

    /// Returns the backing storage for a disk/slot pair as a trait object,
    /// for the directory engine to operate on directly.
    pub fn storage(&mut self, disk: u8, slot: u8) -> FsResult<&mut dyn RecordIo> {
        let image = self.disk_mut(disk)?;
        let index = Self::slot_index(image, slot);
        image
            .slots
            .get_mut(index)
            .map(|b| b.as_mut() as &mut dyn RecordIo)
            .ok_or(FsError::BadDrive(disk))
    }

    pub fn bam_mut(&mut self, disk: u8) -> FsResult<&mut Bam> {
        self.disk_mut(disk)?.bam.as_mut().ok_or(FsError::BadDrive(disk))
    }

    pub fn has_bam(&self, disk: u8) -> FsResult<bool> {
        Ok(self.disk(disk)?.bam.is_some())
    }

    /// Replaces a drive's backing image (the `reopen` console command /
    /// `alm_img_reopen`). Callers must have already closed every open file
    /// on this disk; replacing a live backing store would desync the BAM
    /// and any open file's extents.
    ///
    /// Rejects `Public`/`PublicOnly` drives outright with `BadDrive`: a
    /// shared directory's BAM is built once at startup from a scan of the
    /// original image, and spec.md §9 documents this exact path
    /// (`alm_img_reopen`) as one the original's own check order leaves
    /// unreachable for public drives. See DESIGN.md's Open Question 1 for
    /// why this port resolves it as an outright rejection rather than
    /// inventing a close-and-rebuild path the original never finished.
    pub fn reopen(&mut self, disk: u8, slot: u8, backing: Box<dyn RecordIo + Send>) -> FsResult<()> {
        let image = self.disk_mut(disk)?;
        if !matches!(image.params.kind, DirKind::Private) {
            return Err(FsError::BadDrive(disk));
        }
        let index = Self::slot_index(image, slot);
        if index >= image.slots.len() {
            return Err(FsError::BadDrive(disk));
        }
        image.slots[index] = backing;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kind: DirKind) -> DiskParams {
        DiskParams {
            spt: 26,
            bsf: 0,
            blm: 0,
            exm: 0,
            dbm: 9,
            dbl: 7,
            dir_alx: 2,
            cks: 0,
            res_tracks: 0,
            is_floppy: true,
            dirs: 1,
            kind,
        }
    }

    fn backing() -> Box<dyn RecordIo + Send> {
        Box::new(vec![0u8; 10 * RECORD_SIZE])
    }

    #[test]
    fn reopen_rejects_public_drives() {
        let mut store = ImageStore::new();
        let disk = store.add_disk(params(DirKind::Public), vec![backing()]);
        assert!(store.reopen(disk, 0, backing()).is_err());
    }

    #[test]
    fn reopen_rejects_public_only_drives() {
        let mut store = ImageStore::new();
        let disk = store.add_disk(params(DirKind::PublicOnly), vec![backing()]);
        assert!(store.reopen(disk, 0, backing()).is_err());
    }

    #[test]
    fn reopen_replaces_a_private_slot() {
        let mut store = ImageStore::new();
        let disk = store.add_disk(params(DirKind::Private), vec![backing()]);
        assert!(store.reopen(disk, 0, backing()).is_ok());
    }
}
