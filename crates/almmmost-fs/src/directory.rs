//! The directory engine: reading, writing, and searching the fixed-size
//! directory region of a drive image.
//!
//! Four 32-byte directory entries pack into each 128-byte record, so entry
//! `n` lives at record `dir_rec_min + n/4`, byte offset `(n % 4) * 32`
//! within it — the same arithmetic `alm_file_finddentry` does in the
//! original.

use almmmost_common::{DirEntry, DIRENTRY_SIZE};
use almmmost_core::record::{RecordIo, RECORD_SIZE};

use crate::error::{FsError, FsResult};
use crate::params::DiskParams;

const ENTRIES_PER_RECORD: u32 = (RECORD_SIZE / DIRENTRY_SIZE) as u32;

pub struct DirectoryEngine<'a> {
    params: &'a DiskParams,
}

impl<'a> DirectoryEngine<'a> {
    pub fn new(params: &'a DiskParams) -> Self {
        Self { params }
    }

    pub fn entry_count(&self) -> u32 {
        self.params.dir_entry_count()
    }

    fn entry_location(&self, index: u32) -> (u32, usize) {
        let record = self.params.dir_rec_min() + index / ENTRIES_PER_RECORD;
        let offset = (index % ENTRIES_PER_RECORD) as usize * DIRENTRY_SIZE;
        (record, offset)
    }

    pub fn read_entry(&self, storage: &mut dyn RecordIo, index: u32) -> FsResult<DirEntry> {
        let (record, offset) = self.entry_location(index);
        let mut buf = [0u8; RECORD_SIZE];
        storage.read_record(record, &mut buf)?;
        let bytes: &[u8; DIRENTRY_SIZE] = buf[offset..offset + DIRENTRY_SIZE]
            .try_into()
            .expect("slice is DIRENTRY_SIZE bytes");
        Ok(DirEntry::from_bytes(bytes))
    }

    pub fn write_entry(&self, storage: &mut dyn RecordIo, index: u32, entry: &DirEntry) -> FsResult<()> {
        let (record, offset) = self.entry_location(index);
        let mut buf = [0u8; RECORD_SIZE];
        storage.read_record(record, &mut buf)?;
        buf[offset..offset + DIRENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        storage.write_record(record, &buf)?;
        Ok(())
    }

    /// Every occupied (non-free) entry, paired with its index.
    pub fn occupied_entries(&self, storage: &mut dyn RecordIo) -> FsResult<Vec<(u32, DirEntry)>> {
        let mut out = Vec::new();
        for index in 0..self.entry_count() {
            let entry = self.read_entry(storage, index)?;
            if !entry.is_free() {
                out.push((index, entry));
            }
        }
        Ok(out)
    }

    /// The first free (`0xE5`) entry slot, if any.
    pub fn find_free(&self, storage: &mut dyn RecordIo) -> FsResult<Option<u32>> {
        for index in 0..self.entry_count() {
            if self.read_entry(storage, index)?.is_free() {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// All directory entries (any extent) belonging to one file, ordered
    /// by extent number (spec §8 invariant: extents for a file are stored
    /// and returned in ascending physical-extent order).
    pub fn find_file_extents(
        &self,
        storage: &mut dyn RecordIo,
        user: u8,
        fname: &[u8; 8],
        fext: &[u8; 3],
    ) -> FsResult<Vec<(u32, DirEntry)>> {
        let mut entries = self
            .occupied_entries(storage)?
            .into_iter()
            .filter(|(_, e)| e.matches_name(user, fname, fext))
            .collect::<Vec<_>>();
        entries.sort_by_key(|(_, e)| e.physical_extent(self.params.exm));
        Ok(entries)
    }

    /// Entries matching a `?`-wildcarded search pattern, any user code
    /// (matching `alm_file_dosearch`'s documented "drive = ? means search
    /// for any user #, including e5's" behavior when `user` is `None`).
    pub fn search_first(
        &self,
        storage: &mut dyn RecordIo,
        user: Option<u8>,
        pattern_fname: &[u8; 8],
        pattern_fext: &[u8; 3],
    ) -> FsResult<Option<(u32, DirEntry)>> {
        for index in 0..self.entry_count() {
            let entry = self.read_entry(storage, index)?;
            if entry.is_free() {
                continue;
            }
            if let Some(user) = user {
                if entry.user != user {
                    continue;
                }
            }
            let ext = entry.plain_ext();
            if almmmost_common::name::matches(pattern_fname, pattern_fext, &entry.fname, &ext) {
                return Ok(Some((index, entry)));
            }
        }
        Ok(None)
    }

    pub fn delete_entry(&self, storage: &mut dyn RecordIo, index: u32) -> FsResult<()> {
        self.write_entry(storage, index, &DirEntry::free())
    }

    pub fn allocate_entry(&self, storage: &mut dyn RecordIo) -> FsResult<u32> {
        self.find_free(storage)?.ok_or(FsError::DirFull)
    }
}
