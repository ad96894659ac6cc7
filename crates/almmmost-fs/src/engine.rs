//! The file engine: the 13 BDOS-shaped operations a request dispatcher
//! drives, built on top of the image store, BAM, directory engine and
//! open-file table.
//!
//! Record addressing within a file works the same way `alm_file_doread`/
//! `alm_file_dowrite` walk it in the original: a file-relative record
//! number is split into (physical extent, block within extent, record
//! within block), the matching directory entry supplies the block list for
//! that extent, and the block number plus the within-block offset gives an
//! absolute disk record.

use almmmost_common::{blocks, Attributes, DirEntry};
use almmmost_core::record::RECORD_SIZE;

use crate::directory::DirectoryEngine;
use crate::error::{FsError, FsResult};
use crate::image::ImageStore;
use crate::oft::{OpenFile, OpenFileTable};
use crate::params::DiskParams;

pub struct FileEngine {
    pub images: ImageStore,
    pub oft: OpenFileTable,
}

impl FileEngine {
    pub fn new() -> Self {
        Self {
            images: ImageStore::new(),
            oft: OpenFileTable::new(),
        }
    }

    fn params(&self, disk: u8) -> FsResult<DiskParams> {
        self.images.params(disk).copied()
    }

    /// Maps a file-relative record number to an absolute disk record,
    /// using the file's extents (already sorted by physical extent order).
    fn resolve_record(params: &DiskParams, extents: &[(u32, DirEntry)], record: u32) -> FsResult<u32> {
        let extent_records = params.extent_records();
        let records_per_block = params.records_per_block();
        let physical_extent = record / extent_records;
        let (_, entry) = extents
            .iter()
            .find(|(_, e)| e.physical_extent(params.exm) == physical_extent)
            .ok_or(FsError::UnwrittenExtent)?;
        let offset_in_extent = record % extent_records;
        let block_index = (offset_in_extent / records_per_block) as usize;
        let block_list = blocks::decode_blocks(&entry.blknums, params.wide_blocks());
        let block = *block_list.get(block_index).ok_or(FsError::UnwrittenData)?;
        if block == 0 {
            return Err(FsError::UnwrittenData);
        }
        let offset_in_block = offset_in_extent % records_per_block;
        Ok(block as u32 * records_per_block + offset_in_block + params.dir_rec_min())
    }

    /// Opens an existing file (BDOS 15) or creates a new one (BDOS 22,
    /// `make == true`). Returns the assigned handle.
    pub fn open(
        &mut self,
        port: u8,
        disk: u8,
        slot: u8,
        user: u8,
        fname: &[u8; 8],
        fext: &[u8; 3],
        make: bool,
    ) -> FsResult<u16> {
        let params = self.params(disk)?;
        let mut extents = {
            let dir = DirectoryEngine::new(&params);
            let storage = self.images.storage(disk, slot)?;
            dir.find_file_extents(storage, user, fname, fext)?
        };

        if extents.is_empty() {
            if !make {
                return Err(FsError::NotFound);
            }
            let dir = DirectoryEngine::new(&params);
            let storage = self.images.storage(disk, slot)?;
            let index = dir.allocate_entry(storage)?;
            let mut entry = DirEntry::free();
            entry.user = user;
            entry.fname = *fname;
            entry.fext = *fext;
            dir.write_entry(storage, index, &entry)?;
            extents = vec![(index, entry)];
        } else if make {
            return Err(FsError::DirFull);
        }

        let size_records: u32 = extents.iter().map(|(_, e)| e.record_count(params.exm)).sum();
        let is_ro = extents[0].1.attributes().contains(Attributes::READ_ONLY);

        let handle = self.oft.insert(OpenFile {
            handle: 0,
            port,
            disk,
            slot,
            user,
            fname: *fname,
            fext: *fext,
            is_ro,
            size_records,
            extents,
        });
        Ok(handle)
    }

    pub fn close(&mut self, handle: u16) -> FsResult<()> {
        self.oft.close(handle).ok_or(FsError::BadHandle(handle))?;
        Ok(())
    }

    fn read_at(&mut self, handle: u16, record: u32) -> FsResult<[u8; RECORD_SIZE]> {
        let file = self.oft.get(handle).ok_or(FsError::BadHandle(handle))?;
        let (disk, slot, extents) = (file.disk, file.slot, file.extents.clone());
        let params = self.params(disk)?;
        let disk_record = Self::resolve_record(&params, &extents, record)?;
        self.images.read_record(disk, slot, disk_record)
    }

    pub fn read_rand(&mut self, handle: u16, record: u32) -> FsResult<[u8; RECORD_SIZE]> {
        self.read_at(handle, record)
    }

    /// Writes a record, allocating a new block/extent entry as needed when
    /// `record` lies past the file's current allocation. `zero_fill`
    /// implements Write Rand Zero Block (BDOS 40): when a fresh block has
    /// to be allocated to satisfy the write, every other record in that
    /// block is zeroed rather than left as whatever garbage the backing
    /// image held.
    fn write_at(&mut self, handle: u16, record: u32, data: &[u8; RECORD_SIZE], zero_fill: bool) -> FsResult<()> {
        let file = self.oft.get(handle).ok_or(FsError::BadHandle(handle))?;
        if file.is_ro {
            return Err(FsError::ReadOnly);
        }
        let (disk, slot, extents) = (file.disk, file.slot, file.extents.clone());
        let params = self.params(disk)?;

        let disk_record = match Self::resolve_record(&params, &extents, record) {
            Ok(r) => r,
            Err(_) => self.allocate_for_record(handle, record, zero_fill)?,
        };

        self.images.write_record(disk, slot, disk_record, data)?;

        if let Some(file) = self.oft.get_mut(handle) {
            if record + 1 > file.size_records {
                file.size_records = record + 1;
            }
        }
        Ok(())
    }

    /// Grows a file's allocation so that `record` is covered, allocating a
    /// new directory-entry extent if the current physical extent isn't
    /// open yet, and a new data block if the record falls past the
    /// extent's currently-allocated blocks. Returns the absolute disk
    /// record the caller should write to.
    fn allocate_for_record(&mut self, handle: u16, record: u32, zero_fill: bool) -> FsResult<u32> {
        let file = self.oft.get(handle).ok_or(FsError::BadHandle(handle))?;
        let (disk, slot, user, fname, fext) = (file.disk, file.slot, file.user, file.fname, file.fext);
        let params = self.params(disk)?;
        if !self.images.has_bam(disk)? {
            return self.allocate_for_record_private(handle, record);
        }

        let extent_records = params.extent_records();
        let records_per_block = params.records_per_block();
        let physical_extent = record / extent_records;
        let wide = params.wide_blocks();

        let existing_index = self
            .oft
            .get(handle)
            .unwrap()
            .extents
            .iter()
            .find(|(_, e)| e.physical_extent(params.exm) == physical_extent)
            .map(|(i, _)| *i);

        let entry_index = match existing_index {
            Some(index) => index,
            None => {
                let dir = DirectoryEngine::new(&params);
                let storage = self.images.storage(disk, slot)?;
                let index = dir.allocate_entry(storage)?;
                let mut entry = DirEntry::free();
                entry.user = user;
                entry.fname = fname;
                entry.fext = fext;
                entry.ext_l = (physical_extent * (params.exm as u32 + 1)) as u8 & 0x1F;
                entry.ext_h = ((physical_extent * (params.exm as u32 + 1)) / 32) as u8;
                dir.write_entry(storage, index, &entry)?;
                if let Some(file) = self.oft.get_mut(handle) {
                    file.extents.push((index, entry));
                }
                index
            }
        };

        let mut entry = {
            let dir = DirectoryEngine::new(&params);
            let storage = self.images.storage(disk, slot)?;
            dir.read_entry(storage, entry_index)?
        };

        let offset_in_extent = record % extent_records;
        let block_index = (offset_in_extent / records_per_block) as usize;
        let mut block_list = blocks::decode_blocks(&entry.blknums, wide);
        while block_list.len() <= block_index {
            block_list.push(0);
        }

        if block_list[block_index] == 0 {
            let new_block = self.images.bam_mut(disk)?.alloc().ok_or(FsError::NoSpace)?;
            block_list[block_index] = new_block;
            if zero_fill {
                let zero = [0u8; RECORD_SIZE];
                let base = new_block as u32 * records_per_block;
                for r in 0..records_per_block {
                    self.images.write_record(disk, slot, base + r, &zero)?;
                }
            }
        }

        entry.blknums = blocks::encode_blocks(&block_list, wide);
        entry.reccnt = ((offset_in_extent + 1) % 128) as u8;

        {
            let dir = DirectoryEngine::new(&params);
            let storage = self.images.storage(disk, slot)?;
            dir.write_entry(storage, entry_index, &entry)?;
        }

        if let Some(file) = self.oft.get_mut(handle) {
            if let Some(cached) = file.extents.iter_mut().find(|(i, _)| *i == entry_index) {
                cached.1 = entry;
            }
        }

        let offset_in_block = offset_in_extent % records_per_block;
        Ok(block_list[block_index] as u32 * records_per_block + offset_in_block + params.dir_rec_min())
    }

    /// Private drives have no shared BAM; blocks are allocated by scanning
    /// the user's own small directory for the lowest unused block number,
    /// since a single-user image never needs cross-user bookkeeping.
    fn allocate_for_record_private(&mut self, handle: u16, record: u32) -> FsResult<u32> {
        let file = self.oft.get(handle).ok_or(FsError::BadHandle(handle))?;
        let (disk, slot) = (file.disk, file.slot);
        let params = self.params(disk)?;
        let used: Vec<u16> = {
            let dir = DirectoryEngine::new(&params);
            let storage = self.images.storage(disk, slot)?;
            dir.occupied_entries(storage)?
                .iter()
                .flat_map(|(_, e)| blocks::decode_blocks(&e.blknums, params.wide_blocks()))
                .collect()
        };
        let directory_blocks = params.directory_blocks() as u16;
        let mut candidate = directory_blocks;
        while used.contains(&candidate) {
            candidate += 1;
        }
        if candidate as u32 > params.dbm as u32 {
            return Err(FsError::NoSpace);
        }
        let records_per_block = params.records_per_block();
        Ok(candidate as u32 * records_per_block + (record % records_per_block) + params.dir_rec_min())
    }

    pub fn write_rand(&mut self, handle: u16, record: u32, data: &[u8; RECORD_SIZE]) -> FsResult<()> {
        self.write_at(handle, record, data, false)
    }

    pub fn write_rand_zero(&mut self, handle: u16, record: u32, data: &[u8; RECORD_SIZE]) -> FsResult<()> {
        self.write_at(handle, record, data, true)
    }

    pub fn search_first(
        &mut self,
        disk: u8,
        slot: u8,
        user: Option<u8>,
        pattern_fname: &[u8; 8],
        pattern_fext: &[u8; 3],
    ) -> FsResult<Option<DirEntry>> {
        let params = self.params(disk)?;
        let dir = DirectoryEngine::new(&params);
        let storage = self.images.storage(disk, slot)?;
        Ok(dir.search_first(storage, user, pattern_fname, pattern_fext)?.map(|(_, e)| e))
    }

    /// True if any port currently has a file open matching `disk`/`user`/
    /// `fname`/`fext` — Delete/Rename/Set Attr all reject rather than
    /// mutate a directory entry a client still has open (spec §8 invariant 7).
    fn is_open(&self, disk: u8, user: u8, fname: &[u8; 8], fext: &[u8; 3]) -> bool {
        self.oft
            .iter()
            .any(|f| f.disk == disk && f.user == user && &f.fname == fname && &f.fext == fext)
    }

    /// Deletes every entry matching the (possibly wildcarded) name,
    /// freeing their blocks, and returns how many entries were removed.
    pub fn delete(
        &mut self,
        disk: u8,
        slot: u8,
        user: u8,
        pattern_fname: &[u8; 8],
        pattern_fext: &[u8; 3],
    ) -> FsResult<u32> {
        let params = self.params(disk)?;
        let has_bam = self.images.has_bam(disk)?;

        let matches: Vec<(u32, DirEntry)> = {
            let dir = DirectoryEngine::new(&params);
            let storage = self.images.storage(disk, slot)?;
            dir.occupied_entries(storage)?
                .into_iter()
                .filter(|(_, e)| {
                    e.user == user && almmmost_common::name::matches(pattern_fname, pattern_fext, &e.fname, &e.plain_ext())
                })
                .collect()
        };

        if matches.iter().any(|(_, e)| self.is_open(disk, user, &e.fname, &e.plain_ext())) {
            return Err(FsError::AlreadyOpen);
        }

        for (index, entry) in &matches {
            if has_bam {
                let block_list = blocks::decode_blocks(&entry.blknums, params.wide_blocks());
                let bam = self.images.bam_mut(disk)?;
                for block in block_list {
                    if block != 0 {
                        bam.free(block);
                    }
                }
            }
            let dir = DirectoryEngine::new(&params);
            let storage = self.images.storage(disk, slot)?;
            dir.delete_entry(storage, *index)?;
        }
        Ok(matches.len() as u32)
    }

    pub fn rename(
        &mut self,
        disk: u8,
        slot: u8,
        user: u8,
        src_fname: &[u8; 8],
        src_fext: &[u8; 3],
        dst_fname: &[u8; 8],
        dst_fext: &[u8; 3],
    ) -> FsResult<()> {
        if dst_fname.contains(&b'?') || dst_fext.contains(&b'?') {
            return Err(FsError::InvalidDestName);
        }
        if self.is_open(disk, user, src_fname, src_fext) {
            return Err(FsError::AlreadyOpen);
        }
        let params = self.params(disk)?;
        let dir = DirectoryEngine::new(&params);
        let storage = self.images.storage(disk, slot)?;
        let extents = dir.find_file_extents(storage, user, src_fname, src_fext)?;
        if extents.is_empty() {
            return Err(FsError::NotFound);
        }
        for (index, mut entry) in extents {
            let attrs = entry.attributes();
            entry.fname = *dst_fname;
            entry.fext = *dst_fext;
            entry.set_attributes(attrs);
            dir.write_entry(storage, index, &entry)?;
        }
        Ok(())
    }

    pub fn set_attr(
        &mut self,
        disk: u8,
        slot: u8,
        user: u8,
        fname: &[u8; 8],
        fext: &[u8; 3],
        attrs: Attributes,
    ) -> FsResult<()> {
        if self.is_open(disk, user, fname, fext) {
            return Err(FsError::AlreadyOpen);
        }
        let params = self.params(disk)?;
        let dir = DirectoryEngine::new(&params);
        let storage = self.images.storage(disk, slot)?;
        let extents = dir.find_file_extents(storage, user, fname, fext)?;
        if extents.is_empty() {
            return Err(FsError::NotFound);
        }
        for (index, mut entry) in extents {
            entry.set_attributes(attrs);
            dir.write_entry(storage, index, &entry)?;
        }
        Ok(())
    }

    /// Returns the file's size in records (BDOS 35 also sets `rrec` to
    /// this value so the client's next Read/Write Rand lands at EOF; that
    /// part is the dispatcher's job once it has this number).
    pub fn get_size(&self, handle: u16) -> FsResult<u32> {
        Ok(self.oft.get(handle).ok_or(FsError::BadHandle(handle))?.size_records)
    }

    /// Set Random Record (BDOS 36): computes the `rrec` value for the
    /// FCB's current `curext`/`s2`/`currec` position, clamped to the
    /// file's current size. `currec == 0x80` is a documented special case
    /// (next free record past the current extent); see DESIGN.md for the
    /// verified formula this implements against the original.
    pub fn set_rand_record(&self, handle: u16, cur_ext: u8, s2: u8, currec: u8) -> FsResult<u32> {
        let file = self.oft.get(handle).ok_or(FsError::BadHandle(handle))?;
        let params = self.params(file.disk)?;
        let fcb_pos = if currec != 0x80 {
            (s2 as u32 * 32 + (cur_ext as u32 & 0x1F)) * 128 + currec as u32
        } else {
            (s2 as u32 * 32 + (cur_ext as u32 & 0x1F) + params.exm as u32 + 1) * 128
        };
        Ok(fcb_pos.min(file.size_records))
    }
}

impl Default for FileEngine {
    fn default() -> Self {
        Self::new()
    }
}
