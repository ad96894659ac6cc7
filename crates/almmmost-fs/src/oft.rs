//! The open-file table: in-memory state for every file a client currently
//! has open, keyed by a 16-bit handle.
//!
//! Handle `0` is reserved to mean "no hint" on the wire (`filenum` in a
//! `tvsp_file_request`): some clients (PIP chief among them) don't always
//! echo back the handle Open/Make returned, so [`OpenFileTable::resolve_handle`]
//! falls back to matching on (port, disk, user, name) when the hint is
//! absent or stale.

use std::collections::HashMap;

use almmmost_common::DirEntry;

/// In-memory state for one open file.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub handle: u16,
    pub port: u8,
    pub disk: u8,
    /// Directory slot this file's image lives in: the private directory
    /// index for a `Private` drive, ignored for `Public`/`PublicOnly`.
    pub slot: u8,
    pub user: u8,
    pub fname: [u8; 8],
    pub fext: [u8; 3],
    pub is_ro: bool,
    /// Size of the file in 128-byte records, kept current as writes
    /// extend it.
    pub size_records: u32,
    /// Directory-entry extents backing this file, ordered by physical
    /// extent number (spec §8 invariant 2).
    pub extents: Vec<(u32, DirEntry)>,
}

#[derive(Debug, Default)]
pub struct OpenFileTable {
    next_handle: u16,
    files: HashMap<u16, OpenFile>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            files: HashMap::new(),
        }
    }

    /// Assigns a fresh handle and inserts the entry. Handle 0 is never
    /// assigned, since it is the wire's "no hint" sentinel.
    pub fn insert(&mut self, mut file: OpenFile) -> u16 {
        let handle = self.alloc_handle();
        file.handle = handle;
        self.files.insert(handle, file);
        handle
    }

    fn alloc_handle(&mut self) -> u16 {
        loop {
            self.next_handle = self.next_handle.wrapping_add(1);
            if self.next_handle == 0 {
                self.next_handle = 1;
            }
            if !self.files.contains_key(&self.next_handle) {
                return self.next_handle;
            }
        }
    }

    pub fn get(&self, handle: u16) -> Option<&OpenFile> {
        self.files.get(&handle)
    }

    pub fn get_mut(&mut self, handle: u16) -> Option<&mut OpenFile> {
        self.files.get_mut(&handle)
    }

    pub fn close(&mut self, handle: u16) -> Option<OpenFile> {
        self.files.remove(&handle)
    }

    /// Closes every file a port has open, returning them (used by the
    /// console's `closeport` and by client disconnect handling).
    pub fn close_all_for_port(&mut self, port: u8) -> Vec<OpenFile> {
        let handles: Vec<u16> = self
            .files
            .iter()
            .filter(|(_, f)| f.port == port)
            .map(|(&h, _)| h)
            .collect();
        handles.into_iter().filter_map(|h| self.files.remove(&h)).collect()
    }

    /// Closes every file open anywhere on a disk (used by `reopen`/`filein`
    /// before swapping a drive's backing image).
    pub fn close_all_for_disk(&mut self, disk: u8) -> Vec<OpenFile> {
        let handles: Vec<u16> = self
            .files
            .iter()
            .filter(|(_, f)| f.disk == disk)
            .map(|(&h, _)| h)
            .collect();
        handles.into_iter().filter_map(|h| self.files.remove(&h)).collect()
    }

    /// Resolves a client-supplied handle hint to the open-file entry it
    /// actually refers to.
    ///
    /// If `hint` is non-zero and names a file this port owns matching
    /// `disk`/`user`/`fname`/`fext`, it's used directly. Otherwise this
    /// falls back to a linear scan for any file this port has open on that
    /// disk/user/name (the leaky-client path): if exactly one matches, its
    /// handle is returned and becomes the hint for subsequent calls from
    /// that client.
    pub fn resolve_handle(
        &self,
        port: u8,
        hint: u16,
        disk: u8,
        user: u8,
        fname: &[u8; 8],
        fext: &[u8; 3],
    ) -> Option<u16> {
        if hint != 0 {
            if let Some(file) = self.files.get(&hint) {
                if file.port == port && file.disk == disk && file.user == user {
                    return Some(hint);
                }
            }
        }
        self.files
            .iter()
            .find(|(_, f)| f.port == port && f.disk == disk && f.user == user && &f.fname == fname && &f.fext == fext)
            .map(|(&h, _)| h)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(port: u8, disk: u8, user: u8, fname: &[u8; 8]) -> OpenFile {
        OpenFile {
            handle: 0,
            port,
            disk,
            slot: user,
            user,
            fname: *fname,
            fext: [b'T', b'X', b'T'],
            is_ro: false,
            size_records: 0,
            extents: Vec::new(),
        }
    }

    #[test]
    fn never_hands_out_handle_zero() {
        let mut oft = OpenFileTable::new();
        let handle = oft.insert(entry(1, 0, 0, b"FOO     "));
        assert_ne!(handle, 0);
    }

    #[test]
    fn resolve_handle_falls_back_without_hint() {
        let mut oft = OpenFileTable::new();
        let handle = oft.insert(entry(1, 0, 0, b"FOO     "));
        let resolved = oft
            .resolve_handle(1, 0, 0, 0, b"FOO     ", &[b'T', b'X', b'T'])
            .expect("should resolve via name match");
        assert_eq!(resolved, handle);
    }

    #[test]
    fn resolve_handle_rejects_hint_from_another_port() {
        let mut oft = OpenFileTable::new();
        let handle = oft.insert(entry(1, 0, 0, b"FOO     "));
        assert_eq!(oft.resolve_handle(2, handle, 0, 0, b"FOO     ", &[b'T', b'X', b'T']), None);
    }

    #[test]
    fn close_all_for_port_only_touches_that_port() {
        let mut oft = OpenFileTable::new();
        oft.insert(entry(1, 0, 0, b"FOO     "));
        let h2 = oft.insert(entry(2, 0, 0, b"BAR     "));
        let closed = oft.close_all_for_port(1);
        assert_eq!(closed.len(), 1);
        assert!(oft.get(h2).is_some());
    }
}
