use crate::DIRENTRY_SIZE;

/// The 32-byte on-disk directory entry, matching `struct cpm_direntry_t`
/// exactly. `user == 0xE5` marks a free/deleted entry.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, bytemuck::Zeroable, bytemuck::AnyBitPattern, bytemuck::NoUninit)]
pub struct DirEntry {
    pub user: u8,
    pub fname: [u8; 8],
    pub fext: [u8; 3],
    /// Extent number, low byte, 0-31.
    pub ext_l: u8,
    /// Reserved.
    pub s1: u8,
    /// Extent number, high byte ("module number" / S2).
    pub ext_h: u8,
    /// Record count within the extent.
    pub reccnt: u8,
    /// Allocated block numbers, 8-bit or 16-bit little-endian depending on
    /// the drive's block count (see [`crate::blocks`]).
    pub blknums: [u8; 16],
}

const _: () = assert!(core::mem::size_of::<DirEntry>() == DIRENTRY_SIZE);

/// Sentinel `user` byte marking a free directory entry.
pub const FREE_ENTRY_USER: u8 = 0xE5;

impl DirEntry {
    pub fn from_bytes(bytes: &[u8; DIRENTRY_SIZE]) -> Self {
        *bytemuck::from_bytes(bytes)
    }

    pub fn to_bytes(&self) -> [u8; DIRENTRY_SIZE] {
        *bytemuck::bytes_of(self)
            .first_chunk()
            .expect("DirEntry is DIRENTRY_SIZE bytes")
    }

    pub fn is_free(&self) -> bool {
        self.user == FREE_ENTRY_USER
    }

    pub fn free() -> Self {
        Self {
            user: FREE_ENTRY_USER,
            ..bytemuck::Zeroable::zeroed()
        }
    }

    /// Full extent number: `(ext_h * 32) + (ext_l & 0x1F)`.
    pub fn full_extent(&self) -> u32 {
        (self.ext_h as u32) * 32 + (self.ext_l as u32 & 0x1F)
    }

    /// Physical extent group this entry belongs to, given the drive's
    /// extent mask.
    pub fn physical_extent(&self, exm: u8) -> u32 {
        self.full_extent() / (exm as u32 + 1)
    }

    /// Total records covered by this extent entry:
    /// `(ext_l & exm) * 128 + reccnt`.
    pub fn record_count(&self, exm: u8) -> u32 {
        (self.ext_l as u32 & exm as u32) * 128 + self.reccnt as u32
    }

    pub fn attributes(&self) -> crate::Attributes {
        crate::Attributes::from_fext(&self.fext)
    }

    pub fn set_attributes(&mut self, attrs: crate::Attributes) {
        attrs.apply_to_fext(&mut self.fext);
    }

    pub fn plain_ext(&self) -> [u8; 3] {
        crate::Attributes::plain_ext(&self.fext)
    }

    /// Matches this entry's name/extension/user against an FCB, ignoring
    /// attribute bits, for the purposes of "is this the same file".
    pub fn matches_name(&self, user: u8, fname: &[u8; 8], fext: &[u8; 3]) -> bool {
        self.user == user && self.fname == *fname && self.plain_ext() == crate::Attributes::plain_ext(fext)
    }
}
