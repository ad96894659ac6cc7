use crate::FCB_SIZE;

/// The 36-byte CP/M File Control Block, as carried on the wire after the
/// 10-byte request header on file operations that need one.
///
/// Field layout matches `struct cpm_fcb_t` exactly; `al` carries the
/// allocated block list in whichever width [`crate::blocks`] says the drive
/// uses.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, bytemuck::Zeroable, bytemuck::AnyBitPattern, bytemuck::NoUninit)]
pub struct Fcb {
    /// 0 = default drive, 1-16 = drive A-P.
    pub drv: u8,
    pub fname: [u8; 8],
    /// fext[0]/fext[1] high bit carry the read-only/system attribute bits.
    pub fext: [u8; 3],
    /// Extent number, 0-31.
    pub curext: u8,
    /// Reserved for the system; round-tripped unchanged.
    pub s1: u8,
    /// Extent number high byte ("module number").
    pub s2: u8,
    /// Record count within the current extent, 0-128.
    pub reccnt: u8,
    /// Allocated block numbers for the current extent.
    pub al: [u8; 16],
    /// Current record within the extent, 0-127.
    pub currec: u8,
    /// Random-access record number (24-bit little-endian).
    pub rrec: [u8; 3],
}

const _: () = assert!(core::mem::size_of::<Fcb>() == FCB_SIZE);

impl Fcb {
    pub fn from_bytes(bytes: &[u8; FCB_SIZE]) -> Self {
        *bytemuck::from_bytes(bytes)
    }

    pub fn to_bytes(&self) -> [u8; FCB_SIZE] {
        *bytemuck::bytes_of(self).first_chunk().expect("Fcb is FCB_SIZE bytes")
    }

    /// Full extent number: `(s2 * 32) + (curext & 0x1F)`.
    pub fn full_extent(&self) -> u32 {
        (self.s2 as u32) * 32 + (self.curext as u32 & 0x1F)
    }

    /// Physical extent number, the logical extent divided down by the
    /// extent mask: `full_extent / (exm + 1)`.
    pub fn physical_extent(&self, exm: u8) -> u32 {
        self.full_extent() / (exm as u32 + 1)
    }

    /// The logical extent within a physical extent group: `curext & exm`.
    pub fn logical_extent(&self, exm: u8) -> u8 {
        self.curext & exm
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

    pub fn rand_record(&self) -> u32 {
        crate::endian::get_zint24(&self.rrec)
    }

    pub fn set_rand_record(&mut self, value: u32) {
        crate::endian::set_zint24(&mut self.rrec, value);
    }
}

/// The 36-byte rename FCB pair: a source name/drive and a destination
/// name/drive, used only by BDOS 23 (Rename).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, bytemuck::Zeroable, bytemuck::AnyBitPattern, bytemuck::NoUninit)]
pub struct FcbRename {
    pub drv: u8,
    pub sfname: [u8; 8],
    pub sfext: [u8; 3],
    pub padding: [u8; 4],
    pub ddrv: u8,
    pub dfname: [u8; 8],
    pub dfext: [u8; 3],
    pub padding2: [u8; 8],
}

const _: () = assert!(core::mem::size_of::<FcbRename>() == FCB_SIZE);

impl FcbRename {
    pub fn from_bytes(bytes: &[u8; FCB_SIZE]) -> Self {
        *bytemuck::from_bytes(bytes)
    }

    pub fn to_bytes(&self) -> [u8; FCB_SIZE] {
        *bytemuck::bytes_of(self).first_chunk().expect("FcbRename is FCB_SIZE bytes")
    }
}
