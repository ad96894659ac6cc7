//! CP/M's two file attribute bits.
//!
//! Unlike FAT, CP/M has no dedicated attribute byte: the read-only and
//! system bits are stashed in the high bit of `fext[0]`/`fext[1]`
//! respectively, with the low 7 bits of each byte carrying the extension
//! character. `Attributes` models the two flags on their own; callers
//! extract/apply them against a raw `fext` via [`Attributes::from_fext`] /
//! [`Attributes::apply_to_fext`].

bitflags::bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        /// fext[0] bit 7
        const READ_ONLY = 0x01;
        /// fext[1] bit 7
        const SYSTEM = 0x02;
    }
}

impl Attributes {
    pub fn from_fext(fext: &[u8; 3]) -> Self {
        let mut attrs = Attributes::empty();
        if fext[0] & 0x80 != 0 {
            attrs |= Attributes::READ_ONLY;
        }
        if fext[1] & 0x80 != 0 {
            attrs |= Attributes::SYSTEM;
        }
        attrs
    }

    /// Returns the extension with attribute bits stripped, as ASCII bytes.
    pub fn plain_ext(fext: &[u8; 3]) -> [u8; 3] {
        [fext[0] & 0x7F, fext[1] & 0x7F, fext[2] & 0x7F]
    }

    /// Applies this attribute set onto an extension's high bits, leaving the
    /// low 7 bits of each byte (the extension characters) untouched.
    pub fn apply_to_fext(&self, fext: &mut [u8; 3]) {
        fext[0] = (fext[0] & 0x7F) | if self.contains(Attributes::READ_ONLY) { 0x80 } else { 0 };
        fext[1] = (fext[1] & 0x7F) | if self.contains(Attributes::SYSTEM) { 0x80 } else { 0 };
    }
}
