//! Boot-loader / OS-image dispatch.
//!
//! Interface only: the bit content of a real bootloader or OS image isn't
//! part of the kept source (`almmmost_osload.c`'s `bootinfo[]` tables are
//! populated from image files named in the `[Client OSTYPE n]` config
//! sections, which this port doesn't reproduce). [`BootImageSource`] is the
//! shape the dispatcher needs; [`DefaultBootSource`] is a documented stub.

pub const BOOTLOADER_SIZE: usize = 128;
pub const DATA_SIZE: usize = 128;

/// Supplies the bytes a Boot ((1,'L')) request sends back.
pub trait BootImageSource: Send {
    /// The fixed-size bootloader image for a client (OS) type. `None` if
    /// no bootloader is configured for that type.
    fn bootloader(&self, ostype: u8) -> Option<[u8; BOOTLOADER_SIZE]>;

    /// `sects + 2` records of the OS image for a client type, starting at
    /// `recnum * 128`. `None` if no OS image is configured for that type.
    fn os_image(&self, ostype: u8, recnum: u8, sects: u8) -> Option<Vec<u8>>;
}

/// A stub source with no real OS images loaded: `bootloader` returns a
/// fixed filler pattern, `os_image` returns zeroed records of the
/// requested length. Good enough to exercise the dispatch path; a real
/// deployment supplies its own `BootImageSource` loaded from the
/// `[Client OSTYPE n]` image files.
pub struct DefaultBootSource;

impl BootImageSource for DefaultBootSource {
    fn bootloader(&self, _ostype: u8) -> Option<[u8; BOOTLOADER_SIZE]> {
        Some([0u8; BOOTLOADER_SIZE])
    }

    fn os_image(&self, _ostype: u8, _recnum: u8, sects: u8) -> Option<Vec<u8>> {
        Some(vec![0u8; (sects as usize + 2) * DATA_SIZE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almmmost_common::wire::BootRequest;

    #[test]
    fn bootloader_pattern_is_recognized() {
        let bytes = [1u8, b'L', 0, 0, 0, 0, 4, 5, 6, 7];
        let req = BootRequest::from_bytes(&bytes);
        assert!(req.wants_bootloader());
    }

    #[test]
    fn non_pattern_bytes_select_os_image() {
        let bytes = [1u8, b'L', 0, 0, 3, 0, 0, 0, 0, 0];
        let req = BootRequest::from_bytes(&bytes);
        assert!(!req.wants_bootloader());
    }

    #[test]
    fn default_source_returns_fixed_size_os_image() {
        let source = DefaultBootSource;
        let image = source.os_image(0, 0, 3).unwrap();
        assert_eq!(image.len(), (3 + 2) * DATA_SIZE);
    }
}
