//! Block-number encoding within a directory entry's 16-byte `blknums`/`al`
//! field.
//!
//! A drive with fewer than 256 data blocks (`DBM < 256`) packs sixteen
//! 8-bit block numbers into the field. A drive with 256 or more data
//! blocks needs 16 bits per block number, so the field holds only eight
//! little-endian `u16` slots — the CP/M convention is to leave the upper
//! eight bytes of the 16-byte field unused in that case, not to grow the
//! entry.

/// Maximum block numbers a directory entry can reference, 8-bit encoding.
pub const BLOCKS_PER_ENTRY_NARROW: usize = 16;
/// Maximum block numbers a directory entry can reference, 16-bit encoding.
pub const BLOCKS_PER_ENTRY_WIDE: usize = 8;

/// Decodes the block list from a raw 16-byte field, given whether the
/// drive uses wide (16-bit) block numbers.
pub fn decode_blocks(raw: &[u8; 16], wide: bool) -> Vec<u16> {
    if wide {
        raw.chunks_exact(2)
            .take(BLOCKS_PER_ENTRY_WIDE)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    } else {
        raw.iter().map(|&b| b as u16).collect()
    }
}

/// Encodes a block list into a raw 16-byte field, given whether the drive
/// uses wide (16-bit) block numbers. Panics if `blocks` is longer than the
/// encoding can hold, which would indicate a miscomputed extent size
/// upstream.
pub fn encode_blocks(blocks: &[u16], wide: bool) -> [u8; 16] {
    let mut raw = [0u8; 16];
    if wide {
        assert!(blocks.len() <= BLOCKS_PER_ENTRY_WIDE);
        for (i, block) in blocks.iter().enumerate() {
            let bytes = block.to_le_bytes();
            raw[i * 2] = bytes[0];
            raw[i * 2 + 1] = bytes[1];
        }
    } else {
        assert!(blocks.len() <= BLOCKS_PER_ENTRY_NARROW);
        for (i, block) in blocks.iter().enumerate() {
            assert!(*block <= 0xFF, "narrow drive block number overflowed a byte");
            raw[i] = *block as u8;
        }
    }
    raw
}

/// How many blocks a single directory-entry extent group can reference,
/// which bounds an extent's record count (`(exm+1)*128` records per
/// physical extent, each block covering `blk_size/128` records).
pub fn blocks_capacity(wide: bool) -> usize {
    if wide {
        BLOCKS_PER_ENTRY_WIDE
    } else {
        BLOCKS_PER_ENTRY_NARROW
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_round_trips() {
        let blocks = [1u16, 2, 3, 255];
        let raw = encode_blocks(&blocks, false);
        assert_eq!(&decode_blocks(&raw, false)[..4], &blocks);
    }

    #[test]
    fn wide_round_trips() {
        let blocks = [1u16, 2000, 3, 65000];
        let raw = encode_blocks(&blocks, true);
        assert_eq!(&decode_blocks(&raw, true)[..4], &blocks);
    }

    #[test]
    #[should_panic]
    fn narrow_rejects_block_over_255() {
        encode_blocks(&[300], false);
    }
}
