//! Per-drive CP/M disk parameters, derived the way `alm_generate_drv_param_hdrs`
//! derives them from the values a config `[Disk n]` section supplies.

/// Whether a drive is shared read/write across all users (`Public`),
/// shared read-only (`PublicOnly`), or gives each user code its own
/// private image (`Private`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirKind {
    Private,
    Public,
    PublicOnly,
}

/// The CP/M disk parameter block, plus the extra bookkeeping Almmmost
/// derives from it (record ranges, block width). Field names follow
/// `struct drive_param_t` where they overlap.
#[derive(Debug, Clone, Copy)]
pub struct DiskParams {
    /// Sectors per track.
    pub spt: u16,
    /// Block shift factor: block size = `128 << bsf`.
    pub bsf: u8,
    /// Block mask: `(1 << bsf) - 1`.
    pub blm: u8,
    /// Extent mask.
    pub exm: u8,
    /// Highest valid data block number.
    pub dbm: u16,
    /// Highest valid directory entry number.
    pub dbl: u16,
    /// Number of allocation blocks reserved for the directory (`ALx`).
    pub dir_alx: u8,
    /// Directory check vector size (0 for a fixed disk).
    pub cks: u16,
    /// Reserved (boot/partition) tracks.
    pub res_tracks: u16,
    pub is_floppy: bool,
    /// Number of private directories (user slots), for `Private` drives.
    pub dirs: u32,
    pub kind: DirKind,
}

impl DiskParams {
    /// Block size in bytes: `128 << bsf`.
    pub fn block_size(&self) -> u32 {
        128u32 << self.bsf
    }

    /// True if block numbers need 16 bits to represent (`dbm >= 256`).
    pub fn wide_blocks(&self) -> bool {
        self.dbm >= 256
    }

    /// Records per physical extent: `(exm + 1) * 128`.
    pub fn extent_records(&self) -> u32 {
        (self.exm as u32 + 1) * 128
    }

    /// Records per allocation block: `block_size / 128`.
    pub fn records_per_block(&self) -> u32 {
        self.block_size() / 128
    }

    /// Total number of directory entries: `dbl + 1`.
    pub fn dir_entry_count(&self) -> u32 {
        self.dbl as u32 + 1
    }

    /// Number of allocation blocks reserved for the directory (`ALx`).
    pub fn directory_blocks(&self) -> u32 {
        self.dir_alx as u32
    }

    /// First record of the directory region: the reserved boot tracks,
    /// `res_tracks * spt`.
    pub fn dir_rec_min(&self) -> u32 {
        self.res_tracks as u32 * self.spt as u32
    }

    /// Last usable record of the directory region (inclusive):
    /// `dir_rec_min + DBL/4 + 1`.
    pub fn dir_rec_max(&self) -> u32 {
        self.dir_rec_min() + self.dbl as u32 / 4 + 1
    }

    /// First record of the data region.
    pub fn data_rec_min(&self) -> u32 {
        self.dir_rec_max() + 1
    }

    /// Last usable record of the data region (inclusive).
    pub fn data_rec_max(&self) -> u32 {
        (self.dbm as u32 + 1) * self.records_per_block() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DiskParams {
        // Matches the "U(0)" example from the original drive parameter
        // comments: SPT=0x40 BSF=5 BLM=0x1F EXM=1 DBM=0x727 DBL=0x7F
        // ALx=16 CKS=0 RES=2.
        DiskParams {
            spt: 0x40,
            bsf: 5,
            blm: 0x1F,
            exm: 1,
            dbm: 0x727,
            dbl: 0x7F,
            dir_alx: 16,
            cks: 0,
            res_tracks: 2,
            is_floppy: false,
            dirs: 0,
            kind: DirKind::Public,
        }
    }

    #[test]
    fn block_size_matches_bsf() {
        assert_eq!(sample().block_size(), 4096);
    }

    #[test]
    fn narrow_blocks_below_256() {
        let mut params = sample();
        params.dbm = 0x00AA;
        assert!(!params.wide_blocks());
        params.dbm = 0x0727;
        assert!(params.wide_blocks());
    }

    #[test]
    fn extent_records_from_exm() {
        assert_eq!(sample().extent_records(), 256);
    }

    #[test]
    fn directory_region_precedes_data_region() {
        let params = sample();
        assert!(params.dir_rec_max() < params.data_rec_min());
        assert_eq!(params.data_rec_min(), params.dir_rec_max() + 1);
    }

    #[test]
    fn dir_rec_min_follows_reserved_tracks() {
        // The spec's own S1-S6 worked example: RES=2, SPT=64 -> dir_rec_min=128.
        let mut params = sample();
        params.res_tracks = 2;
        params.spt = 64;
        assert_eq!(params.dir_rec_min(), 128);
    }

    #[test]
    fn dir_rec_max_follows_dbl_over_four() {
        let mut params = sample();
        params.res_tracks = 0;
        params.spt = 0;
        params.dbl = 7;
        assert_eq!(params.dir_rec_max(), 2);
    }
}
