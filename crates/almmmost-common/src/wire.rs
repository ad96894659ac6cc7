//! The fixed-size request/response headers of the TVSP wire protocol.
//!
//! All structures here are `#[repr(C, packed)]` and zero-copy via
//! `bytemuck`, the same way the teacher represents on-disk structures.
//! Sizes match `TVSP_REQ_SZ`/`TVSP_RESP_SZ` (10/4 bytes) exactly.

pub const REQ_SZ: usize = 10;
pub const RESP_SZ: usize = 4;
pub const DATA_SZ: usize = 128;

/// First byte of every request frame.
pub const SOR1: u8 = 1;
pub const SOR0: u8 = 0;

/// `req` byte values that route a frame to a subsystem.
pub mod req_kind {
    pub const BOOT: u8 = b'L';
    pub const CHECK: u8 = b'C';
    pub const FILEOP: u8 = b'F';
    pub const BREAK_SPOOL: u8 = b'N';
    pub const READ_SECTOR: u8 = b'R';
    pub const WRITE_SECTOR: u8 = b'W';
}

/// `subreq` byte values for a Check request.
pub mod check_kind {
    pub const SPOOL_DRIVE: u8 = b'P';
    pub const AUTOLOAD_PROC: u8 = b'S';
    pub const GENREV: u8 = b'R';
    pub const HIJACK: u8 = b'H';
}

pub mod write_type {
    pub const ASYNC: u8 = 0;
    pub const SYNC: u8 = 1;
    pub const DESTROY_BLOCK: u8 = 2;
}

macro_rules! wire_struct {
    ($name:ident, $size:expr, { $($field:ident : $ty:ty),+ $(,)? }) => {
        #[repr(C, packed)]
        #[derive(Debug, Clone, Copy, bytemuck::Zeroable, bytemuck::AnyBitPattern, bytemuck::NoUninit)]
        pub struct $name {
            $(pub $field: $ty),+
        }

        const _: () = assert!(core::mem::size_of::<$name>() == $size);

        impl $name {
            pub fn from_bytes(bytes: &[u8; $size]) -> Self {
                *bytemuck::from_bytes(bytes)
            }

            pub fn to_bytes(&self) -> [u8; $size] {
                *bytemuck::bytes_of(self).first_chunk().expect(concat!(stringify!($name), " size mismatch"))
            }
        }
    };
}

wire_struct!(SpoolRequest, REQ_SZ, {
    sor: u8,
    req: u8,
    x: [u8; 2],
    sizel: u8,
    sizeh: u8,
    y: [u8; 2],
    iobyte: u8,
    z: u8,
});

wire_struct!(CheckRequest, REQ_SZ, {
    sor: u8,
    req: u8,
    drv: u8,
    subreq: u8,
    y: [u8; 6],
});

wire_struct!(FileRequest, REQ_SZ, {
    sor: u8,
    req: u8,
    logdrv: u8,
    bdosfunc: u8,
    usrcode: u8,
    filenum: [u8; 2],
    curbdisk: u8,
    curbfunc: u8,
    x: u8,
});

wire_struct!(FileResponse, RESP_SZ, {
    fileno: [u8; 2],
    retcode: u8,
    err: u8,
});

wire_struct!(DiskRequest, REQ_SZ, {
    sor: u8,
    req: u8,
    ndisk: u8,
    trk8: u8,
    sectl: u8,
    secth: u8,
    trk16l: u8,
    trk16h: u8,
    wrtype: u8,
    selflg: u8,
});

wire_struct!(IpcResponse, RESP_SZ, {
    retcode: u8,
    x: u8,
    errcode: u8,
    err: u8,
});

wire_struct!(BootRequest, REQ_SZ, {
    sor: u8,
    req: u8,
    usr: u8,
    cboot: u8,
    sects: u8,
    recnum: u8,
    x: [u8; 4],
});

impl BootRequest {
    /// True when bytes 6-9 carry the fixed `[4, 5, 6, 7]` pattern that
    /// selects the bootloader rather than an OS image transfer.
    pub fn wants_bootloader(&self) -> bool {
        self.x == [4, 5, 6, 7]
    }
}

impl FileRequest {
    pub fn file_num(&self) -> u16 {
        crate::endian::get_zint16(&self.filenum)
    }

    pub fn set_file_num(&mut self, value: u16) {
        crate::endian::set_zint16(&mut self.filenum, value)
    }
}

impl FileResponse {
    pub fn file_num(&self) -> u16 {
        crate::endian::get_zint16(&self.fileno)
    }

    pub fn set_file_num(&mut self, value: u16) {
        crate::endian::set_zint16(&mut self.fileno, value)
    }
}

impl DiskRequest {
    /// 16-bit track number, reassembled from the two legacy request forms
    /// (`trk8` alone, or `trk16l`/`trk16h` when `trk8` is used as a flag).
    pub fn track(&self) -> u16 {
        crate::endian::get_zint16(&[self.trk16l, self.trk16h])
    }

    pub fn sector(&self) -> u16 {
        crate::endian::get_zint16(&[self.sectl, self.secth])
    }
}
