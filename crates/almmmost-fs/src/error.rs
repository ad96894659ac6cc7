use almmmost_common::{MmmErr, RetCode};

/// Errors the file engine can hit while servicing an operation.
///
/// Every variant knows how to render itself as the wire-level
/// `(retcode, err)` pair a `tvsp_file_response` carries, so a dispatcher
/// never has to reverse-engineer a status code from a `match`.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no free directory entry on disk")]
    DirFull,
    #[error("file not found")]
    NotFound,
    #[error("file or drive is read-only")]
    ReadOnly,
    #[error("record {0} is past the end of the disk")]
    PastEndOfDisk(u32),
    #[error("no free data block available")]
    NoSpace,
    #[error("attempted read past the end of the file")]
    UnwrittenData,
    #[error("record lies in an unallocated part of the extent")]
    UnwrittenExtent,
    #[error("unknown file handle {0}")]
    BadHandle(u16),
    #[error("too many files open on port {0}")]
    TooManyOpenFiles(u8),
    #[error("invalid drive number {0}")]
    BadDrive(u8),
    #[error("file is currently open on another port")]
    AlreadyOpen,
    #[error("destination name contains a wildcard")]
    InvalidDestName,
    #[error("underlying storage error: {0}")]
    Storage(#[from] almmmost_core::RecordError),
}

impl FsError {
    /// The `retcode` byte a `tvsp_file_response` should carry for this
    /// error, per `RETCODE_*` in the original C.
    pub fn ret_code(&self) -> RetCode {
        match self {
            FsError::UnwrittenData => RetCode::UnwrittenData,
            FsError::UnwrittenExtent => RetCode::UnwrittenExtent,
            FsError::DirFull => RetCode::DirFull,
            FsError::PastEndOfDisk(_) => RetCode::PastEndOfDisk,
            _ => RetCode::Misc,
        }
    }

    /// The `err` byte a `tvsp_file_response` should carry for this error,
    /// per `MMMERR_*` in the original C.
    pub fn mmm_err(&self) -> MmmErr {
        match self {
            FsError::NotFound | FsError::BadHandle(_) | FsError::AlreadyOpen | FsError::InvalidDestName => MmmErr::BadFile,
            FsError::ReadOnly => MmmErr::WriteProtect,
            FsError::NoSpace => MmmErr::NoSpace,
            FsError::BadDrive(_) => MmmErr::DriveType,
            FsError::Storage(_) => MmmErr::TransferOut,
            _ => MmmErr::Ok,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
