//! Foundational traits and error types for Almmmost.
//!
//! This crate has no knowledge of CP/M directory layout or the TVSP wire
//! protocol; it only provides the seams other crates build on: the byte
//! channel abstraction a port talks through ([`link`]), the sector-addressed
//! storage abstraction a disk image is read/written through ([`record`]), and
//! the top-level error type both compose into.

pub mod endian;
pub mod link;
pub mod record;

pub use link::LinkChannel;
pub use record::RecordIo;

/// Top-level error type for the Almmmost server.
///
/// Protocol-facing code should prefer the `almmmost-common` error codes
/// (`MmmErr`/`RetCode`) when reporting failures back to a client; this type
/// is for errors that abort a server operation before a wire-level error
/// code can even be chosen (link failure, I/O failure, configuration
/// failure).
#[derive(Debug, thiserror::Error)]
pub enum AlmError {
    #[error("link error on port {port}: {source}")]
    Link {
        port: u8,
        #[source]
        source: LinkError,
    },
    #[error("record I/O error: {0}")]
    Record(#[from] RecordError),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type AlmResult<T> = Result<T, AlmError>;

pub use link::LinkError;
pub use record::RecordError;
