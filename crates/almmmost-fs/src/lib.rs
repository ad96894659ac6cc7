//! The shared-disk, CP/M-compatible file engine Almmmost serves to TS-8xx
//! clients.
//!
//! This crate has no knowledge of the wire protocol or of ports; it is
//! driven by a request dispatcher (in `almmmost-server`) that decodes
//! frames into the calls on [`engine::FileEngine`] below, and encodes this
//! crate's results back into `tvsp_file_response`/FCB bytes.

pub mod bam;
pub mod directory;
pub mod engine;
pub mod error;
pub mod image;
pub mod oft;
pub mod params;

pub use engine::FileEngine;
pub use error::{FsError, FsResult};
pub use image::{FileImage, ImageStore, MemImage};
pub use params::{DirKind, DiskParams};
