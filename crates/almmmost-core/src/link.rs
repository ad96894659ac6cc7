//! The per-port byte channel a client talks through.
//!
//! On real hardware this is an SDLC frame over RS-422, serviced by the
//! `tvi_sdlc` kernel module through `ioctl`s (see `alm_dev_*` in the original
//! C source). Bit-level framing, clocking and the kernel interface are out
//! of scope here; [`LinkChannel`] is the interface a dispatcher needs against
//! that layer, modeled closely on the shape of `alm_dev_check_ready` /
//! `alm_dev_recv` / `alm_dev_send` / `alm_dev_reset`.

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("port not ready")]
    NotReady,
    #[error("frame too short: expected at least {expected}, got {got}")]
    ShortFrame { expected: usize, got: usize },
    #[error("underlying device error: {0}")]
    Device(String),
}

pub type LinkResult<T> = Result<T, LinkError>;

/// A framed, per-port byte channel.
///
/// Implementations are free to represent "ready" however the transport
/// needs to; a dispatcher polls `check_ready` once per port per iteration of
/// its round-robin loop and only calls `recv_frame` when it returns `true`,
/// mirroring the poll loop in `almmmost.c`'s `main`.
pub trait LinkChannel {
    /// Returns true if a full frame is waiting to be read without blocking.
    fn check_ready(&mut self) -> LinkResult<bool>;

    /// Reads exactly `len` bytes, blocking until they arrive.
    fn recv_frame(&mut self, len: usize) -> LinkResult<Vec<u8>>;

    /// Writes `data` as a single frame.
    fn send_frame(&mut self, data: &[u8]) -> LinkResult<()>;

    /// Resets the channel (equivalent to the original's post-error re-sync).
    fn reset(&mut self) -> LinkResult<()>;
}
