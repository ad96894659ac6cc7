//! Sector-addressed storage, at CP/M's 128-byte record granularity.
//!
//! Mirrors the shape of `Reader`/`Writer` in the teacher's core crate, but
//! at the record size the wire protocol and on-disk layout actually use
//! (`RECSIZE` = 128 bytes in the original C), rather than a 512-byte disk
//! sector.

pub const RECORD_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record {0} is out of bounds")]
    OutOfBounds(u32),
    #[error("I/O failure reading or writing a record")]
    Io,
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Record-addressed read access to a disk image.
pub trait RecordReader {
    fn read_record(&mut self, record: u32, buf: &mut [u8; RECORD_SIZE]) -> RecordResult<()>;
}

/// Record-addressed read/write access to a disk image.
pub trait RecordIo: RecordReader {
    fn write_record(&mut self, record: u32, buf: &[u8; RECORD_SIZE]) -> RecordResult<()>;
}

impl RecordReader for Vec<u8> {
    fn read_record(&mut self, record: u32, buf: &mut [u8; RECORD_SIZE]) -> RecordResult<()> {
        let offset = record as usize * RECORD_SIZE;
        let slice = self
            .get(offset..offset + RECORD_SIZE)
            .ok_or(RecordError::OutOfBounds(record))?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}

impl RecordIo for Vec<u8> {
    fn write_record(&mut self, record: u32, buf: &[u8; RECORD_SIZE]) -> RecordResult<()> {
        let offset = record as usize * RECORD_SIZE;
        if offset + RECORD_SIZE > self.len() {
            self.resize(offset + RECORD_SIZE, 0);
        }
        self[offset..offset + RECORD_SIZE].copy_from_slice(buf);
        Ok(())
    }
}
