//! In-memory stream backed by a `Vec<u8>`.

use std::io;

use crate::error::{StreamError, StreamResult};
use crate::traits::{resolve_seek, ByteStream, SeekOrigin};

/// A growable in-memory byte stream.
///
/// Writing past the end zero-fills any gap and extends the buffer.
#[derive(Clone, Debug, Default)]
pub struct MemoryStream {
    buf: Vec<u8>,
    pos: u64,
    closed: bool,
    read_only: bool,
}

impl MemoryStream {
    /// Create an empty writable stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes, positioned at the start.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buf: bytes,
            ..Self::default()
        }
    }

    /// Wrap existing bytes in a stream that rejects writes.
    pub fn read_only(bytes: Vec<u8>) -> Self {
        Self {
            buf: bytes,
            read_only: true,
            ..Self::default()
        }
    }

    /// Borrow the full buffer regardless of position.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the stream and return its buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn ensure_open(&self) -> StreamResult<()> {
        if self.closed {
            Err(StreamError::Closed)
        } else {
            Ok(())
        }
    }
}

fn out_of_memory() -> StreamError {
    StreamError::Io(io::Error::new(
        io::ErrorKind::OutOfMemory,
        "memory stream cannot grow that far",
    ))
}

impl ByteStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        self.ensure_open()?;
        let len = self.buf.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = buf.len().min(self.buf.len() - start);
        buf[..n].copy_from_slice(&self.buf[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> StreamResult<usize> {
        self.ensure_open()?;
        if self.read_only {
            return Err(StreamError::ReadOnly);
        }
        let start = usize::try_from(self.pos).map_err(|_| StreamError::InvalidSeek {
            offset: i64::MAX,
        })?;
        let end = start.checked_add(data.len()).ok_or_else(out_of_memory)?;
        if end > self.buf.len() {
            self.buf
                .try_reserve(end - self.buf.len())
                .map_err(|_| out_of_memory())?;
            self.buf.resize(end, 0);
        }
        self.buf[start..end].copy_from_slice(data);
        self.pos = end as u64;
        Ok(data.len())
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        self.ensure_open()?;
        self.pos = resolve_seek(self.pos, self.buf.len() as u64, offset, origin)?;
        Ok(self.pos)
    }

    fn size(&self) -> StreamResult<u64> {
        self.ensure_open()?;
        Ok(self.buf.len() as u64)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn clear(&mut self) -> StreamResult<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(StreamError::ReadOnly);
        }
        self.buf.clear();
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ByteStreamExt;

    #[test]
    fn write_then_read_back() {
        let mut s = MemoryStream::new();
        assert_eq!(s.write(b"hello").unwrap(), 5);
        assert_eq!(s.position(), 5);
        assert_eq!(s.size().unwrap(), 5);

        s.set_position(0).unwrap();
        let mut buf = [0u8; 5];
        s.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(s.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn overwrite_in_the_middle_keeps_size() {
        let mut s = MemoryStream::from_bytes(b"abcdef".to_vec());
        s.seek(2, SeekOrigin::Start).unwrap();
        s.write_all(b"XY").unwrap();
        assert_eq!(s.position(), 4);
        assert_eq!(s.as_bytes(), b"abXYef");
        assert_eq!(s.size().unwrap(), 6);
    }

    #[test]
    fn write_past_end_zero_fills() {
        let mut s = MemoryStream::from_bytes(vec![1, 2]);
        s.seek(2, SeekOrigin::End).unwrap();
        s.write_all(&[9]).unwrap();
        assert_eq!(s.as_bytes(), &[1, 2, 0, 0, 9]);
    }

    #[test]
    fn write_after_far_seek_fails_cleanly() {
        let mut s = MemoryStream::from_bytes(vec![1]);
        s.seek(i64::MAX, SeekOrigin::Start).unwrap();
        let err = s.write(b"x").unwrap_err();
        assert!(matches!(
            &err,
            StreamError::Io(e) if e.kind() == std::io::ErrorKind::OutOfMemory
        ));
        assert_eq!(s.as_bytes(), &[1]);
        assert_eq!(s.position(), i64::MAX as u64);
    }

    #[test]
    fn fixed_width_values_are_big_endian() {
        let mut s = MemoryStream::new();
        s.write_u32(0x0102_0304).unwrap();
        s.write_i16(-2).unwrap();
        s.write_f64(1.5).unwrap();
        assert_eq!(&s.as_bytes()[..4], &[1, 2, 3, 4]);
        assert_eq!(&s.as_bytes()[4..6], &[0xFF, 0xFE]);

        s.set_position(0).unwrap();
        assert_eq!(s.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(s.read_i16().unwrap(), -2);
        assert_eq!(s.read_f64().unwrap(), 1.5);
    }

    #[test]
    fn short_read_reports_eof() {
        let mut s = MemoryStream::from_bytes(vec![0, 1]);
        let err = s.read_u32().unwrap_err();
        assert!(matches!(
            err,
            StreamError::UnexpectedEof {
                needed: 4,
                available: 2
            }
        ));
    }

    #[test]
    fn read_only_rejects_writes() {
        let mut s = MemoryStream::read_only(vec![1, 2, 3]);
        assert!(matches!(s.write(b"x"), Err(StreamError::ReadOnly)));
        assert!(matches!(s.clear(), Err(StreamError::ReadOnly)));
        assert_eq!(s.read_u8().unwrap(), 1);
    }

    #[test]
    fn closed_stream_fails_every_operation() {
        let mut s = MemoryStream::from_bytes(vec![1]);
        s.close().unwrap();
        assert!(!s.is_open());
        assert!(matches!(s.read_u8(), Err(StreamError::Closed)));
        assert!(matches!(s.write(b"x"), Err(StreamError::Closed)));
        assert!(matches!(s.size(), Err(StreamError::Closed)));
    }

    #[test]
    fn clear_rewinds() {
        let mut s = MemoryStream::from_bytes(b"data".to_vec());
        s.seek(0, SeekOrigin::End).unwrap();
        s.clear().unwrap();
        assert_eq!(s.size().unwrap(), 0);
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn remaining_tracks_position() {
        let mut s = MemoryStream::from_bytes(vec![0; 10]);
        s.seek(4, SeekOrigin::Start).unwrap();
        assert_eq!(s.remaining(), Some(6));
        assert_eq!(s.read_to_end().unwrap().len(), 6);
        assert_eq!(s.remaining(), Some(0));
    }
}
