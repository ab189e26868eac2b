//! Stream over a raw OS handle such as a pipe.
//!
//! Handles are sequential: they cannot seek, have no size, and cannot be
//! cleared. The position counts bytes transferred in either direction.

use std::io::{Read, Write};

use crate::error::{StreamError, StreamResult};
use crate::traits::{ByteStream, SeekOrigin};

/// A non-seekable stream over any bidirectional reader/writer.
#[derive(Debug)]
pub struct HandleStream<H> {
    handle: Option<H>,
    pos: u64,
}

impl<H: Read + Write> HandleStream<H> {
    /// Wrap an open handle.
    pub fn new(handle: H) -> Self {
        Self {
            handle: Some(handle),
            pos: 0,
        }
    }

    /// Recover the handle, if the stream is still open.
    pub fn into_inner(self) -> Option<H> {
        self.handle
    }

    fn handle_mut(&mut self) -> StreamResult<&mut H> {
        self.handle.as_mut().ok_or(StreamError::Closed)
    }
}

#[cfg(unix)]
impl HandleStream<std::fs::File> {
    /// Take ownership of a raw file descriptor (pipe end, socket, tty).
    pub fn from_fd(fd: std::os::fd::OwnedFd) -> Self {
        Self::new(std::fs::File::from(fd))
    }
}

impl<H: Read + Write> ByteStream for HandleStream<H> {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let n = self.handle_mut()?.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        let n = self.handle_mut()?.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, _offset: i64, _origin: SeekOrigin) -> StreamResult<u64> {
        self.handle_mut()?;
        Err(StreamError::Unsupported("seek"))
    }

    fn size(&self) -> StreamResult<u64> {
        if self.handle.is_none() {
            return Err(StreamError::Closed);
        }
        Err(StreamError::Unsupported("size"))
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn clear(&mut self) -> StreamResult<()> {
        self.handle_mut()?;
        Err(StreamError::Unsupported("clear"))
    }

    fn close(&mut self) -> StreamResult<()> {
        if let Some(mut handle) = self.handle.take() {
            handle.flush()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::traits::ByteStreamExt;

    #[test]
    fn transfers_bytes_and_counts_position() {
        let mut s = HandleStream::new(Cursor::new(Vec::new()));
        s.write_u16(0xBEEF).unwrap();
        assert_eq!(s.position(), 2);
        let inner = s.into_inner().unwrap().into_inner();
        assert_eq!(inner, vec![0xBE, 0xEF]);

        let mut s = HandleStream::new(Cursor::new(inner));
        assert_eq!(s.read_u16().unwrap(), 0xBEEF);
    }

    #[test]
    fn seek_and_size_are_unsupported() {
        let mut s = HandleStream::new(Cursor::new(Vec::new()));
        assert!(matches!(
            s.seek(0, SeekOrigin::Start),
            Err(StreamError::Unsupported("seek"))
        ));
        assert!(matches!(s.size(), Err(StreamError::Unsupported("size"))));
        assert_eq!(s.remaining(), None);
    }

    #[test]
    fn closed_handle_reports_closed() {
        let mut s = HandleStream::new(Cursor::new(vec![1u8]));
        s.close().unwrap();
        assert!(matches!(s.read_u8(), Err(StreamError::Closed)));
        assert!(matches!(s.size(), Err(StreamError::Closed)));
    }
}
