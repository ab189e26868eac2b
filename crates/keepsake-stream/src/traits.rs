//! The [`ByteStream`] contract shared by every backend, and the
//! [`ByteStreamExt`] helpers for fixed-size values.

use crate::error::{StreamError, StreamResult};

/// Origin for [`ByteStream::seek`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Offset is measured from the first byte.
    Start,
    /// Offset is relative to the current position.
    Current,
    /// Offset is relative to the current size.
    End,
}

/// Position-addressable byte storage.
///
/// All backends share these rules:
/// - Every successful read, write, and seek moves the position.
/// - Writing past the end extends the stream; seeking past the end is allowed
///   and takes effect on the next write.
/// - Once closed, every operation fails with [`StreamError::Closed`].
pub trait ByteStream {
    /// Read up to `buf.len()` bytes. Returns the number of bytes read; `0`
    /// means the end of the stream.
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize>;

    /// Write `buf` at the current position. Returns the number of bytes
    /// written.
    fn write(&mut self, buf: &[u8]) -> StreamResult<usize>;

    /// Move the position and return the new absolute position.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64>;

    /// Total size in bytes.
    fn size(&self) -> StreamResult<u64>;

    /// Current absolute position.
    fn position(&self) -> u64;

    /// Truncate the stream to zero bytes and rewind.
    fn clear(&mut self) -> StreamResult<()>;

    /// Release the backing resource. Closing twice is a no-op.
    fn close(&mut self) -> StreamResult<()>;

    /// Returns `true` until [`close`](Self::close) is called.
    fn is_open(&self) -> bool;

    /// Set the absolute position.
    fn set_position(&mut self, position: u64) -> StreamResult<()> {
        let offset = i64::try_from(position).map_err(|_| StreamError::InvalidSeek {
            offset: i64::MAX,
        })?;
        self.seek(offset, SeekOrigin::Start).map(|_| ())
    }

    /// Bytes between the position and the end, when the size is known.
    fn remaining(&self) -> Option<u64> {
        self.size()
            .ok()
            .map(|size| size.saturating_sub(self.position()))
    }

    /// Fill `buf` completely or fail with [`StreamError::UnexpectedEof`].
    fn read_exact(&mut self, buf: &mut [u8]) -> StreamResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(StreamError::UnexpectedEof {
                    needed: buf.len(),
                    available: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Write all of `buf`.
    fn write_all(&mut self, buf: &[u8]) -> StreamResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(StreamError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "stream accepted no bytes",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Read everything from the position to the end.
    fn read_to_end(&mut self) -> StreamResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}

macro_rules! fixed_width {
    ($(($read:ident, $write:ident, $ty:ty)),* $(,)?) => {
        $(
            #[doc = concat!("Read a big-endian `", stringify!($ty), "`.")]
            fn $read(&mut self) -> StreamResult<$ty> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                self.read_exact(&mut buf)?;
                Ok(<$ty>::from_be_bytes(buf))
            }

            #[doc = concat!("Write a big-endian `", stringify!($ty), "`.")]
            fn $write(&mut self, value: $ty) -> StreamResult<()> {
                self.write_all(&value.to_be_bytes())
            }
        )*
    };
}

/// Fixed-size value helpers. All multi-byte values are big-endian.
pub trait ByteStreamExt: ByteStream {
    fixed_width! {
        (read_u8, write_u8, u8),
        (read_u16, write_u16, u16),
        (read_u32, write_u32, u32),
        (read_u64, write_u64, u64),
        (read_i8, write_i8, i8),
        (read_i16, write_i16, i16),
        (read_i32, write_i32, i32),
        (read_i64, write_i64, i64),
        (read_f32, write_f32, f32),
        (read_f64, write_f64, f64),
    }
}

impl<S: ByteStream + ?Sized> ByteStreamExt for S {}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        (**self).write(buf)
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        (**self).seek(offset, origin)
    }

    fn size(&self) -> StreamResult<u64> {
        (**self).size()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn clear(&mut self) -> StreamResult<()> {
        (**self).clear()
    }

    fn close(&mut self) -> StreamResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Resolve a seek request against a known position and size.
pub(crate) fn resolve_seek(
    position: u64,
    size: u64,
    offset: i64,
    origin: SeekOrigin,
) -> StreamResult<u64> {
    let base = match origin {
        SeekOrigin::Start => 0i128,
        SeekOrigin::Current => position as i128,
        SeekOrigin::End => size as i128,
    };
    let target = base + offset as i128;
    if target < 0 || target > u64::MAX as i128 {
        return Err(StreamError::InvalidSeek { offset });
    }
    Ok(target as u64)
}
