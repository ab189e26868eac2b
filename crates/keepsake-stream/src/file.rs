//! File-backed stream.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StreamError, StreamResult};
use crate::traits::{resolve_seek, ByteStream, SeekOrigin};

/// How a [`FileStream`] opens its file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Read/write; fails with [`StreamError::NotFound`] if the file is missing.
    Strict,
    /// Read/write; creates the file if it is missing.
    Permissive,
    /// Read only; fails if the file is missing.
    ReadOnly,
    /// Read/write; creates the file or truncates an existing one.
    Truncate,
}

/// A stream over a file on disk.
#[derive(Debug)]
pub struct FileStream {
    path: PathBuf,
    file: Option<File>,
    pos: u64,
    writable: bool,
}

impl FileStream {
    /// Open `path` according to `mode`.
    pub fn open(path: &Path, mode: OpenMode) -> StreamResult<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        match mode {
            OpenMode::Strict => {
                options.write(true);
            }
            OpenMode::Permissive => {
                options.write(true).create(true);
            }
            OpenMode::ReadOnly => {}
            OpenMode::Truncate => {
                options.write(true).create(true).truncate(true);
            }
        }

        let file = options.open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StreamError::NotFound {
                path: path.to_path_buf(),
            },
            _ => StreamError::Io(e),
        })?;

        debug!(path = %path.display(), ?mode, "opened file stream");
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            pos: 0,
            writable: mode != OpenMode::ReadOnly,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered writes to disk.
    pub fn sync(&mut self) -> StreamResult<()> {
        let file = self.file_mut()?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn file(&self) -> StreamResult<&File> {
        self.file.as_ref().ok_or(StreamError::Closed)
    }

    fn file_mut(&mut self) -> StreamResult<&mut File> {
        self.file.as_mut().ok_or(StreamError::Closed)
    }
}

impl ByteStream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let pos = self.pos;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(pos))?;
        let n = file.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> StreamResult<usize> {
        if !self.writable {
            return Err(StreamError::ReadOnly);
        }
        let pos = self.pos;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(pos))?;
        let n = file.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> StreamResult<u64> {
        let size = self.size()?;
        self.pos = resolve_seek(self.pos, size, offset, origin)?;
        Ok(self.pos)
    }

    fn size(&self) -> StreamResult<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn clear(&mut self) -> StreamResult<()> {
        if !self.writable {
            return Err(StreamError::ReadOnly);
        }
        self.file_mut()?.set_len(0)?;
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        if let Some(mut file) = self.file.take() {
            if self.writable {
                file.flush()?;
            }
            debug!(path = %self.path.display(), "closed file stream");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ByteStreamExt;

    #[test]
    fn strict_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        let err = FileStream::open(&path, OpenMode::Strict).unwrap_err();
        assert!(matches!(err, StreamError::NotFound { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn permissive_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.bin");
        let mut s = FileStream::open(&path, OpenMode::Permissive).unwrap();
        s.write_u64(7).unwrap();
        s.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), 7u64.to_be_bytes());
    }

    #[test]
    fn disk_roundtrip_with_seek() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        {
            let mut s = FileStream::open(&path, OpenMode::Permissive).unwrap();
            s.write_all(b"0123456789").unwrap();
            s.seek(-4, SeekOrigin::End).unwrap();
            s.write_all(b"AB").unwrap();
            assert_eq!(s.size().unwrap(), 10);
        }
        let mut s = FileStream::open(&path, OpenMode::Strict).unwrap();
        assert_eq!(s.read_to_end().unwrap(), b"012345AB89");
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.bin");
        std::fs::write(&path, b"abc").unwrap();
        let mut s = FileStream::open(&path, OpenMode::ReadOnly).unwrap();
        assert!(matches!(s.write(b"x"), Err(StreamError::ReadOnly)));
        assert!(matches!(s.clear(), Err(StreamError::ReadOnly)));
        assert_eq!(s.read_u8().unwrap(), b'a');
    }

    #[test]
    fn closed_stream_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("closed.bin");
        let mut s = FileStream::open(&path, OpenMode::Permissive).unwrap();
        s.close().unwrap();
        s.close().unwrap();
        assert!(!s.is_open());
        assert!(matches!(s.write(b"x"), Err(StreamError::Closed)));
    }

    #[test]
    fn truncate_discards_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bin");
        std::fs::write(&path, b"old content").unwrap();
        let s = FileStream::open(&path, OpenMode::Truncate).unwrap();
        assert_eq!(s.size().unwrap(), 0);
    }
}
