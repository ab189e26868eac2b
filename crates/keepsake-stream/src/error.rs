//! Error types for byte stream operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading, writing, or seeking a stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream has been closed and can no longer be used.
    #[error("stream is closed")]
    Closed,

    /// The stream was opened read-only.
    #[error("stream is read-only")]
    ReadOnly,

    /// A strict open was requested for a file that does not exist.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Fewer bytes were available than a fixed-size read required.
    #[error("unexpected end of stream: needed {needed} bytes, only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// A seek would have moved the position before the start of the stream.
    #[error("invalid seek to offset {offset}")]
    InvalidSeek { offset: i64 },

    /// The backend does not support the operation (e.g. seeking a pipe).
    #[error("operation not supported by this stream: {0}")]
    Unsupported(&'static str),

    /// I/O error from the underlying file or handle.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Returns `true` if this error reports a short read.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

/// Result alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;
