//! Error types for tree encoding and decoding.

use keepsake_stream::StreamError;
use keepsake_tree::{ErrorKind, NodePath, TreeError};
use thiserror::Error;

/// Errors raised by tree writers and readers.
///
/// Every decoding error aborts the read of the whole tree; nothing partially
/// decoded is returned.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Structurally invalid input at a known node.
    #[error("malformed node at {path}: {reason}")]
    Format { path: NodePath, reason: String },

    /// A binary node carried a type byte outside the known set.
    #[error("unknown type tag 0x{tag:02x} at {path}")]
    UnknownTag { path: NodePath, tag: u8 },

    /// The stream ended inside a node, or a declared length exceeds what is left.
    #[error("stream truncated at {path}")]
    Truncated { path: NodePath },

    /// The binary header does not start with the expected magic.
    #[error("invalid magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u16),

    /// The CRC32 trailer does not match the node bytes.
    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// A text stream failed to lex or parse.
    #[error("syntax error at line {line}, column {column} ({path}): {reason}")]
    Syntax {
        line: usize,
        column: usize,
        path: NodePath,
        reason: String,
    },

    /// A tree being written cannot be represented in the encoding.
    #[error("cannot encode node at {path}: {reason}")]
    Unencodable { path: NodePath, reason: String },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
}

impl CodecError {
    pub(crate) fn format(path: &NodePath, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Stream(_) => ErrorKind::Io,
            Self::Tree(err) => err.kind(),
            Self::Unencodable { .. } => ErrorKind::Usage,
            _ => ErrorKind::Format,
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
