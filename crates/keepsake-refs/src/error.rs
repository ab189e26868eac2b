//! Error types for reference registration and lookup.

use keepsake_tree::{ErrorKind, RefKey};
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefError {
    /// The type tag is not usable as an identity tag.
    #[error("invalid type tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },

    /// The tag was never registered with `store_type`.
    #[error("type tag {tag:?} is not tracked")]
    UntrackedType { tag: String },

    /// A live object is already registered under this key.
    #[error("reference {key} is already registered")]
    AlreadyRegistered { key: RefKey },

    /// Every id of the tag has been handed out.
    #[error("no free ids left for type tag {tag:?}")]
    IdsExhausted { tag: String },

    /// The registered object is not of the requested type.
    #[error("reference {key} holds a {found}, expected {expected}")]
    TypeMismatch {
        key: RefKey,
        expected: &'static str,
        found: &'static str,
    },
}

impl RefError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            _ => ErrorKind::Usage,
        }
    }
}

/// Convenience type alias for reference operations.
pub type RefResult<T> = Result<T, RefError>;
