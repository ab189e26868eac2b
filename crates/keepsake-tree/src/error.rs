use std::fmt;

use thiserror::Error;

use crate::value::{NodeKind, ScalarKind};

/// Errors produced while building or navigating a serialization tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("cannot append a child to a {kind} node")]
    NotAContainer { kind: NodeKind },

    #[error("array of {element} cannot hold a {found} value")]
    ArrayElementMismatch { element: ScalarKind, found: ScalarKind },

    #[error("tree root must be an object node, got {kind}")]
    RootNotObject { kind: NodeKind },

    #[error("invalid node path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}

impl TreeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath { .. } => ErrorKind::Usage,
            _ => ErrorKind::Format,
        }
    }
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Coarse classification shared by every error type in the engine.
///
/// I/O and usage errors abort a session immediately, format errors abort the
/// read of the current tree, and the last two are collected and reported at
/// session end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Format,
    TypeMismatch,
    UnresolvedReference,
    Usage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Io => "io",
            Self::Format => "format",
            Self::TypeMismatch => "type-mismatch",
            Self::UnresolvedReference => "unresolved-reference",
            Self::Usage => "usage",
        })
    }
}
