//! Error types for store and restore sessions.

use std::path::PathBuf;

use keepsake_codec::CodecError;
use keepsake_props::PropError;
use keepsake_refs::RefError;
use keepsake_stream::StreamError;
use keepsake_tree::{ErrorKind, NodePath, TreeError};
use thiserror::Error;

use crate::report::SessionReport;
use crate::state::SessionState;

/// Errors raised by the [`Serializer`](crate::Serializer).
///
/// Everything except [`Incomplete`](Self::Incomplete) aborts the session at
/// the point it is raised. `Incomplete` is returned after a restore walk that
/// finished but collected type mismatches or unresolved references.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// A session was started while another one is in flight.
    #[error("serializer is busy: a {state} session is already in progress")]
    Reentrant { state: SessionState },

    #[error("object at {path} declares an empty class name")]
    MissingClassName { path: NodePath },

    /// The object handed to restore is not of the class the tree describes.
    #[error("class mismatch at {path}: tree holds {found}, object is {expected}")]
    ClassMismatch {
        path: NodePath,
        expected: String,
        found: String,
    },

    /// A by-reference property points at an object the manager does not know.
    #[error("{path}: target of type {type_name} is not registered with the reference manager")]
    UnregisteredReference {
        path: NodePath,
        type_name: &'static str,
    },

    /// By-value storage reached an object that is already being inlined.
    #[error("{path}: cycle while storing by value")]
    Cycle { path: NodePath },

    /// A shared object could not be borrowed because it is in use.
    #[error("{path}: shared object of type {type_name} is already borrowed")]
    Borrowed {
        path: NodePath,
        type_name: &'static str,
    },

    #[error("no node at {path}")]
    NodeNotFound { path: NodePath },

    /// The owner of a deferred reference could not be reached again.
    #[error("{path}: owner of a deferred reference is no longer reachable")]
    RouteLost { path: NodePath },

    #[error("{path}: {source}")]
    Property {
        path: NodePath,
        #[source]
        source: PropError,
    },

    #[error(transparent)]
    Reference(#[from] RefError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// The restore finished but collected non-fatal issues.
    #[error("restore finished with {0}")]
    Incomplete(SessionReport),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read configuration {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SerializeError {
    pub(crate) fn property(path: &NodePath, source: PropError) -> Self {
        Self::Property {
            path: path.clone(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Property { source, .. } => source.kind(),
            Self::Reference(err) => err.kind(),
            Self::Codec(err) => err.kind(),
            Self::Tree(err) => err.kind(),
            Self::Stream(_) | Self::ConfigIo { .. } => ErrorKind::Io,
            Self::ClassMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Incomplete(report) => report
                .issues()
                .first()
                .map_or(ErrorKind::Usage, |issue| issue.kind()),
            _ => ErrorKind::Usage,
        }
    }

    /// The collected issues, if this is an [`Incomplete`](Self::Incomplete) restore.
    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            Self::Incomplete(report) => Some(report),
            _ => None,
        }
    }
}

/// Result alias for serializer operations.
pub type SerializeResult<T> = Result<T, SerializeError>;
