//! Error types for property declaration and access.

use keepsake_tree::ErrorKind;
use thiserror::Error;

/// Errors raised by the analyzer or by a descriptor invocation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropError {
    /// One declaration callback registered the same name twice.
    #[error("class {class} declares property {name:?} more than once")]
    DuplicateProperty { class: String, name: String },

    /// A property was declared with an empty name.
    #[error("class {class} declares a property with an empty name")]
    EmptyName { class: String },

    /// A descriptor was invoked on an object of a different type.
    #[error("descriptor expects an owner of type {expected}")]
    WrongOwner { expected: &'static str },

    /// The value handed to a setter is not of the declared kind.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The property has no setter.
    #[error("property is read-only")]
    ReadOnly,

    /// A list index past the end of the list.
    #[error("list index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A shared object is already mutably borrowed.
    #[error("shared object of type {type_name} is already borrowed")]
    Borrowed { type_name: &'static str },
}

impl PropError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            _ => ErrorKind::Usage,
        }
    }
}

/// Convenience type alias for property operations.
pub type PropResult<T> = Result<T, PropError>;
