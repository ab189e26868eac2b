//! Reference management for the Keepsake persistence engine.
//!
//! The [`ReferenceManager`] maps a (type tag, numeric id) pair to a live
//! shared object. Store uses it to decide which edges become reference nodes;
//! restore uses it to resolve those nodes back into object handles,
//! including forward references that are resolved once the whole tree has
//! been walked.
//!
//! # Modules
//!
//! - [`error`] -- Error types for registration and lookup
//! - [`manager`] -- The [`ReferenceManager`] registry
//! - [`tags`] -- Type tag validation

pub mod error;
pub mod manager;
pub mod tags;

pub use error::{RefError, RefResult};
pub use manager::ReferenceManager;
pub use tags::validate_type_tag;
