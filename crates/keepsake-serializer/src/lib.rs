//! # keepsake-serializer
//!
//! Orchestrates store and restore sessions for the Keepsake persistence
//! engine.
//!
//! A store walks a [`Persistable`](keepsake_props::Persistable) object into
//! a [`SerializationTree`](keepsake_tree::SerializationTree) and hands it to
//! a tree writer. A restore reads a whole tree, then walks it pre-order and
//! re-invokes the object's setters. References whose target has not been
//! seen yet are deferred and retried once the walk completes.
//!
//! # Error handling
//!
//! I/O, format, and usage errors abort a session. Type mismatches and
//! unresolved references are collected into a [`SessionReport`] and
//! returned as [`SerializeError::Incomplete`] when the restore finishes.

pub mod config;
pub mod error;
pub mod report;
mod restore;
pub mod serializer;
pub mod state;
mod store;

pub use config::{RestoreMode, SerializerConfig};
pub use error::{SerializeError, SerializeResult};
pub use report::{SessionIssue, SessionReport};
pub use serializer::Serializer;
pub use state::SessionState;
