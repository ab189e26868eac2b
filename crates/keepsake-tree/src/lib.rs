//! Format-neutral serialization tree for the Keepsake persistence engine.
//!
//! A store walks an object graph into a [`SerializationTree`]; a tree writer
//! turns it into bytes. Restore runs the other way. The tree is the only
//! contract between the object walk and the physical encodings, so both
//! encodings share one traversal: depth-first, pre-order, children in
//! declaration order.
//!
//! # Key Types
//!
//! - [`Value`] / [`ScalarKind`] -- the 13 scalar kinds
//! - [`Node`] / [`NodeBody`] / [`NodeKind`] -- one property or list element
//! - [`RefKey`] -- (type tag, id) identity of a by-reference object
//! - [`NodePath`] -- structural path such as `/items[2]/peer`

pub mod error;
pub mod node;
pub mod path;
pub mod tree;
pub mod value;

pub use error::{ErrorKind, TreeError, TreeResult};
pub use node::{Node, NodeBody};
pub use path::{NodePath, Segment};
pub use tree::{SerializationTree, Walk};
pub use value::{NodeKind, RefKey, ScalarKind, Value};
