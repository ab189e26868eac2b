//! The store/restore entry point.

use std::cell::Cell;

use keepsake_codec::{reader_for, writer_for, Format};
use keepsake_props::{Persistable, SharedObject};
use keepsake_refs::ReferenceManager;
use keepsake_stream::ByteStream;
use keepsake_tree::{Node, NodePath, SerializationTree};
use tracing::{debug, info};

use crate::config::SerializerConfig;
use crate::error::{SerializeError, SerializeResult};
use crate::report::SessionReport;
use crate::restore::TreeRestorer;
use crate::state::{Session, SessionState};
use crate::store::TreeBuilder;

/// Drives store and restore sessions.
///
/// A serializer runs one session at a time. Starting a second session from
/// inside the first (for example from a declaration callback) fails with
/// [`SerializeError::Reentrant`]. The reference manager is passed to every
/// call, so one manager can span several sessions.
#[derive(Debug, Default)]
pub struct Serializer {
    config: SerializerConfig,
    state: Cell<SessionState>,
}

impl Serializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self {
            config,
            state: Cell::new(SessionState::Idle),
        }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Walk `object` into a tree without writing it anywhere.
    pub fn build_tree(
        &self,
        object: &dyn Persistable,
        refs: &ReferenceManager,
    ) -> SerializeResult<SerializationTree> {
        let _session = Session::begin(&self.state, SessionState::Storing)?;
        TreeBuilder::new(refs, self.config.store_mode).build(object)
    }

    /// Store `object` to `stream` in `format`.
    pub fn store(
        &self,
        object: &dyn Persistable,
        stream: &mut dyn ByteStream,
        format: Format,
        refs: &ReferenceManager,
    ) -> SerializeResult<()> {
        let _session = Session::begin(&self.state, SessionState::Storing)?;
        let tree = TreeBuilder::new(refs, self.config.store_mode).build(object)?;
        writer_for(format, self.config.codec_options()).write_tree(&tree, stream)?;
        info!(class = tree.root_class(), nodes = tree.node_count(), %format, "stored object");
        Ok(())
    }

    /// Store a shared object. The root node carries the key `root` is
    /// registered under in `refs`, so restoring with
    /// [`restore_shared`](Self::restore_shared) can rebuild references back
    /// to the root.
    pub fn store_shared(
        &self,
        root: &SharedObject,
        stream: &mut dyn ByteStream,
        format: Format,
        refs: &ReferenceManager,
    ) -> SerializeResult<()> {
        let _session = Session::begin(&self.state, SessionState::Storing)?;
        let tree = TreeBuilder::new(refs, self.config.store_mode).build_shared(root)?;
        writer_for(format, self.config.codec_options()).write_tree(&tree, stream)?;
        info!(class = tree.root_class(), nodes = tree.node_count(), %format, "stored shared object");
        Ok(())
    }

    /// Restore `object` from `stream`.
    ///
    /// The whole tree is read before any setter runs, so a malformed stream
    /// leaves `object` untouched. Type mismatches and unresolved references
    /// do not stop the walk; they are returned together as
    /// [`SerializeError::Incomplete`] once it finishes.
    pub fn restore(
        &self,
        object: &mut dyn Persistable,
        stream: &mut dyn ByteStream,
        format: Format,
        refs: &mut ReferenceManager,
    ) -> SerializeResult<()> {
        let _session = Session::begin(&self.state, SessionState::Restoring)?;
        let tree = self.read_tree(stream, format)?;
        let report = TreeRestorer::new(refs, self.config.restore_mode).run(
            object,
            tree.root(),
            &NodePath::root(),
        )?;
        info!(class = tree.root_class(), issues = report.len(), %format, "restored object");
        finish(report)
    }

    /// Restore a shared root from `stream`.
    ///
    /// With restore mode by-reference the root is registered under the
    /// identity of the root node before the walk, which lets a cycle that
    /// passes through the root come back intact. A different live object
    /// already holding that key fails with
    /// [`RefError::AlreadyRegistered`](keepsake_refs::RefError::AlreadyRegistered).
    pub fn restore_shared(
        &self,
        root: &SharedObject,
        stream: &mut dyn ByteStream,
        format: Format,
        refs: &mut ReferenceManager,
    ) -> SerializeResult<()> {
        let _session = Session::begin(&self.state, SessionState::Restoring)?;
        let tree = self.read_tree(stream, format)?;
        let report = TreeRestorer::new(refs, self.config.restore_mode).run_shared(
            root,
            tree.root(),
            &NodePath::root(),
        )?;
        info!(class = tree.root_class(), issues = report.len(), %format, "restored shared object");
        finish(report)
    }

    /// Restore `object` from an already decoded tree.
    pub fn restore_tree(
        &self,
        object: &mut dyn Persistable,
        tree: &SerializationTree,
        refs: &mut ReferenceManager,
    ) -> SerializeResult<()> {
        let _session = Session::begin(&self.state, SessionState::Restoring)?;
        let report = TreeRestorer::new(refs, self.config.restore_mode).run(
            object,
            tree.root(),
            &NodePath::root(),
        )?;
        finish(report)
    }

    /// Restore the object node at `path` into `object`.
    pub fn restore_node(
        &self,
        object: &mut dyn Persistable,
        tree: &SerializationTree,
        path: &str,
        refs: &mut ReferenceManager,
    ) -> SerializeResult<()> {
        let _session = Session::begin(&self.state, SessionState::Restoring)?;
        let path = NodePath::parse(path)?;
        let node = tree
            .find(&path)
            .ok_or_else(|| SerializeError::NodeNotFound { path: path.clone() })?;
        debug!(path = %path, "restoring sub-tree");
        let report = TreeRestorer::new(refs, self.config.restore_mode).run(object, node, &path)?;
        finish(report)
    }

    /// Locate the node at `path`, such as `/items[2]/peer`.
    pub fn find_node<'t>(&self, tree: &'t SerializationTree, path: &str) -> SerializeResult<&'t Node> {
        let path = NodePath::parse(path)?;
        tree.find(&path)
            .ok_or(SerializeError::NodeNotFound { path })
    }

    /// Decode a tree from `stream` using this serializer's codec options.
    pub fn read_tree(
        &self,
        stream: &mut dyn ByteStream,
        format: Format,
    ) -> SerializeResult<SerializationTree> {
        Ok(reader_for(format, self.config.codec_options()).read_tree(stream)?)
    }

    /// Encode `tree` to `stream` using this serializer's codec options.
    pub fn write_tree(
        &self,
        tree: &SerializationTree,
        stream: &mut dyn ByteStream,
        format: Format,
    ) -> SerializeResult<()> {
        Ok(writer_for(format, self.config.codec_options()).write_tree(tree, stream)?)
    }
}

fn finish(report: SessionReport) -> SerializeResult<()> {
    if report.is_empty() {
        Ok(())
    } else {
        Err(SerializeError::Incomplete(report))
    }
}
