//! Object graph → serialization tree.

use keepsake_props::{
    object_address, Accessor, PropertiesAnalyzer, PropertyDescriptor, Persistable, SharedObject,
    StoreMode,
};
use keepsake_refs::ReferenceManager;
use keepsake_tree::{Node, NodePath, RefKey, SerializationTree};
use tracing::debug;

use crate::error::{SerializeError, SerializeResult};

/// One store walk. Shared objects currently being inlined are tracked by
/// address so a by-value cycle fails instead of recursing forever.
pub(crate) struct TreeBuilder<'a> {
    analyzer: PropertiesAnalyzer,
    refs: &'a ReferenceManager,
    mode: StoreMode,
    inlining: Vec<usize>,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(refs: &'a ReferenceManager, mode: StoreMode) -> Self {
        Self {
            analyzer: PropertiesAnalyzer::new(),
            refs,
            mode,
            inlining: Vec::new(),
        }
    }

    pub(crate) fn build(mut self, root: &dyn Persistable) -> SerializeResult<SerializationTree> {
        let node = self.object_node("", root, root.reference_key(), &NodePath::root())?;
        let tree = SerializationTree::new(node)?;
        debug!(class = tree.root_class(), nodes = tree.node_count(), "built tree");
        Ok(tree)
    }

    /// Like [`build`](Self::build) for a shared root. The root takes the key
    /// it is registered under and counts as being inlined, so a by-value
    /// path back to it is reported as a cycle.
    pub(crate) fn build_shared(mut self, root: &SharedObject) -> SerializeResult<SerializationTree> {
        let node = self.shared_node("", root, StoreMode::ByValue, &NodePath::root())?;
        let tree = SerializationTree::new(node)?;
        debug!(class = tree.root_class(), nodes = tree.node_count(), "built tree");
        Ok(tree)
    }

    fn object_node(
        &mut self,
        name: &str,
        object: &dyn Persistable,
        identity: Option<RefKey>,
        path: &NodePath,
    ) -> SerializeResult<Node> {
        let class = object.class_name();
        if class.is_empty() {
            return Err(SerializeError::MissingClassName { path: path.clone() });
        }
        let descriptors = self
            .analyzer
            .analyze(object)
            .map_err(|e| SerializeError::property(path, e))?;

        let mut node = Node::object(name, class).with_identity(identity);
        for descriptor in &descriptors {
            let child = self.property(object, descriptor, &path.child(descriptor.name()))?;
            node.push_child(child)?;
        }
        Ok(node)
    }

    fn property(
        &mut self,
        owner: &dyn Persistable,
        descriptor: &PropertyDescriptor,
        path: &NodePath,
    ) -> SerializeResult<Node> {
        let name = descriptor.name();
        let prop = |e| SerializeError::property(path, e);
        let node = match descriptor.accessor() {
            Accessor::Scalar(a) => Node::scalar(name, a.get(owner).map_err(prop)?),
            Accessor::Array(a) => Node::array(name, a.element(), a.get(owner).map_err(prop)?)?,
            Accessor::Object(a) => {
                let nested = a.get(owner).map_err(prop)?;
                self.object_node(name, nested, nested.reference_key(), path)?
            }
            Accessor::List(a) => {
                let mut list = Node::list(name);
                for i in 0..a.len(owner).map_err(prop)? {
                    let item = a.item(owner, i).map_err(prop)?;
                    list.push_child(self.object_node("", item, item.reference_key(), &path.index(i))?)?;
                }
                list
            }
            Accessor::Reference(a) => match a.get(owner).map_err(prop)? {
                Some(target) => {
                    let mode = descriptor.effective_mode(self.mode);
                    self.shared_node(name, &target, mode, path)?
                }
                None => Node::null(name),
            },
            Accessor::SharedList(a) => {
                let mode = descriptor.effective_mode(self.mode);
                let mut list = Node::list(name);
                for (i, target) in a.get(owner).map_err(prop)?.iter().enumerate() {
                    list.push_child(self.shared_node("", target, mode, &path.index(i))?)?;
                }
                list
            }
        };
        Ok(node)
    }

    fn shared_node(
        &mut self,
        name: &str,
        target: &SharedObject,
        mode: StoreMode,
        path: &NodePath,
    ) -> SerializeResult<Node> {
        match mode {
            StoreMode::ByReference => {
                let key = self
                    .refs
                    .key_of(target)
                    .ok_or_else(|| SerializeError::UnregisteredReference {
                        path: path.clone(),
                        type_name: target.type_name(),
                    })?;
                Ok(Node::reference(name, key))
            }
            StoreMode::ByValue => {
                let address = object_address(target);
                if self.inlining.contains(&address) {
                    return Err(SerializeError::Cycle { path: path.clone() });
                }
                let object = target.try_object().ok_or_else(|| SerializeError::Borrowed {
                    path: path.clone(),
                    type_name: target.type_name(),
                })?;
                let identity = self.refs.key_of(target).or_else(|| object.reference_key());

                self.inlining.push(address);
                let node = self.object_node(name, &*object, identity, path);
                self.inlining.pop();
                node
            }
        }
    }
}
