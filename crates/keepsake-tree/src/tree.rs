use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::node::{Node, NodeBody};
use crate::path::{NodePath, Segment};
use crate::value::NodeKind;

/// A complete serialization tree rooted at an object node.
///
/// A tree is built for one store or restore and then dropped; it is never a
/// long-lived cache of object state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializationTree {
    root: Node,
}

impl SerializationTree {
    /// Wrap a root node. The root must be an object so the stream is
    /// self-describing.
    pub fn new(root: Node) -> TreeResult<Self> {
        if root.kind() != NodeKind::Object {
            return Err(TreeError::RootNotObject { kind: root.kind() });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Class name declared by the root object.
    pub fn root_class(&self) -> &str {
        self.root.class().unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Locate a node by structural path.
    pub fn find(&self, path: &NodePath) -> Option<&Node> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = match (segment, current.body()) {
                (Segment::Name(name), NodeBody::Object { .. }) => current.child(name)?,
                (Segment::Index(i), NodeBody::List { children }) => children.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Parse `path` and locate the node.
    pub fn find_str(&self, path: &str) -> TreeResult<Option<&Node>> {
        let path = NodePath::parse(path)?;
        Ok(self.find(&path))
    }

    /// Depth-first, pre-order traversal in child order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(NodePath::root(), &self.root)],
        }
    }
}

/// Iterator returned by [`SerializationTree::walk`].
pub struct Walk<'a> {
    stack: Vec<(NodePath, &'a Node)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (NodePath, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        match node.body() {
            NodeBody::Object { children, .. } => {
                for child in children.iter().rev() {
                    self.stack.push((path.child(child.name()), child));
                }
            }
            NodeBody::List { children } => {
                for (i, child) in children.iter().enumerate().rev() {
                    self.stack.push((path.index(i), child));
                }
            }
            _ => {}
        }
        Some((path, node))
    }
}
