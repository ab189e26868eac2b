//! Tree nodes.

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::value::{NodeKind, RefKey, ScalarKind, Value};

/// Payload of a [`Node`]. The variant fixes the node's kind for its lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum NodeBody {
    Scalar {
        value: Value,
    },
    Array {
        element: ScalarKind,
        items: Vec<Value>,
    },
    Object {
        class: String,
        identity: Option<RefKey>,
        children: Vec<Node>,
    },
    List {
        children: Vec<Node>,
    },
    Reference {
        key: RefKey,
    },
    Null,
}

/// One entry of a serialization tree: a property or a list element.
///
/// Children are only ever appended, so declaration order is preserved from
/// the object that produced them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    body: NodeBody,
}

impl Node {
    pub fn scalar(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Scalar { value },
        }
    }

    /// An array node. Every item must be of kind `element`.
    pub fn array(name: impl Into<String>, element: ScalarKind, items: Vec<Value>) -> TreeResult<Self> {
        if let Some(bad) = items.iter().find(|v| v.kind() != element) {
            return Err(TreeError::ArrayElementMismatch {
                element,
                found: bad.kind(),
            });
        }
        Ok(Self {
            name: name.into(),
            body: NodeBody::Array { element, items },
        })
    }

    pub fn object(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Object {
                class: class.into(),
                identity: None,
                children: Vec::new(),
            },
        }
    }

    /// Attach the object's own identity. No effect on non-object nodes.
    pub fn with_identity(mut self, key: Option<RefKey>) -> Self {
        if let NodeBody::Object { identity, .. } = &mut self.body {
            *identity = key;
        }
        self
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::List {
                children: Vec::new(),
            },
        }
    }

    pub fn reference(name: impl Into<String>, key: RefKey) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Reference { key },
        }
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Null,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn kind(&self) -> NodeKind {
        match &self.body {
            NodeBody::Scalar { value } => NodeKind::Scalar(value.kind()),
            NodeBody::Array { element, .. } => NodeKind::Array(*element),
            NodeBody::Object { .. } => NodeKind::Object,
            NodeBody::List { .. } => NodeKind::List,
            NodeBody::Reference { .. } => NodeKind::Reference,
            NodeBody::Null => NodeKind::Null,
        }
    }

    /// Scalar payload, if this is a scalar node.
    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            NodeBody::Scalar { value } => Some(value),
            _ => None,
        }
    }

    /// Array items, if this is an array node.
    pub fn items(&self) -> Option<&[Value]> {
        match &self.body {
            NodeBody::Array { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Class name, if this is an object node.
    pub fn class(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Object { class, .. } => Some(class),
            _ => None,
        }
    }

    /// The object's own identity, if this is an object node that has one.
    pub fn identity(&self) -> Option<&RefKey> {
        match &self.body {
            NodeBody::Object { identity, .. } => identity.as_ref(),
            _ => None,
        }
    }

    /// Target of a reference node.
    pub fn reference_key(&self) -> Option<&RefKey> {
        match &self.body {
            NodeBody::Reference { key } => Some(key),
            _ => None,
        }
    }

    /// Children of an object or list node; empty for every other kind.
    pub fn children(&self) -> &[Node] {
        match &self.body {
            NodeBody::Object { children, .. } | NodeBody::List { children } => children,
            _ => &[],
        }
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children().iter().find(|c| c.name == name)
    }

    /// Append a child to an object or list node.
    pub fn push_child(&mut self, child: Node) -> TreeResult<()> {
        let kind = self.kind();
        match &mut self.body {
            NodeBody::Object { children, .. } | NodeBody::List { children } => {
                children.push(child);
                Ok(())
            }
            _ => Err(TreeError::NotAContainer { kind }),
        }
    }

    /// Number of nodes in this sub-tree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Node::node_count).sum::<usize>()
    }
}
