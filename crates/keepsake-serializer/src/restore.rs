//! Serialization tree → object graph.
//!
//! The walk is pre-order. A reference node whose target is not registered
//! yet is parked in a pending list together with a route back to its owner;
//! once the walk is done every pending assignment is retried exactly once.
//! Whatever is still missing becomes an unresolved-reference issue.

use std::mem;

use keepsake_props::{
    Accessor, PropError, PropResult, PropertiesAnalyzer, PropertyDescriptor, Persistable,
    SharedObject,
};
use keepsake_refs::ReferenceManager;
use keepsake_tree::{Node, NodeBody, NodePath, RefKey};
use tracing::{debug, warn};

use crate::config::RestoreMode;
use crate::error::{SerializeError, SerializeResult};
use crate::report::{SessionIssue, SessionReport};

/// Where a route starts: the object handed to restore, or a shared object
/// materialized during the walk.
#[derive(Clone)]
enum Anchor {
    Root,
    Shared(SharedObject),
}

#[derive(Clone, Debug)]
enum Step {
    Property(String),
    Item(String, usize),
}

/// How to reach an owner object again after the walk.
#[derive(Clone)]
struct Location {
    anchor: Anchor,
    route: Vec<Step>,
}

impl Location {
    fn root() -> Self {
        Self {
            anchor: Anchor::Root,
            route: Vec::new(),
        }
    }

    fn shared(object: SharedObject) -> Self {
        Self {
            anchor: Anchor::Shared(object),
            route: Vec::new(),
        }
    }

    fn then(&self, step: Step) -> Self {
        let mut next = self.clone();
        next.route.push(step);
        next
    }
}

enum Entry {
    Ready(SharedObject),
    Waiting { key: RefKey, path: NodePath },
}

enum Deferred {
    Reference(RefKey),
    /// A shared list is assigned as a whole once every element resolves.
    SharedList(Vec<Entry>),
}

struct Pending {
    owner: Location,
    property: String,
    path: NodePath,
    deferred: Deferred,
}

enum Assignment {
    Reference(SharedObject),
    SharedList(Vec<SharedObject>),
}

pub(crate) struct TreeRestorer<'a> {
    analyzer: PropertiesAnalyzer,
    refs: &'a mut ReferenceManager,
    mode: RestoreMode,
    report: SessionReport,
    pending: Vec<Pending>,
}

impl<'a> TreeRestorer<'a> {
    pub(crate) fn new(refs: &'a mut ReferenceManager, mode: RestoreMode) -> Self {
        Self {
            analyzer: PropertiesAnalyzer::new(),
            refs,
            mode,
            report: SessionReport::new(),
            pending: Vec::new(),
        }
    }

    /// Restore the object node `node`, found at `path`, into `root`.
    pub(crate) fn run(
        mut self,
        root: &mut dyn Persistable,
        node: &Node,
        path: &NodePath,
    ) -> SerializeResult<SessionReport> {
        check_root(root.class_name(), node, path)?;
        self.restore_object(root, node, path, &Location::root())?;
        self.resolve_pending(Some(root))?;
        Ok(self.report)
    }

    /// Restore into a shared root. In by-reference mode the root is
    /// registered under the node's identity before the walk, so references
    /// back to it resolve like any other.
    pub(crate) fn run_shared(
        mut self,
        root: &SharedObject,
        node: &Node,
        path: &NodePath,
    ) -> SerializeResult<SessionReport> {
        let mut object = root
            .try_object_mut()
            .ok_or_else(|| SerializeError::Borrowed {
                path: path.clone(),
                type_name: root.type_name(),
            })?;
        check_root(object.class_name(), node, path)?;
        if let (RestoreMode::ByReference, Some(key)) = (self.mode, node.identity()) {
            if self.refs.key_of(root).as_ref() != Some(key) {
                self.refs.store_type(&key.tag)?;
                self.refs.store_reference(&key.tag, key.id, root)?;
            }
        }

        self.restore_object(&mut *object, node, path, &Location::shared(root.clone()))?;
        drop(object);
        self.resolve_pending(None)?;
        Ok(self.report)
    }

    fn restore_object(
        &mut self,
        object: &mut dyn Persistable,
        node: &Node,
        path: &NodePath,
        at: &Location,
    ) -> SerializeResult<()> {
        let descriptors = self
            .analyzer
            .analyze(object)
            .map_err(|e| SerializeError::property(path, e))?;

        for child in node.children() {
            if descriptors.get(child.name()).is_none() {
                warn!(
                    path = %path.child(child.name()),
                    class = descriptors.class(),
                    "ignoring node with no matching property"
                );
            }
        }

        for descriptor in &descriptors {
            let child_path = path.child(descriptor.name());
            let Some(child) = node.child(descriptor.name()) else {
                debug!(path = %child_path, "no node for property, keeping current value");
                continue;
            };
            if descriptor.is_read_only() {
                debug!(path = %child_path, "skipping read-only property");
                continue;
            }
            self.restore_property(object, descriptor, child, &child_path, at)?;
        }
        Ok(())
    }

    fn restore_property(
        &mut self,
        owner: &mut dyn Persistable,
        descriptor: &PropertyDescriptor,
        node: &Node,
        path: &NodePath,
        at: &Location,
    ) -> SerializeResult<()> {
        let name = descriptor.name();
        let prop = |e| SerializeError::property(path, e);

        match descriptor.accessor() {
            Accessor::Scalar(a) => match node.value() {
                Some(value) => {
                    let result = a.set(owner, value.clone());
                    self.absorb(result, path)
                }
                None => self.mismatch(path, descriptor.kind(), node.kind()),
            },
            Accessor::Array(a) => match node.body() {
                NodeBody::Array { element, items } if *element == a.element() => {
                    let result = a.set(owner, items.clone());
                    self.absorb(result, path)
                }
                _ => self.mismatch(path, descriptor.kind(), node.kind()),
            },
            Accessor::Object(a) => {
                let nested = a.get_mut(owner).map_err(prop)?;
                if self.check_class(nested.class_name(), node, path) {
                    let location = at.then(Step::Property(name.to_string()));
                    self.restore_object(nested, node, path, &location)?;
                }
                Ok(())
            }
            Accessor::List(a) => {
                let NodeBody::List { children } = node.body() else {
                    return self.mismatch(path, descriptor.kind(), node.kind());
                };
                a.reset(owner, children.len()).map_err(prop)?;
                for (i, item) in children.iter().enumerate() {
                    let item_path = path.index(i);
                    let element = a
                        .item_mut(owner, i)
                        .map_err(|e| SerializeError::property(&item_path, e))?;
                    if self.check_class(element.class_name(), item, &item_path) {
                        let location = at.then(Step::Item(name.to_string(), i));
                        self.restore_object(element, item, &item_path, &location)?;
                    }
                }
                Ok(())
            }
            Accessor::Reference(a) => match node.body() {
                NodeBody::Null => {
                    let result = a.set(owner, None);
                    self.absorb(result, path)
                }
                NodeBody::Reference { key } => match self.lookup(key) {
                    Some(target) => {
                        let result = a.set(owner, Some(target));
                        self.absorb(result, path)
                    }
                    None => {
                        self.defer(at, name, path, Deferred::Reference(key.clone()));
                        Ok(())
                    }
                },
                NodeBody::Object { .. } => match self.materialize(node, path, || a.create())? {
                    Some(target) => {
                        let result = a.set(owner, Some(target));
                        self.absorb(result, path)
                    }
                    None => Ok(()),
                },
                _ => self.mismatch(path, descriptor.kind(), node.kind()),
            },
            Accessor::SharedList(a) => {
                let NodeBody::List { children } = node.body() else {
                    return self.mismatch(path, descriptor.kind(), node.kind());
                };
                let mut entries = Vec::with_capacity(children.len());
                for (i, item) in children.iter().enumerate() {
                    let item_path = path.index(i);
                    let entry = match item.body() {
                        NodeBody::Reference { key } => match self.lookup(key) {
                            Some(target) => Entry::Ready(target),
                            None => Entry::Waiting {
                                key: key.clone(),
                                path: item_path,
                            },
                        },
                        NodeBody::Object { .. } => {
                            match self.materialize(item, &item_path, || a.create())? {
                                Some(target) => Entry::Ready(target),
                                None => return Ok(()),
                            }
                        }
                        _ => return self.mismatch(&item_path, "object or ref", item.kind()),
                    };
                    entries.push(entry);
                }

                if entries.iter().all(|e| matches!(e, Entry::Ready(_))) {
                    let items = entries
                        .into_iter()
                        .filter_map(|e| match e {
                            Entry::Ready(target) => Some(target),
                            Entry::Waiting { .. } => None,
                        })
                        .collect();
                    let result = a.set(owner, items);
                    self.absorb(result, path)
                } else {
                    self.defer(at, name, path, Deferred::SharedList(entries));
                    Ok(())
                }
            }
        }
    }

    /// Produce the shared object for an inline object node and restore its
    /// contents. `None` means the node's class did not fit and an issue was
    /// recorded.
    fn materialize(
        &mut self,
        node: &Node,
        path: &NodePath,
        create: impl FnOnce() -> SharedObject,
    ) -> SerializeResult<Option<SharedObject>> {
        let target = match (self.mode, node.identity()) {
            (RestoreMode::ByReference, Some(key)) => match self.lookup(key) {
                Some(existing) => {
                    debug!(key = %key, path = %path, "restoring into registered object");
                    existing
                }
                None => {
                    let fresh = create();
                    self.refs.store_type(&key.tag)?;
                    self.refs.store_reference(&key.tag, key.id, &fresh)?;
                    fresh
                }
            },
            _ => create(),
        };

        let mut object = target
            .try_object_mut()
            .ok_or_else(|| SerializeError::Borrowed {
                path: path.clone(),
                type_name: target.type_name(),
            })?;
        if !self.check_class(object.class_name(), node, path) {
            return Ok(None);
        }
        let location = Location::shared(target.clone());
        self.restore_object(&mut *object, node, path, &location)?;
        drop(object);
        Ok(Some(target))
    }

    fn lookup(&self, key: &RefKey) -> Option<SharedObject> {
        // An untracked tag has nothing registered under it.
        self.refs.reference(&key.tag, key.id).ok().flatten()
    }

    fn defer(&mut self, owner: &Location, property: &str, path: &NodePath, deferred: Deferred) {
        debug!(path = %path, "deferring reference until the walk completes");
        self.pending.push(Pending {
            owner: owner.clone(),
            property: property.to_string(),
            path: path.clone(),
            deferred,
        });
    }

    fn resolve_pending(&mut self, mut root: Option<&mut dyn Persistable>) -> SerializeResult<()> {
        let pending = mem::take(&mut self.pending);
        if !pending.is_empty() {
            debug!(count = pending.len(), "retrying deferred references");
        }

        for item in pending {
            match item.deferred {
                Deferred::Reference(key) => match self.lookup(&key) {
                    Some(target) => {
                        self.assign(root.as_deref_mut(), &item.owner, &item.property, &item.path, Assignment::Reference(target))?
                    }
                    None => self.record(SessionIssue::UnresolvedReference {
                        path: item.path,
                        key,
                    }),
                },
                Deferred::SharedList(entries) => {
                    let mut ready = Vec::with_capacity(entries.len());
                    let mut missing = Vec::new();
                    for entry in entries {
                        match entry {
                            Entry::Ready(target) => ready.push(target),
                            Entry::Waiting { key, path } => match self.lookup(&key) {
                                Some(target) => ready.push(target),
                                None => missing.push(SessionIssue::UnresolvedReference { path, key }),
                            },
                        }
                    }
                    if missing.is_empty() {
                        self.assign(root.as_deref_mut(), &item.owner, &item.property, &item.path, Assignment::SharedList(ready))?;
                    } else {
                        missing.into_iter().for_each(|issue| self.record(issue));
                    }
                }
            }
        }
        Ok(())
    }

    fn assign(
        &mut self,
        root: Option<&mut dyn Persistable>,
        owner: &Location,
        property: &str,
        path: &NodePath,
        value: Assignment,
    ) -> SerializeResult<()> {
        let result = match &owner.anchor {
            Anchor::Root => {
                let root = root.ok_or_else(|| SerializeError::RouteLost { path: path.clone() })?;
                apply(self.analyzer, root, &owner.route, property, path, value)?
            }
            Anchor::Shared(object) => {
                let mut guard = object
                    .try_object_mut()
                    .ok_or_else(|| SerializeError::Borrowed {
                        path: path.clone(),
                        type_name: object.type_name(),
                    })?;
                apply(self.analyzer, &mut *guard, &owner.route, property, path, value)?
            }
        };
        self.absorb(result, path)
    }

    /// Turn a setter's type mismatch into an issue; anything else aborts.
    fn absorb(&mut self, result: PropResult<()>, path: &NodePath) -> SerializeResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(PropError::TypeMismatch { expected, found }) => {
                self.record(SessionIssue::TypeMismatch {
                    path: path.clone(),
                    expected,
                    found,
                });
                Ok(())
            }
            Err(other) => Err(SerializeError::property(path, other)),
        }
    }

    fn mismatch(
        &mut self,
        path: &NodePath,
        expected: impl ToString,
        found: impl ToString,
    ) -> SerializeResult<()> {
        self.record(SessionIssue::TypeMismatch {
            path: path.clone(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
        Ok(())
    }

    /// Returns `true` if `node` is an object node of class `class`.
    fn check_class(&mut self, class: &str, node: &Node, path: &NodePath) -> bool {
        match node.class() {
            Some(found) if found == class => true,
            Some(found) => {
                self.record(SessionIssue::TypeMismatch {
                    path: path.clone(),
                    expected: class.to_string(),
                    found: found.to_string(),
                });
                false
            }
            None => {
                self.record(SessionIssue::TypeMismatch {
                    path: path.clone(),
                    expected: format!("object {class}"),
                    found: node.kind().to_string(),
                });
                false
            }
        }
    }

    fn record(&mut self, issue: SessionIssue) {
        warn!(%issue, "restore issue");
        self.report.push(issue);
    }
}

fn check_root(expected: &str, node: &Node, path: &NodePath) -> SerializeResult<()> {
    match node.class() {
        Some(found) if found == expected => Ok(()),
        found => Err(SerializeError::ClassMismatch {
            path: path.clone(),
            expected: expected.to_string(),
            found: found.map_or_else(|| node.kind().to_string(), str::to_string),
        }),
    }
}

/// Follow `route` from `object` and assign `value` to `property` there.
///
/// The outer result carries walk failures; the inner one is the setter's own
/// result, so a type mismatch can still become an issue.
fn apply(
    analyzer: PropertiesAnalyzer,
    object: &mut dyn Persistable,
    route: &[Step],
    property: &str,
    path: &NodePath,
    value: Assignment,
) -> SerializeResult<PropResult<()>> {
    let lost = || SerializeError::RouteLost { path: path.clone() };
    let descriptors = analyzer
        .analyze(object)
        .map_err(|e| SerializeError::property(path, e))?;

    let Some((step, rest)) = route.split_first() else {
        let descriptor = descriptors.get(property).ok_or_else(lost)?;
        return match (descriptor.accessor(), value) {
            (Accessor::Reference(a), Assignment::Reference(target)) => Ok(a.set(object, Some(target))),
            (Accessor::SharedList(a), Assignment::SharedList(items)) => Ok(a.set(object, items)),
            _ => Err(lost()),
        };
    };

    let nested = match step {
        Step::Property(name) => match descriptors.get(name).map(PropertyDescriptor::accessor) {
            Some(Accessor::Object(a)) => a.get_mut(object),
            _ => return Err(lost()),
        },
        Step::Item(name, index) => match descriptors.get(name).map(PropertyDescriptor::accessor) {
            Some(Accessor::List(a)) => a.item_mut(object, *index),
            _ => return Err(lost()),
        },
    }
    .map_err(|e| SerializeError::property(path, e))?;
    apply(analyzer, nested, rest, property, path, value)
}
