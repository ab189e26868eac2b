//! Building descriptor lists from an object's declaration callback.

use std::any::{type_name, Any};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::rc::Rc;

use keepsake_tree::Value;
use tracing::debug;

use crate::descriptor::{
    Accessor, ArrayAccessor, ListAccessor, ObjectAccessor, PropertyDescriptor, ReferenceAccessor,
    ScalarAccessor, SharedListAccessor, StoreMode,
};
use crate::error::{PropError, PropResult};
use crate::object::{downcast_shared, shared, Persistable, Shared, SharedObject};
use crate::scalar::ScalarType;

/// Collects descriptors while an object's [`Persistable::declare`] runs.
pub struct Declaration {
    class: String,
    descriptors: Vec<PropertyDescriptor>,
}

impl Declaration {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            descriptors: Vec::new(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Start declaring properties of an owner of type `T`.
    pub fn of<T: Persistable>(&mut self) -> Props<'_, T> {
        Props {
            decl: self,
            _owner: PhantomData,
        }
    }

    /// Register a hand-built descriptor.
    pub fn push(&mut self, descriptor: PropertyDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn last_mut(&mut self) -> Option<&mut PropertyDescriptor> {
        self.descriptors.last_mut()
    }
}

fn owner<T: Any>(any: &dyn Any) -> PropResult<&T> {
    any.downcast_ref::<T>().ok_or(PropError::WrongOwner {
        expected: type_name::<T>(),
    })
}

fn owner_mut<T: Any>(any: &mut dyn Any) -> PropResult<&mut T> {
    any.downcast_mut::<T>().ok_or(PropError::WrongOwner {
        expected: type_name::<T>(),
    })
}

fn mismatch<V: ScalarType>(found: &Value) -> PropError {
    PropError::TypeMismatch {
        expected: V::KIND.to_string(),
        found: found.kind().to_string(),
    }
}

fn typed_target<U: Persistable>(target: SharedObject) -> PropResult<Shared<U>> {
    let found = target.type_name();
    downcast_shared::<U>(target).ok_or_else(|| PropError::TypeMismatch {
        expected: type_name::<U>().to_string(),
        found: found.to_string(),
    })
}

// Pin higher-ranked signatures on closures that return borrows of their input.
fn object_getter<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> PropResult<&'a dyn Persistable>,
{
    f
}

fn object_getter_mut<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Any) -> PropResult<&'a mut dyn Persistable>,
{
    f
}

fn item_getter<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any, usize) -> PropResult<&'a dyn Persistable>,
{
    f
}

fn item_getter_mut<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Any, usize) -> PropResult<&'a mut dyn Persistable>,
{
    f
}

/// Typed builder for the properties of one owner type.
///
/// Each method registers one descriptor and returns the builder, so a
/// declaration reads as a chain:
///
/// ```ignore
/// decl.of::<Self>()
///     .scalar("Count", |o| o.count, |o, v| o.count = v)
///     .reference("peer", |o| o.peer.clone(), |o, v| o.peer = v)
///     .by_reference();
/// ```
pub struct Props<'d, T> {
    decl: &'d mut Declaration,
    _owner: PhantomData<fn(&T)>,
}

impl<T: Persistable> Props<'_, T> {
    fn add(&mut self, name: &str, accessor: Accessor) -> &mut Self {
        self.decl.push(PropertyDescriptor::new(name, accessor));
        self
    }

    /// A scalar with a getter and a setter.
    pub fn scalar<V, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        V: ScalarType,
        G: Fn(&T) -> V + 'static,
        S: Fn(&mut T, V) + 'static,
    {
        self.add(
            name,
            Accessor::Scalar(ScalarAccessor {
                kind: V::KIND,
                get: Box::new(move |any: &dyn Any| -> PropResult<Value> {
                    Ok(get(owner::<T>(any)?).into_value())
                }),
                set: Some(Box::new(move |any: &mut dyn Any, value: Value| -> PropResult<()> {
                    let target = owner_mut::<T>(any)?;
                    let found = mismatch::<V>(&value);
                    let value = V::from_value(value).ok_or(found)?;
                    set(target, value);
                    Ok(())
                })),
            }),
        )
    }

    /// A scalar that is stored but never restored.
    pub fn read_only<V, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        V: ScalarType,
        G: Fn(&T) -> V + 'static,
    {
        self.add(
            name,
            Accessor::Scalar(ScalarAccessor {
                kind: V::KIND,
                get: Box::new(move |any: &dyn Any| -> PropResult<Value> {
                    Ok(get(owner::<T>(any)?).into_value())
                }),
                set: None,
            }),
        )
    }

    /// A homogeneous array of scalars.
    pub fn array<V, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        V: ScalarType,
        G: Fn(&T) -> Vec<V> + 'static,
        S: Fn(&mut T, Vec<V>) + 'static,
    {
        self.add(
            name,
            Accessor::Array(ArrayAccessor {
                element: V::KIND,
                get: Box::new(move |any: &dyn Any| -> PropResult<Vec<Value>> {
                    let items = get(owner::<T>(any)?);
                    Ok(items.into_iter().map(ScalarType::into_value).collect())
                }),
                set: Some(Box::new(move |any: &mut dyn Any, items: Vec<Value>| -> PropResult<()> {
                    let target = owner_mut::<T>(any)?;
                    let mut typed = Vec::with_capacity(items.len());
                    for item in items {
                        let found = mismatch::<V>(&item);
                        typed.push(V::from_value(item).ok_or(found)?);
                    }
                    set(target, typed);
                    Ok(())
                })),
            }),
        )
    }

    /// A nested object owned by `T`.
    pub fn object<U, G, M>(&mut self, name: &str, get: G, get_mut: M) -> &mut Self
    where
        U: Persistable,
        G: Fn(&T) -> &U + 'static,
        M: Fn(&mut T) -> &mut U + 'static,
    {
        self.add(
            name,
            Accessor::Object(ObjectAccessor {
                get: Box::new(object_getter(move |any| {
                    let nested: &dyn Persistable = get(owner::<T>(any)?);
                    Ok(nested)
                })),
                get_mut: Box::new(object_getter_mut(move |any| {
                    let nested: &mut dyn Persistable = get_mut(owner_mut::<T>(any)?);
                    Ok(nested)
                })),
            }),
        )
    }

    /// An optional pointer to a shared object.
    pub fn reference<U, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        U: Persistable + Default,
        G: Fn(&T) -> Option<Shared<U>> + 'static,
        S: Fn(&mut T, Option<Shared<U>>) + 'static,
    {
        self.add(
            name,
            Accessor::Reference(ReferenceAccessor {
                target: type_name::<U>(),
                get: Box::new(move |any: &dyn Any| -> PropResult<Option<SharedObject>> {
                    Ok(get(owner::<T>(any)?).map(|obj| obj as SharedObject))
                }),
                set: Box::new(move |any: &mut dyn Any, target: Option<SharedObject>| -> PropResult<()> {
                    let typed = target.map(typed_target::<U>).transpose()?;
                    set(owner_mut::<T>(any)?, typed);
                    Ok(())
                }),
                create: Box::new(|| -> SharedObject { shared(U::default()) }),
            }),
        )
    }

    /// A list of objects owned by `T`.
    pub fn list<U, G, M>(&mut self, name: &str, get: G, get_mut: M) -> &mut Self
    where
        U: Persistable + Default,
        G: Fn(&T) -> &Vec<U> + 'static,
        M: Fn(&mut T) -> &mut Vec<U> + 'static,
    {
        let get = Rc::new(get);
        let get_mut = Rc::new(get_mut);
        let len = {
            let get = Rc::clone(&get);
            move |any: &dyn Any| -> PropResult<usize> { Ok(get(owner::<T>(any)?).len()) }
        };
        let item = {
            let get = Rc::clone(&get);
            item_getter(move |any, index| {
                let items = get(owner::<T>(any)?);
                let len = items.len();
                let item: &dyn Persistable = items
                    .get(index)
                    .ok_or(PropError::IndexOutOfRange { index, len })?;
                Ok(item)
            })
        };
        let item_mut = {
            let get_mut = Rc::clone(&get_mut);
            item_getter_mut(move |any, index| {
                let items = get_mut(owner_mut::<T>(any)?);
                let len = items.len();
                let item: &mut dyn Persistable = items
                    .get_mut(index)
                    .ok_or(PropError::IndexOutOfRange { index, len })?;
                Ok(item)
            })
        };
        let reset = move |any: &mut dyn Any, len: usize| -> PropResult<()> {
            let items = get_mut(owner_mut::<T>(any)?);
            items.clear();
            items.resize_with(len, U::default);
            Ok(())
        };
        self.add(
            name,
            Accessor::List(ListAccessor {
                len: Box::new(len),
                item: Box::new(item),
                item_mut: Box::new(item_mut),
                reset: Box::new(reset),
            }),
        )
    }

    /// A list of shared objects.
    pub fn shared_list<U, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        U: Persistable + Default,
        G: Fn(&T) -> Vec<Shared<U>> + 'static,
        S: Fn(&mut T, Vec<Shared<U>>) + 'static,
    {
        self.add(
            name,
            Accessor::SharedList(SharedListAccessor {
                target: type_name::<U>(),
                get: Box::new(move |any: &dyn Any| -> PropResult<Vec<SharedObject>> {
                    let items = get(owner::<T>(any)?);
                    Ok(items.into_iter().map(|obj| obj as SharedObject).collect())
                }),
                set: Box::new(move |any: &mut dyn Any, items: Vec<SharedObject>| -> PropResult<()> {
                    let typed = items
                        .into_iter()
                        .map(typed_target::<U>)
                        .collect::<PropResult<Vec<_>>>()?;
                    set(owner_mut::<T>(any)?, typed);
                    Ok(())
                }),
                create: Box::new(|| -> SharedObject { shared(U::default()) }),
            }),
        )
    }

    /// Store the most recently declared property inline.
    pub fn by_value(&mut self) -> &mut Self {
        self.mode(StoreMode::ByValue)
    }

    /// Store the most recently declared property as a (tag, id) pair.
    pub fn by_reference(&mut self) -> &mut Self {
        self.mode(StoreMode::ByReference)
    }

    fn mode(&mut self, mode: StoreMode) -> &mut Self {
        if let Some(last) = self.decl.last_mut() {
            last.set_mode(mode);
        }
        self
    }
}

/// Ordered descriptor list for one analyzed object.
#[derive(Debug)]
pub struct DescriptorSet {
    class: String,
    descriptors: Vec<PropertyDescriptor>,
}

impl DescriptorSet {
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PropertyDescriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(PropertyDescriptor::name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl<'a> IntoIterator for &'a DescriptorSet {
    type Item = &'a PropertyDescriptor;
    type IntoIter = std::slice::Iter<'a, PropertyDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}

/// Produces descriptor lists by running declaration callbacks.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropertiesAnalyzer;

impl PropertiesAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Run `object`'s declaration callback and validate the result.
    ///
    /// Descriptors are built fresh on every call. An object that declares
    /// nothing yields an empty set.
    pub fn analyze(&self, object: &dyn Persistable) -> PropResult<DescriptorSet> {
        let class = object.class_name().to_string();
        let mut decl = Declaration::new(class.clone());
        object.declare(&mut decl);

        {
            let mut seen = HashSet::with_capacity(decl.descriptors.len());
            for descriptor in &decl.descriptors {
                if descriptor.name().is_empty() {
                    return Err(PropError::EmptyName { class });
                }
                if !seen.insert(descriptor.name()) {
                    return Err(PropError::DuplicateProperty {
                        class,
                        name: descriptor.name().to_string(),
                    });
                }
            }
        }

        debug!(class = %class, properties = decl.descriptors.len(), "analyzed object");
        Ok(DescriptorSet {
            class,
            descriptors: decl.descriptors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PropertyKind;
    use crate::object::erase;
    use keepsake_tree::ScalarKind;

    #[derive(Default)]
    struct Node {
        id: u64,
        label: String,
        weights: Vec<f64>,
        inner: Inner,
        children: Vec<Inner>,
        peer: Option<Shared<Node>>,
        peers: Vec<Shared<Node>>,
    }

    #[derive(Default)]
    struct Inner {
        flag: bool,
    }

    impl Persistable for Inner {
        fn class_name(&self) -> &str {
            "Inner"
        }

        fn declare(&self, decl: &mut Declaration) {
            decl.of::<Self>().scalar("flag", |o| o.flag, |o, v| o.flag = v);
        }
    }

    impl Persistable for Node {
        fn class_name(&self) -> &str {
            "Node"
        }

        fn declare(&self, decl: &mut Declaration) {
            decl.of::<Self>()
                .read_only("id", |o| o.id)
                .scalar("label", |o| o.label.clone(), |o, v| o.label = v)
                .array("weights", |o| o.weights.clone(), |o, v| o.weights = v)
                .object("inner", |o| &o.inner, |o| &mut o.inner)
                .list("children", |o| &o.children, |o| &mut o.children)
                .reference("peer", |o| o.peer.clone(), |o, v| o.peer = v)
                .by_value()
                .shared_list("peers", |o| o.peers.clone(), |o, v| o.peers = v);
        }
    }

    struct Empty;

    impl Persistable for Empty {
        fn class_name(&self) -> &str {
            "Empty"
        }

        fn declare(&self, _decl: &mut Declaration) {}
    }

    struct Twice;

    impl Persistable for Twice {
        fn class_name(&self) -> &str {
            "Twice"
        }

        fn declare(&self, decl: &mut Declaration) {
            decl.of::<Self>()
                .read_only("x", |_| 1u8)
                .read_only("x", |_| 2u8);
        }
    }

    #[test]
    fn analyze_preserves_declaration_order() {
        let set = PropertiesAnalyzer::new().analyze(&Node::default()).unwrap();
        let names: Vec<_> = set.names().collect();
        assert_eq!(
            names,
            ["id", "label", "weights", "inner", "children", "peer", "peers"]
        );
        assert_eq!(set.class(), "Node");

        let kinds: Vec<_> = set.iter().map(PropertyDescriptor::kind).collect();
        assert_eq!(
            kinds,
            [
                PropertyKind::Scalar(ScalarKind::U64),
                PropertyKind::Scalar(ScalarKind::Text),
                PropertyKind::Array(ScalarKind::F64),
                PropertyKind::Object,
                PropertyKind::List,
                PropertyKind::Reference,
                PropertyKind::SharedList,
            ]
        );
    }

    #[test]
    fn repeated_analysis_is_stable() {
        let node = Node::default();
        let analyzer = PropertiesAnalyzer::new();
        let first: Vec<_> = analyzer
            .analyze(&node)
            .unwrap()
            .iter()
            .map(|d| (d.name().to_string(), d.kind()))
            .collect();
        let second: Vec<_> = analyzer
            .analyze(&node)
            .unwrap()
            .iter()
            .map(|d| (d.name().to_string(), d.kind()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_declaration_is_not_an_error() {
        let set = PropertiesAnalyzer::new().analyze(&Empty).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = PropertiesAnalyzer::new().analyze(&Twice).unwrap_err();
        assert_eq!(
            err,
            PropError::DuplicateProperty {
                class: "Twice".into(),
                name: "x".into()
            }
        );
    }

    #[test]
    fn store_mode_override_applies_to_last_property() {
        let set = PropertiesAnalyzer::new().analyze(&Node::default()).unwrap();
        assert_eq!(set.get("peer").unwrap().mode(), Some(StoreMode::ByValue));
        assert_eq!(set.get("peers").unwrap().mode(), None);
        assert_eq!(
            set.get("peers")
                .unwrap()
                .effective_mode(StoreMode::ByReference),
            StoreMode::ByReference
        );
    }

    #[test]
    fn scalar_accessors_get_and_set() {
        let mut node = Node::default();
        let set = PropertiesAnalyzer::new().analyze(&node).unwrap();
        let Accessor::Scalar(label) = set.get("label").unwrap().accessor() else {
            panic!("label is a scalar");
        };
        label.set(&mut node, Value::Text("hello".into())).unwrap();
        assert_eq!(node.label, "hello");
        assert_eq!(label.get(&node).unwrap(), Value::Text("hello".into()));

        let err = label.set(&mut node, Value::U32(3)).unwrap_err();
        assert!(matches!(err, PropError::TypeMismatch { .. }));
        assert_eq!(node.label, "hello");
    }

    #[test]
    fn read_only_scalar_refuses_set() {
        let mut node = Node {
            id: 9,
            ..Node::default()
        };
        let set = PropertiesAnalyzer::new().analyze(&node).unwrap();
        let id = set.get("id").unwrap();
        assert!(id.is_read_only());
        let Accessor::Scalar(acc) = id.accessor() else {
            panic!("id is a scalar");
        };
        assert_eq!(acc.get(&node).unwrap(), Value::U64(9));
        assert_eq!(acc.set(&mut node, Value::U64(1)), Err(PropError::ReadOnly));
    }

    #[test]
    fn array_accessor_checks_element_kind() {
        let mut node = Node::default();
        let set = PropertiesAnalyzer::new().analyze(&node).unwrap();
        let Accessor::Array(weights) = set.get("weights").unwrap().accessor() else {
            panic!("weights is an array");
        };
        weights
            .set(&mut node, vec![Value::F64(0.5), Value::F64(1.5)])
            .unwrap();
        assert_eq!(node.weights, vec![0.5, 1.5]);
        assert!(weights.set(&mut node, vec![Value::F32(1.0)]).is_err());
        assert_eq!(node.weights, vec![0.5, 1.5]);
    }

    #[test]
    fn list_accessor_resets_and_indexes() {
        let mut node = Node::default();
        let set = PropertiesAnalyzer::new().analyze(&node).unwrap();
        let Accessor::List(children) = set.get("children").unwrap().accessor() else {
            panic!("children is a list");
        };
        children.reset(&mut node, 2).unwrap();
        assert_eq!(children.len(&node).unwrap(), 2);
        assert_eq!(children.item(&node, 1).unwrap().class_name(), "Inner");
        assert_eq!(
            children.item(&node, 2).err(),
            Some(PropError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn reference_accessor_rejects_wrong_target_type() {
        let mut node = Node::default();
        let set = PropertiesAnalyzer::new().analyze(&node).unwrap();
        let Accessor::Reference(peer) = set.get("peer").unwrap().accessor() else {
            panic!("peer is a reference");
        };

        let other = shared(Inner::default());
        let err = peer.set(&mut node, Some(erase(&other))).unwrap_err();
        assert!(matches!(err, PropError::TypeMismatch { .. }));
        assert!(node.peer.is_none());

        let target = peer.create();
        peer.set(&mut node, Some(target.clone())).unwrap();
        let stored = peer.get(&node).unwrap().unwrap();
        assert!(Rc::ptr_eq(&stored, &target));
    }

    #[test]
    fn descriptor_rejects_foreign_owner() {
        let set = PropertiesAnalyzer::new().analyze(&Node::default()).unwrap();
        let Accessor::Scalar(label) = set.get("label").unwrap().accessor() else {
            panic!("label is a scalar");
        };
        assert!(matches!(
            label.get(&Inner::default()),
            Err(PropError::WrongOwner { .. })
        ));
    }
}
