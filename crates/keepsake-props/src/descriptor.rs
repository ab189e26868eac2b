//! Type-erased property descriptors.
//!
//! A [`PropertyDescriptor`] binds a name to an [`Accessor`]. Accessors hold
//! boxed closures over `dyn Any`; each closure downcasts the owner to the
//! declaring type and fails with [`PropError::WrongOwner`] otherwise.

use std::any::Any;
use std::fmt;

use keepsake_tree::{ScalarKind, Value};
use serde::{Deserialize, Serialize};

use crate::error::{PropError, PropResult};
use crate::object::{Persistable, SharedObject};

/// How a property that points at another object is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreMode {
    /// Inline the target's properties.
    ByValue,
    /// Write only the target's (tag, id).
    #[default]
    ByReference,
}

/// Declared value kind of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Scalar(ScalarKind),
    Array(ScalarKind),
    Object,
    Reference,
    List,
    SharedList,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(k) => write!(f, "{k}"),
            Self::Array(k) => write!(f, "array<{k}>"),
            Self::Object => f.write_str("object"),
            Self::Reference => f.write_str("reference"),
            Self::List => f.write_str("list"),
            Self::SharedList => f.write_str("shared list"),
        }
    }
}

pub(crate) type ValueGetter = Box<dyn Fn(&dyn Any) -> PropResult<Value>>;
pub(crate) type ValueSetter = Box<dyn Fn(&mut dyn Any, Value) -> PropResult<()>>;
pub(crate) type ItemsGetter = Box<dyn Fn(&dyn Any) -> PropResult<Vec<Value>>>;
pub(crate) type ItemsSetter = Box<dyn Fn(&mut dyn Any, Vec<Value>) -> PropResult<()>>;
pub(crate) type ObjectGetter = Box<dyn for<'a> Fn(&'a dyn Any) -> PropResult<&'a dyn Persistable>>;
pub(crate) type ObjectGetterMut =
    Box<dyn for<'a> Fn(&'a mut dyn Any) -> PropResult<&'a mut dyn Persistable>>;
pub(crate) type ItemGetter =
    Box<dyn for<'a> Fn(&'a dyn Any, usize) -> PropResult<&'a dyn Persistable>>;
pub(crate) type ItemGetterMut =
    Box<dyn for<'a> Fn(&'a mut dyn Any, usize) -> PropResult<&'a mut dyn Persistable>>;
pub(crate) type SharedGetter = Box<dyn Fn(&dyn Any) -> PropResult<Option<SharedObject>>>;
pub(crate) type SharedSetter = Box<dyn Fn(&mut dyn Any, Option<SharedObject>) -> PropResult<()>>;
pub(crate) type SharedItemsGetter = Box<dyn Fn(&dyn Any) -> PropResult<Vec<SharedObject>>>;
pub(crate) type SharedItemsSetter = Box<dyn Fn(&mut dyn Any, Vec<SharedObject>) -> PropResult<()>>;
pub(crate) type Factory = Box<dyn Fn() -> SharedObject>;
pub(crate) type Resize = Box<dyn Fn(&mut dyn Any, usize) -> PropResult<()>>;
pub(crate) type Length = Box<dyn Fn(&dyn Any) -> PropResult<usize>>;

/// A single scalar property.
pub struct ScalarAccessor {
    pub(crate) kind: ScalarKind,
    pub(crate) get: ValueGetter,
    pub(crate) set: Option<ValueSetter>,
}

impl ScalarAccessor {
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn get(&self, owner: &dyn Persistable) -> PropResult<Value> {
        (self.get)(owner.as_any())
    }

    pub fn set(&self, owner: &mut dyn Persistable, value: Value) -> PropResult<()> {
        let set = self.set.as_ref().ok_or(PropError::ReadOnly)?;
        if value.kind() != self.kind {
            return Err(PropError::TypeMismatch {
                expected: self.kind.to_string(),
                found: value.kind().to_string(),
            });
        }
        set(owner.as_any_mut(), value)
    }
}

/// A homogeneous array of scalars.
pub struct ArrayAccessor {
    pub(crate) element: ScalarKind,
    pub(crate) get: ItemsGetter,
    pub(crate) set: Option<ItemsSetter>,
}

impl ArrayAccessor {
    pub fn element(&self) -> ScalarKind {
        self.element
    }

    pub fn get(&self, owner: &dyn Persistable) -> PropResult<Vec<Value>> {
        (self.get)(owner.as_any())
    }

    pub fn set(&self, owner: &mut dyn Persistable, items: Vec<Value>) -> PropResult<()> {
        let set = self.set.as_ref().ok_or(PropError::ReadOnly)?;
        if let Some(bad) = items.iter().find(|v| v.kind() != self.element) {
            return Err(PropError::TypeMismatch {
                expected: format!("array<{}>", self.element),
                found: format!("array containing {}", bad.kind()),
            });
        }
        set(owner.as_any_mut(), items)
    }
}

/// A nested object owned by its parent.
pub struct ObjectAccessor {
    pub(crate) get: ObjectGetter,
    pub(crate) get_mut: ObjectGetterMut,
}

impl ObjectAccessor {
    pub fn get<'a>(&self, owner: &'a dyn Persistable) -> PropResult<&'a dyn Persistable> {
        (self.get)(owner.as_any())
    }

    pub fn get_mut<'a>(
        &self,
        owner: &'a mut dyn Persistable,
    ) -> PropResult<&'a mut dyn Persistable> {
        (self.get_mut)(owner.as_any_mut())
    }
}

/// An optional pointer to a shared object (`Option<Shared<U>>`).
pub struct ReferenceAccessor {
    pub(crate) target: &'static str,
    pub(crate) get: SharedGetter,
    pub(crate) set: SharedSetter,
    pub(crate) create: Factory,
}

impl ReferenceAccessor {
    /// Rust type name of the referenced object type.
    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn get(&self, owner: &dyn Persistable) -> PropResult<Option<SharedObject>> {
        (self.get)(owner.as_any())
    }

    /// Point the property at `target`; fails if `target` is of another type.
    pub fn set(&self, owner: &mut dyn Persistable, target: Option<SharedObject>) -> PropResult<()> {
        (self.set)(owner.as_any_mut(), target)
    }

    /// A fresh default-constructed target, for inline restores.
    pub fn create(&self) -> SharedObject {
        (self.create)()
    }
}

/// A list of objects owned by their parent (`Vec<U>`).
pub struct ListAccessor {
    pub(crate) len: Length,
    pub(crate) item: ItemGetter,
    pub(crate) item_mut: ItemGetterMut,
    pub(crate) reset: Resize,
}

impl ListAccessor {
    pub fn len(&self, owner: &dyn Persistable) -> PropResult<usize> {
        (self.len)(owner.as_any())
    }

    pub fn item<'a>(&self, owner: &'a dyn Persistable, index: usize) -> PropResult<&'a dyn Persistable> {
        (self.item)(owner.as_any(), index)
    }

    pub fn item_mut<'a>(
        &self,
        owner: &'a mut dyn Persistable,
        index: usize,
    ) -> PropResult<&'a mut dyn Persistable> {
        (self.item_mut)(owner.as_any_mut(), index)
    }

    /// Replace the list with `len` default-constructed elements.
    pub fn reset(&self, owner: &mut dyn Persistable, len: usize) -> PropResult<()> {
        (self.reset)(owner.as_any_mut(), len)
    }
}

/// A list of shared objects (`Vec<Shared<U>>`).
pub struct SharedListAccessor {
    pub(crate) target: &'static str,
    pub(crate) get: SharedItemsGetter,
    pub(crate) set: SharedItemsSetter,
    pub(crate) create: Factory,
}

impl SharedListAccessor {
    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn get(&self, owner: &dyn Persistable) -> PropResult<Vec<SharedObject>> {
        (self.get)(owner.as_any())
    }

    pub fn set(&self, owner: &mut dyn Persistable, items: Vec<SharedObject>) -> PropResult<()> {
        (self.set)(owner.as_any_mut(), items)
    }

    pub fn create(&self) -> SharedObject {
        (self.create)()
    }
}

/// The getter/setter machinery behind a descriptor.
pub enum Accessor {
    Scalar(ScalarAccessor),
    Array(ArrayAccessor),
    Object(ObjectAccessor),
    Reference(ReferenceAccessor),
    List(ListAccessor),
    SharedList(SharedListAccessor),
}

/// A named, typed, type-erased property binding.
pub struct PropertyDescriptor {
    name: String,
    mode: Option<StoreMode>,
    accessor: Accessor,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, accessor: Accessor) -> Self {
        Self {
            name: name.into(),
            mode: None,
            accessor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        match &self.accessor {
            Accessor::Scalar(a) => PropertyKind::Scalar(a.kind),
            Accessor::Array(a) => PropertyKind::Array(a.element),
            Accessor::Object(_) => PropertyKind::Object,
            Accessor::Reference(_) => PropertyKind::Reference,
            Accessor::List(_) => PropertyKind::List,
            Accessor::SharedList(_) => PropertyKind::SharedList,
        }
    }

    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    /// Per-property store mode override; `None` follows the session.
    pub fn mode(&self) -> Option<StoreMode> {
        self.mode
    }

    pub fn set_mode(&mut self, mode: StoreMode) {
        self.mode = Some(mode);
    }

    /// Effective store mode given the session default.
    pub fn effective_mode(&self, session: StoreMode) -> StoreMode {
        self.mode.unwrap_or(session)
    }

    /// Returns `true` if restore must skip this property.
    pub fn is_read_only(&self) -> bool {
        match &self.accessor {
            Accessor::Scalar(a) => a.set.is_none(),
            Accessor::Array(a) => a.set.is_none(),
            _ => false,
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("mode", &self.mode)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}
