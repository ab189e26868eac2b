//! The [`Persistable`] contract and shared-object handles.
//!
//! Objects that are referenced by identity live in a [`Shared`] handle
//! (`Rc<RefCell<T>>`). The engine only ever sees them through the
//! type-erased [`SharedObject`], and hands typed handles back to setters via
//! [`downcast_shared`].

use std::any::{type_name, Any};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use keepsake_tree::RefKey;

use crate::analyzer::Declaration;

/// Upcast helper implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An object that can be stored and restored.
///
/// The object, not the engine, enumerates its persistable properties: the
/// engine calls [`declare`](Self::declare) every time it needs the property
/// list, and the callback must register the same names in the same order
/// each time.
pub trait Persistable: AsAny {
    /// Stable class name written at the head of every object node.
    fn class_name(&self) -> &str;

    /// Register this object's properties, in persistence order.
    fn declare(&self, decl: &mut Declaration);

    /// Identity used when this object takes part in by-reference storage.
    fn reference_key(&self) -> Option<RefKey> {
        None
    }
}

/// Handle to an object that can be referenced by identity.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a value in a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Object-safe view of a `RefCell<T: Persistable>`.
pub trait ErasedShared {
    /// Borrow the object, or `None` if it is mutably borrowed.
    fn try_object(&self) -> Option<Ref<'_, dyn Persistable>>;

    /// Mutably borrow the object, or `None` if it is borrowed.
    fn try_object_mut(&self) -> Option<RefMut<'_, dyn Persistable>>;

    /// Rust type name of the wrapped object.
    fn type_name(&self) -> &'static str;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Persistable> ErasedShared for RefCell<T> {
    fn try_object(&self) -> Option<Ref<'_, dyn Persistable>> {
        let guard = self.try_borrow().ok()?;
        Some(Ref::map(guard, |obj| obj as &dyn Persistable))
    }

    fn try_object_mut(&self) -> Option<RefMut<'_, dyn Persistable>> {
        let guard = self.try_borrow_mut().ok()?;
        Some(RefMut::map(guard, |obj| obj as &mut dyn Persistable))
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Type-erased shared object.
pub type SharedObject = Rc<dyn ErasedShared>;

/// Erase a typed handle. The result points at the same allocation.
pub fn erase<T: Persistable>(object: &Shared<T>) -> SharedObject {
    object.clone()
}

/// Recover a typed handle, or `None` if the object is not a `T`.
pub fn downcast_shared<T: Persistable>(object: SharedObject) -> Option<Shared<T>> {
    object.into_any().downcast::<RefCell<T>>().ok()
}

/// Address of the shared allocation, stable for the object's lifetime.
pub fn object_address(object: &SharedObject) -> usize {
    Rc::as_ptr(object) as *const () as usize
}
