//! # keepsake-props
//!
//! The object side of the persistence engine. An object implements
//! [`Persistable`] and enumerates its properties through a [`Declaration`];
//! the [`PropertiesAnalyzer`] turns that declaration into an ordered
//! [`DescriptorSet`] of type-erased [`PropertyDescriptor`]s that the
//! serializer drives without knowing the concrete type.
//!
//! Objects that are shared or referenced by identity live in [`Shared`]
//! handles (`Rc<RefCell<T>>`).

pub mod analyzer;
pub mod descriptor;
pub mod error;
mod macros;
pub mod object;
pub mod scalar;

pub use analyzer::{Declaration, DescriptorSet, PropertiesAnalyzer, Props};
pub use descriptor::{
    Accessor, ArrayAccessor, ListAccessor, ObjectAccessor, PropertyDescriptor, PropertyKind,
    ReferenceAccessor, ScalarAccessor, SharedListAccessor, StoreMode,
};
pub use error::{PropError, PropResult};
pub use keepsake_tree::RefKey;
pub use object::{
    downcast_shared, erase, object_address, shared, AsAny, ErasedShared, Persistable, Shared,
    SharedObject,
};
pub use scalar::ScalarType;
