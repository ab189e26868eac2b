//! Mapping between Rust scalar types and tree [`Value`]s.

use keepsake_tree::{ScalarKind, Value};

/// A Rust type that persists as one scalar kind.
pub trait ScalarType: Clone + 'static {
    const KIND: ScalarKind;

    fn into_value(self) -> Value;

    /// `None` if `value` is not of [`Self::KIND`].
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! scalar_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ScalarType for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_type! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Text,
    Vec<u8> => Blob,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_values() {
        assert_eq!(42u32.into_value(), Value::U32(42));
        assert_eq!(<u32 as ScalarType>::KIND, ScalarKind::U32);
        assert_eq!(String::from("a").into_value().kind(), String::KIND);
        assert_eq!(vec![1u8, 2].into_value(), Value::Blob(vec![1, 2]));
    }

    #[test]
    fn from_value_rejects_other_kinds() {
        assert_eq!(u32::from_value(Value::U32(7)), Some(7));
        assert_eq!(u32::from_value(Value::U64(7)), None);
        assert_eq!(String::from_value(Value::Blob(vec![])), None);
    }
}
