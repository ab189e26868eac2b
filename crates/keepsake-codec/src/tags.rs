//! One-byte node type tags of the binary encoding.

use keepsake_tree::{NodeKind, ScalarKind};

pub const MAGIC: &[u8; 4] = b"KSBT";
pub const VERSION: u16 = 1;

pub const BOOL: u8 = 0x01;
pub const I8: u8 = 0x02;
pub const I16: u8 = 0x03;
pub const I32: u8 = 0x04;
pub const I64: u8 = 0x05;
pub const U8: u8 = 0x06;
pub const U16: u8 = 0x07;
pub const U32: u8 = 0x08;
pub const U64: u8 = 0x09;
pub const F32: u8 = 0x0A;
pub const F64: u8 = 0x0B;
pub const TEXT: u8 = 0x0C;
pub const BLOB: u8 = 0x0D;
pub const ARRAY: u8 = 0x10;
pub const OBJECT: u8 = 0x20;
pub const LIST: u8 = 0x21;
pub const REFERENCE: u8 = 0x30;
pub const NULL: u8 = 0x31;

/// Type byte for a scalar kind.
pub fn scalar_tag(kind: ScalarKind) -> u8 {
    match kind {
        ScalarKind::Bool => BOOL,
        ScalarKind::I8 => I8,
        ScalarKind::I16 => I16,
        ScalarKind::I32 => I32,
        ScalarKind::I64 => I64,
        ScalarKind::U8 => U8,
        ScalarKind::U16 => U16,
        ScalarKind::U32 => U32,
        ScalarKind::U64 => U64,
        ScalarKind::F32 => F32,
        ScalarKind::F64 => F64,
        ScalarKind::Text => TEXT,
        ScalarKind::Blob => BLOB,
    }
}

/// Inverse of [`scalar_tag`].
pub fn scalar_from_tag(tag: u8) -> Option<ScalarKind> {
    ScalarKind::ALL.into_iter().find(|k| scalar_tag(*k) == tag)
}

/// Type byte for a node kind.
pub fn node_tag(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Scalar(k) => scalar_tag(k),
        NodeKind::Array(_) => ARRAY,
        NodeKind::Object => OBJECT,
        NodeKind::List => LIST,
        NodeKind::Reference => REFERENCE,
        NodeKind::Null => NULL,
    }
}
