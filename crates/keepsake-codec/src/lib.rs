//! Physical encodings of the Keepsake serialization tree.
//!
//! Two encodings share one contract, [`TreeWriter`] / [`TreeReader`]:
//!
//! - **binary** ([`BinaryCodec`]): compact, big-endian, CRC32-checked;
//! - **text** ([`TextCodec`]): human-legible, diff-friendly, commented.
//!
//! Both walk the tree depth-first in child order, so a tree written in one
//! encoding and re-read in the other is identical. Readers reject malformed
//! input with a [`CodecError`] that names the offending node path.

pub mod binary;
pub mod error;
pub mod format;
mod lexer;
pub mod tags;
pub mod text;

pub use binary::BinaryCodec;
pub use error::{CodecError, CodecResult};
pub use format::{
    detect_format, reader_for, writer_for, CodecOptions, Format, TreeReader, TreeWriter,
    DEFAULT_MAX_DEPTH,
};
pub use text::TextCodec;
