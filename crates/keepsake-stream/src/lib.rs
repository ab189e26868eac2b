//! Byte streams for the Keepsake persistence engine.
//!
//! Every tree reader and writer talks to storage through the [`ByteStream`]
//! trait: position-addressable reads and writes of raw bytes, with
//! [`ByteStreamExt`] adding big-endian fixed-size values on top.
//!
//! # Backends
//!
//! - [`MemoryStream`] -- growable `Vec<u8>` buffer
//! - [`FileStream`] -- file on disk, opened strict, permissive, read-only, or truncating
//! - [`HandleStream`] -- sequential OS handle (pipes); no seek, no size

pub mod error;
pub mod file;
pub mod handle;
pub mod memory;
pub mod traits;

pub use error::{StreamError, StreamResult};
pub use file::{FileStream, OpenMode};
pub use handle::HandleStream;
pub use memory::MemoryStream;
pub use traits::{ByteStream, ByteStreamExt, SeekOrigin};
