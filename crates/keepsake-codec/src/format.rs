//! Format selection and the writer/reader contract.

use std::fmt;
use std::str::FromStr;

use keepsake_stream::ByteStream;
use keepsake_tree::{NodePath, SerializationTree};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binary::BinaryCodec;
use crate::error::CodecResult;
use crate::tags::MAGIC;
use crate::text::TextCodec;

/// Deepest nesting either reader accepts.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Physical encoding of a serialization tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Text,
    #[default]
    Binary,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "binary" | "bin" => Ok(Self::Binary),
            other => Err(format!("unknown format {other:?}, expected text or binary")),
        }
    }
}

/// Writes a tree to a stream in one physical encoding.
pub trait TreeWriter {
    fn write_tree(&self, tree: &SerializationTree, stream: &mut dyn ByteStream) -> CodecResult<()>;
}

/// Reads a tree from a stream in one physical encoding.
///
/// A reader either returns a complete tree or an error; partially decoded
/// trees are discarded.
pub trait TreeReader {
    fn read_tree(&self, stream: &mut dyn ByteStream) -> CodecResult<SerializationTree>;
}

/// Knobs shared by both encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecOptions {
    /// Spaces per nesting level in text output.
    pub indent: usize,
    /// Readers reject trees with more nesting levels than this. The root
    /// object is level 1.
    pub max_depth: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Where a node sits relative to its parent while decoding.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Slot {
    Root,
    Child,
    Item(usize),
}

impl Slot {
    /// Path of a node named `name` in this slot under `parent`.
    pub(crate) fn locate(self, parent: &NodePath, name: &str) -> NodePath {
        match self {
            Self::Root => NodePath::root(),
            Self::Child => parent.child(name),
            Self::Item(i) => parent.index(i),
        }
    }
}

pub fn writer_for(format: Format, options: CodecOptions) -> Box<dyn TreeWriter> {
    match format {
        Format::Text => Box::new(TextCodec::new(options)),
        Format::Binary => Box::new(BinaryCodec::new(options)),
    }
}

pub fn reader_for(format: Format, options: CodecOptions) -> Box<dyn TreeReader> {
    match format {
        Format::Text => Box::new(TextCodec::new(options)),
        Format::Binary => Box::new(BinaryCodec::new(options)),
    }
}

/// Sniff the encoding at the current position without consuming input.
///
/// Streams that start with the binary magic are binary; anything else is
/// treated as text. Requires a seekable stream.
pub fn detect_format(stream: &mut dyn ByteStream) -> CodecResult<Format> {
    let start = stream.position();
    let mut head = [0u8; 4];
    let mut filled = 0;
    while filled < head.len() {
        let n = stream.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    stream.set_position(start)?;

    let format = if &head[..filled] == MAGIC {
        Format::Binary
    } else {
        Format::Text
    };
    debug!(%format, "detected stream format");
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_stream::MemoryStream;
    use keepsake_tree::{Node, Value};

    fn sample() -> SerializationTree {
        let mut root = Node::object("", "Sample");
        root.push_child(Node::scalar("n", Value::I32(-3))).unwrap();
        SerializationTree::new(root).unwrap()
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("TEXT".parse::<Format>(), Ok(Format::Text));
        assert_eq!("binary".parse::<Format>(), Ok(Format::Binary));
        assert!("yaml".parse::<Format>().is_err());
        assert_eq!(Format::Text.to_string(), "text");
    }

    #[test]
    fn detect_sniffs_and_rewinds() {
        for format in [Format::Text, Format::Binary] {
            let mut stream = MemoryStream::new();
            writer_for(format, CodecOptions::default())
                .write_tree(&sample(), &mut stream)
                .unwrap();
            stream.set_position(0).unwrap();

            assert_eq!(detect_format(&mut stream).unwrap(), format);
            assert_eq!(stream.position(), 0);
            let tree = reader_for(format, CodecOptions::default())
                .read_tree(&mut stream)
                .unwrap();
            assert_eq!(tree, sample());
        }
    }

    #[test]
    fn detect_short_stream_is_text() {
        let mut stream = MemoryStream::from_bytes(b"KS".to_vec());
        assert_eq!(detect_format(&mut stream).unwrap(), Format::Text);
    }
}
