//! The binary encoding.
//!
//! ```text
//! header  : "KSBT" | version u16 | reserved u16
//! root    : node
//! trailer : CRC32 u32 over the root node bytes
//! node    : tag u8 | name (u16 len + UTF-8) | payload
//! ```
//!
//! All integers are big-endian. Text and blob payloads carry a u32 length,
//! arrays an element tag and a u32 count followed by bare element payloads,
//! objects their class, optional identity, and a u32 child count.

use keepsake_stream::{ByteStream, ByteStreamExt, StreamError};
use keepsake_tree::{Node, NodeBody, NodePath, RefKey, ScalarKind, SerializationTree, Value};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::format::{CodecOptions, Slot, TreeReader, TreeWriter};
use crate::tags::{self, MAGIC, VERSION};

/// Upper bound on bytes or items reserved ahead of reading them. Streams of
/// unknown size may declare lengths they cannot back.
const READ_AHEAD: usize = 64 * 1024;

/// Reader and writer for the binary encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec {
    options: CodecOptions,
}

impl BinaryCodec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }
}

impl TreeWriter for BinaryCodec {
    fn write_tree(&self, tree: &SerializationTree, stream: &mut dyn ByteStream) -> CodecResult<()> {
        let mut body = Vec::new();
        encode_node(&mut body, tree.root(), &NodePath::root())?;
        let crc = crc32fast::hash(&body);

        stream.write_all(MAGIC)?;
        stream.write_u16(VERSION)?;
        stream.write_u16(0)?;
        stream.write_all(&body)?;
        stream.write_u32(crc)?;

        debug!(nodes = tree.node_count(), bytes = body.len() + 12, "wrote binary tree");
        Ok(())
    }
}

impl TreeReader for BinaryCodec {
    fn read_tree(&self, stream: &mut dyn ByteStream) -> CodecResult<SerializationTree> {
        let root_path = NodePath::root();
        let mut magic = [0u8; 4];
        stream
            .read_exact(&mut magic)
            .map_err(|e| truncated(e, &root_path))?;
        if &magic != MAGIC {
            return Err(CodecError::InvalidMagic {
                expected: hex::encode(MAGIC),
                actual: hex::encode(magic),
            });
        }
        let version = stream.read_u16().map_err(|e| truncated(e, &root_path))?;
        if version != VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        stream.read_u16().map_err(|e| truncated(e, &root_path))?;

        let mut decoder = Decoder {
            stream,
            hasher: crc32fast::Hasher::new(),
            max_depth: self.options.max_depth,
        };
        let root = decoder.node(&root_path, Slot::Root, 0)?;
        let computed = decoder.hasher.finalize();
        let stored = decoder
            .stream
            .read_u32()
            .map_err(|e| truncated(e, &root_path))?;
        if stored != computed {
            return Err(CodecError::ChecksumMismatch { stored, computed });
        }

        let tree = SerializationTree::new(root)?;
        debug!(nodes = tree.node_count(), "read binary tree");
        Ok(tree)
    }
}

fn truncated(err: StreamError, path: &NodePath) -> CodecError {
    if err.is_eof() {
        CodecError::Truncated { path: path.clone() }
    } else {
        CodecError::Stream(err)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn put_string(buf: &mut Vec<u8>, s: &str, path: &NodePath) -> CodecResult<()> {
    let len = u16::try_from(s.len()).map_err(|_| CodecError::Unencodable {
        path: path.clone(),
        reason: format!("string of {} bytes exceeds 65535", s.len()),
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn put_len(buf: &mut Vec<u8>, len: usize, path: &NodePath) -> CodecResult<()> {
    let len = u32::try_from(len).map_err(|_| CodecError::Unencodable {
        path: path.clone(),
        reason: format!("length {len} exceeds u32"),
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn put_key(buf: &mut Vec<u8>, key: &RefKey, path: &NodePath) -> CodecResult<()> {
    put_string(buf, &key.tag, path)?;
    buf.extend_from_slice(&key.id.to_be_bytes());
    Ok(())
}

fn put_value(buf: &mut Vec<u8>, value: &Value, path: &NodePath) -> CodecResult<()> {
    match value {
        Value::Bool(v) => buf.push(u8::from(*v)),
        Value::I8(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::I16(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::I32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::I64(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::U8(v) => buf.push(*v),
        Value::U16(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::U32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::U64(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::F32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::F64(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Text(s) => {
            put_len(buf, s.len(), path)?;
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            put_len(buf, b.len(), path)?;
            buf.extend_from_slice(b);
        }
    }
    Ok(())
}

fn encode_node(buf: &mut Vec<u8>, node: &Node, path: &NodePath) -> CodecResult<()> {
    buf.push(tags::node_tag(node.kind()));
    put_string(buf, node.name(), path)?;

    match node.body() {
        NodeBody::Scalar { value } => put_value(buf, value, path)?,
        NodeBody::Array { element, items } => {
            buf.push(tags::scalar_tag(*element));
            put_len(buf, items.len(), path)?;
            for item in items {
                put_value(buf, item, path)?;
            }
        }
        NodeBody::Object {
            class,
            identity,
            children,
        } => {
            put_string(buf, class, path)?;
            match identity {
                Some(key) => {
                    buf.push(1);
                    put_key(buf, key, path)?;
                }
                None => buf.push(0),
            }
            put_len(buf, children.len(), path)?;
            for child in children {
                encode_node(buf, child, &path.child(child.name()))?;
            }
        }
        NodeBody::List { children } => {
            put_len(buf, children.len(), path)?;
            for (i, child) in children.iter().enumerate() {
                encode_node(buf, child, &path.index(i))?;
            }
        }
        NodeBody::Reference { key } => put_key(buf, key, path)?,
        NodeBody::Null => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Stream-driven decoder that feeds every consumed byte into the trailer CRC.
struct Decoder<'s> {
    stream: &'s mut dyn ByteStream,
    hasher: crc32fast::Hasher,
    max_depth: usize,
}

impl Decoder<'_> {
    /// Reject declared lengths that cannot fit in what is left of the stream.
    fn check_len(&self, len: u64, path: &NodePath) -> CodecResult<()> {
        match self.stream.remaining() {
            Some(remaining) if len > remaining => Err(CodecError::Truncated { path: path.clone() }),
            _ => Ok(()),
        }
    }

    fn bytes(&mut self, len: usize, path: &NodePath) -> CodecResult<Vec<u8>> {
        self.check_len(len as u64, path)?;
        let mut buf = Vec::with_capacity(len.min(READ_AHEAD));
        while buf.len() < len {
            let start = buf.len();
            buf.resize(start + (len - start).min(READ_AHEAD), 0);
            self.stream
                .read_exact(&mut buf[start..])
                .map_err(|e| truncated(e, path))?;
        }
        self.hasher.update(&buf);
        Ok(buf)
    }

    fn array<const N: usize>(&mut self, path: &NodePath) -> CodecResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.stream
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, path))?;
        self.hasher.update(&buf);
        Ok(buf)
    }

    fn u8(&mut self, path: &NodePath) -> CodecResult<u8> {
        Ok(self.array::<1>(path)?[0])
    }

    fn u16(&mut self, path: &NodePath) -> CodecResult<u16> {
        Ok(u16::from_be_bytes(self.array(path)?))
    }

    fn u32(&mut self, path: &NodePath) -> CodecResult<u32> {
        Ok(u32::from_be_bytes(self.array(path)?))
    }

    fn u64(&mut self, path: &NodePath) -> CodecResult<u64> {
        Ok(u64::from_be_bytes(self.array(path)?))
    }

    fn utf8(&mut self, len: usize, path: &NodePath) -> CodecResult<String> {
        let bytes = self.bytes(len, path)?;
        String::from_utf8(bytes).map_err(|_| CodecError::format(path, "string is not valid UTF-8"))
    }

    fn string(&mut self, path: &NodePath) -> CodecResult<String> {
        let len = self.u16(path)?;
        self.utf8(usize::from(len), path)
    }

    fn key(&mut self, path: &NodePath) -> CodecResult<RefKey> {
        let tag = self.string(path)?;
        let id = self.u64(path)?;
        Ok(RefKey::new(tag, id))
    }

    fn count(&mut self, min_item_len: u64, path: &NodePath) -> CodecResult<usize> {
        let count = self.u32(path)?;
        self.check_len(u64::from(count) * min_item_len, path)?;
        Ok(count as usize)
    }

    fn value(&mut self, kind: ScalarKind, path: &NodePath) -> CodecResult<Value> {
        Ok(match kind {
            ScalarKind::Bool => match self.u8(path)? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => {
                    return Err(CodecError::format(path, format!("invalid bool byte {other}")))
                }
            },
            ScalarKind::I8 => Value::I8(i8::from_be_bytes(self.array(path)?)),
            ScalarKind::I16 => Value::I16(i16::from_be_bytes(self.array(path)?)),
            ScalarKind::I32 => Value::I32(i32::from_be_bytes(self.array(path)?)),
            ScalarKind::I64 => Value::I64(i64::from_be_bytes(self.array(path)?)),
            ScalarKind::U8 => Value::U8(self.u8(path)?),
            ScalarKind::U16 => Value::U16(self.u16(path)?),
            ScalarKind::U32 => Value::U32(self.u32(path)?),
            ScalarKind::U64 => Value::U64(self.u64(path)?),
            ScalarKind::F32 => Value::F32(f32::from_be_bytes(self.array(path)?)),
            ScalarKind::F64 => Value::F64(f64::from_be_bytes(self.array(path)?)),
            ScalarKind::Text => {
                let len = self.u32(path)?;
                Value::Text(self.utf8(len as usize, path)?)
            }
            ScalarKind::Blob => {
                let len = self.u32(path)?;
                Value::Blob(self.bytes(len as usize, path)?)
            }
        })
    }

    fn node(&mut self, parent: &NodePath, slot: Slot, depth: usize) -> CodecResult<Node> {
        if depth >= self.max_depth {
            return Err(CodecError::format(
                parent,
                format!("nesting exceeds the maximum depth of {}", self.max_depth),
            ));
        }

        let tag = self.u8(parent)?;
        let name = self.string(parent)?;
        let path = slot.locate(parent, &name);

        if let Some(kind) = tags::scalar_from_tag(tag) {
            let value = self.value(kind, &path)?;
            return Ok(Node::scalar(name, value));
        }

        match tag {
            tags::ARRAY => {
                let element_tag = self.u8(&path)?;
                let element = tags::scalar_from_tag(element_tag).ok_or_else(|| {
                    CodecError::UnknownTag {
                        path: path.clone(),
                        tag: element_tag,
                    }
                })?;
                let min = element.fixed_width().unwrap_or(4) as u64;
                let count = self.count(min, &path)?;
                let mut items = Vec::with_capacity(count.min(READ_AHEAD));
                for _ in 0..count {
                    items.push(self.value(element, &path)?);
                }
                Ok(Node::array(name, element, items)?)
            }
            tags::OBJECT => {
                let class = self.string(&path)?;
                let identity = match self.u8(&path)? {
                    0 => None,
                    1 => Some(self.key(&path)?),
                    other => {
                        return Err(CodecError::format(
                            &path,
                            format!("invalid identity flag {other}"),
                        ))
                    }
                };
                // Smallest possible child: tag + empty name.
                let count = self.count(3, &path)?;
                let mut node = Node::object(name, class).with_identity(identity);
                for _ in 0..count {
                    let child = self.node(&path, Slot::Child, depth + 1)?;
                    node.push_child(child)?;
                }
                Ok(node)
            }
            tags::LIST => {
                let count = self.count(3, &path)?;
                let mut node = Node::list(name);
                for i in 0..count {
                    let child = self.node(&path, Slot::Item(i), depth + 1)?;
                    node.push_child(child)?;
                }
                Ok(node)
            }
            tags::REFERENCE => Ok(Node::reference(name, self.key(&path)?)),
            tags::NULL => Ok(Node::null(name)),
            other => Err(CodecError::UnknownTag { path, tag: other }),
        }
    }
}
