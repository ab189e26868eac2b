//! The human-legible text encoding.
//!
//! ```text
//! keepsake-text 1
//! object "" : "Counter" @ "T" # 1 {
//!   u32 "Count" = 42;
//!   array<u8> "Bytes" = [1, 2, 3];
//!   list "Items" [
//!     object "" : "Item" {
//!     }
//!   ];
//!   ref "peer" = @ "T" # 2;
//!   null "other";
//! }
//! ```
//!
//! Whitespace is insignificant and `//` starts a line comment. Object nodes
//! end at their closing brace; every other node ends with `;`.

use std::fmt::Write as _;

use keepsake_stream::ByteStream;
use keepsake_tree::{Node, NodeBody, NodePath, RefKey, ScalarKind, SerializationTree, Value};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::format::{CodecOptions, Slot, TreeReader, TreeWriter};
use crate::lexer::{tokenize, Spanned, Token};

/// First line of every text stream.
pub const HEADER: &str = "keepsake-text";
pub const TEXT_VERSION: u16 = 1;

/// Reader and writer for the text encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextCodec {
    options: CodecOptions,
}

impl TextCodec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    /// Render a tree as text without touching a stream.
    pub fn render(&self, tree: &SerializationTree) -> String {
        let mut out = format!("{HEADER} {TEXT_VERSION}\n");
        self.render_node(&mut out, tree.root(), 0);
        out
    }

    /// Render a single node (and its sub-tree), without the header line.
    pub fn render_node(&self, out: &mut String, node: &Node, level: usize) {
        let pad = " ".repeat(level * self.options.indent);
        let name = quote(node.name());
        match node.body() {
            NodeBody::Scalar { value } => {
                let _ = writeln!(out, "{pad}{} {name} = {};", value.kind(), literal(value));
            }
            NodeBody::Array { element, items } => {
                let items: Vec<String> = items.iter().map(literal).collect();
                let _ = writeln!(out, "{pad}array<{element}> {name} = [{}];", items.join(", "));
            }
            NodeBody::Object {
                class,
                identity,
                children,
            } => {
                let _ = write!(out, "{pad}object {name} : {}", quote(class));
                if let Some(key) = identity {
                    let _ = write!(out, " {}", key_literal(key));
                }
                out.push_str(" {\n");
                for child in children {
                    self.render_node(out, child, level + 1);
                }
                let _ = writeln!(out, "{pad}}}");
            }
            NodeBody::List { children } => {
                let _ = writeln!(out, "{pad}list {name} [");
                for child in children {
                    self.render_node(out, child, level + 1);
                }
                let _ = writeln!(out, "{pad}];");
            }
            NodeBody::Reference { key } => {
                let _ = writeln!(out, "{pad}ref {name} = {};", key_literal(key));
            }
            NodeBody::Null => {
                let _ = writeln!(out, "{pad}null {name};");
            }
        }
    }

    /// Parse text produced by [`render`](Self::render).
    pub fn parse(&self, source: &str) -> CodecResult<SerializationTree> {
        let (first, rest) = source.split_once('\n').unwrap_or((source, ""));
        let first = first.trim();
        let version = first
            .strip_prefix(HEADER)
            .map(str::trim)
            .ok_or_else(|| CodecError::Syntax {
                line: 1,
                column: 1,
                path: NodePath::root(),
                reason: format!("expected `{HEADER} {TEXT_VERSION}` header"),
            })?;
        let version: u16 = version.parse().map_err(|_| CodecError::Syntax {
            line: 1,
            column: HEADER.len() + 2,
            path: NodePath::root(),
            reason: format!("invalid version {version:?}"),
        })?;
        if version != TEXT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let mut parser = Parser {
            tokens: tokenize(rest, 2)?,
            pos: 0,
            max_depth: self.options.max_depth,
        };
        let root = parser.node(&NodePath::root(), Slot::Root, 0)?;
        if parser.peek().token != Token::Eof {
            return Err(parser.error(&NodePath::root(), "trailing input after root node"));
        }
        Ok(SerializationTree::new(root)?)
    }
}

impl TreeWriter for TextCodec {
    fn write_tree(&self, tree: &SerializationTree, stream: &mut dyn ByteStream) -> CodecResult<()> {
        let text = self.render(tree);
        stream.write_all(text.as_bytes())?;
        debug!(nodes = tree.node_count(), bytes = text.len(), "wrote text tree");
        Ok(())
    }
}

impl TreeReader for TextCodec {
    fn read_tree(&self, stream: &mut dyn ByteStream) -> CodecResult<SerializationTree> {
        let bytes = stream.read_to_end()?;
        let source = String::from_utf8(bytes)
            .map_err(|_| CodecError::format(&NodePath::root(), "text stream is not valid UTF-8"))?;
        let tree = self.parse(&source)?;
        debug!(nodes = tree.node_count(), "read text tree");
        Ok(tree)
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn key_literal(key: &RefKey) -> String {
    format!("@ {} # {}", quote(&key.tag), key.id)
}

/// Floats use `Debug`, the shortest form that parses back to the same bits.
fn literal(value: &Value) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => format!("{v:?}"),
        Value::F64(v) => format!("{v:?}"),
        Value::Text(s) => quote(s),
        Value::Blob(b) => format!("x\"{}\"", hex::encode(b)),
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Spanned {
        // `tokenize` always ends with Eof, and `bump` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, path: &NodePath, reason: impl Into<String>) -> CodecError {
        let at = self.peek();
        CodecError::Syntax {
            line: at.line,
            column: at.column,
            path: path.clone(),
            reason: reason.into(),
        }
    }

    fn unexpected(&self, path: &NodePath, wanted: &str) -> CodecError {
        let found = self.peek().token.describe();
        self.error(path, format!("expected {wanted}, found {found}"))
    }

    fn is_punct(&self, c: char) -> bool {
        self.peek().token == Token::Punct(c)
    }

    fn punct(&mut self, c: char, path: &NodePath) -> CodecResult<()> {
        if self.is_punct(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(path, &format!("`{c}`")))
        }
    }

    fn string(&mut self, path: &NodePath) -> CodecResult<String> {
        match &self.peek().token {
            Token::Str(_) => match self.bump() {
                Token::Str(s) => Ok(s),
                _ => unreachable!("peeked a string"),
            },
            _ => Err(self.unexpected(path, "a quoted string")),
        }
    }

    fn ident(&mut self, path: &NodePath) -> CodecResult<String> {
        match &self.peek().token {
            Token::Ident(_) => match self.bump() {
                Token::Ident(s) => Ok(s),
                _ => unreachable!("peeked an identifier"),
            },
            _ => Err(self.unexpected(path, "a node kind")),
        }
    }

    fn key(&mut self, path: &NodePath) -> CodecResult<RefKey> {
        self.punct('@', path)?;
        let tag = self.string(path)?;
        self.punct('#', path)?;
        let id = match &self.peek().token {
            Token::Num(n) => n
                .parse::<u64>()
                .map_err(|_| self.error(path, format!("invalid reference id `{n}`")))?,
            _ => return Err(self.unexpected(path, "a reference id")),
        };
        self.bump();
        Ok(RefKey::new(tag, id))
    }

    fn literal(&mut self, kind: ScalarKind, path: &NodePath) -> CodecResult<Value> {
        macro_rules! number {
            ($variant:ident, $ty:ty) => {{
                let text = match &self.peek().token {
                    Token::Num(n) | Token::Ident(n) => n.clone(),
                    _ => return Err(self.unexpected(path, concat!("a ", stringify!($ty), " literal"))),
                };
                let value = text.parse::<$ty>().map_err(|_| {
                    self.error(path, format!(concat!("invalid ", stringify!($ty), " literal `{}`"), text))
                })?;
                self.bump();
                Value::$variant(value)
            }};
        }

        let value = match kind {
            ScalarKind::Bool => {
                let value = match &self.peek().token {
                    Token::Ident(s) if s == "true" => true,
                    Token::Ident(s) if s == "false" => false,
                    _ => return Err(self.unexpected(path, "`true` or `false`")),
                };
                self.bump();
                Value::Bool(value)
            }
            ScalarKind::I8 => number!(I8, i8),
            ScalarKind::I16 => number!(I16, i16),
            ScalarKind::I32 => number!(I32, i32),
            ScalarKind::I64 => number!(I64, i64),
            ScalarKind::U8 => number!(U8, u8),
            ScalarKind::U16 => number!(U16, u16),
            ScalarKind::U32 => number!(U32, u32),
            ScalarKind::U64 => number!(U64, u64),
            ScalarKind::F32 => number!(F32, f32),
            ScalarKind::F64 => number!(F64, f64),
            ScalarKind::Text => Value::Text(self.string(path)?),
            ScalarKind::Blob => match &self.peek().token {
                Token::Blob(_) => match self.bump() {
                    Token::Blob(b) => Value::Blob(b),
                    _ => unreachable!("peeked a hex literal"),
                },
                _ => return Err(self.unexpected(path, "a hex literal `x\"..\"`")),
            },
        };
        Ok(value)
    }

    fn scalar_kind(&mut self, path: &NodePath) -> CodecResult<ScalarKind> {
        let name = self.ident(path)?;
        ScalarKind::from_name(&name)
            .ok_or_else(|| self.error(path, format!("unknown scalar kind `{name}`")))
    }

    fn node(&mut self, parent: &NodePath, slot: Slot, depth: usize) -> CodecResult<Node> {
        if depth >= self.max_depth {
            return Err(self.error(
                parent,
                format!("nesting exceeds the maximum depth of {}", self.max_depth),
            ));
        }

        let keyword = self.ident(parent)?;
        let element = if keyword == "array" {
            self.punct('<', parent)?;
            let element = self.scalar_kind(parent)?;
            self.punct('>', parent)?;
            Some(element)
        } else {
            None
        };
        let name = self.string(parent)?;
        let path = slot.locate(parent, &name);

        if let Some(element) = element {
            self.punct('=', &path)?;
            self.punct('[', &path)?;
            let mut items = Vec::new();
            while !self.is_punct(']') {
                items.push(self.literal(element, &path)?);
                if !self.is_punct(',') {
                    break;
                }
                self.bump();
            }
            self.punct(']', &path)?;
            self.punct(';', &path)?;
            return Ok(Node::array(name, element, items)?);
        }

        match keyword.as_str() {
            "object" => {
                self.punct(':', &path)?;
                let class = self.string(&path)?;
                let identity = if self.is_punct('@') {
                    Some(self.key(&path)?)
                } else {
                    None
                };
                self.punct('{', &path)?;
                let mut node = Node::object(name, class).with_identity(identity);
                while !self.is_punct('}') {
                    if self.peek().token == Token::Eof {
                        return Err(self.unexpected(&path, "`}`"));
                    }
                    node.push_child(self.node(&path, Slot::Child, depth + 1)?)?;
                }
                self.bump();
                Ok(node)
            }
            "list" => {
                self.punct('[', &path)?;
                let mut node = Node::list(name);
                let mut index = 0;
                while !self.is_punct(']') {
                    if self.peek().token == Token::Eof {
                        return Err(self.unexpected(&path, "`]`"));
                    }
                    node.push_child(self.node(&path, Slot::Item(index), depth + 1)?)?;
                    index += 1;
                }
                self.bump();
                self.punct(';', &path)?;
                Ok(node)
            }
            "ref" => {
                self.punct('=', &path)?;
                let key = self.key(&path)?;
                self.punct(';', &path)?;
                Ok(Node::reference(name, key))
            }
            "null" => {
                self.punct(';', &path)?;
                Ok(Node::null(name))
            }
            other => {
                let kind = ScalarKind::from_name(other)
                    .ok_or_else(|| self.error(&path, format!("unknown node kind `{other}`")))?;
                self.punct('=', &path)?;
                let value = self.literal(kind, &path)?;
                self.punct(';', &path)?;
                Ok(Node::scalar(name, value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_stream::MemoryStream;
    use proptest::prelude::*;

    fn codec() -> TextCodec {
        TextCodec::default()
    }

    fn sample() -> SerializationTree {
        let mut root = Node::object("", "Counter").with_identity(Some(RefKey::new("T", 1)));
        root.push_child(Node::scalar("Count", Value::U32(42))).unwrap();
        root.push_child(Node::scalar("Label", Value::Text("al\"pha\n".into())))
            .unwrap();
        root.push_child(Node::scalar("Data", Value::Blob(vec![0xde, 0xad, 0xbe, 0xef])))
            .unwrap();
        root.push_child(
            Node::array("Bytes", ScalarKind::U8, vec![Value::U8(1), Value::U8(2)]).unwrap(),
        )
        .unwrap();
        let mut items = Node::list("Items");
        let mut item = Node::object("", "Item");
        item.push_child(Node::scalar("w", Value::F64(-0.25))).unwrap();
        items.push_child(item).unwrap();
        items.push_child(Node::reference("", RefKey::new("T", 3))).unwrap();
        root.push_child(items).unwrap();
        root.push_child(Node::reference("peer", RefKey::new("T", 2)))
            .unwrap();
        root.push_child(Node::null("other")).unwrap();
        SerializationTree::new(root).unwrap()
    }

    #[test]
    fn render_layout() {
        let text = codec().render(&sample());
        let expected = r#"keepsake-text 1
object "" : "Counter" @ "T" # 1 {
  u32 "Count" = 42;
  text "Label" = "al\"pha\n";
  blob "Data" = x"deadbeef";
  array<u8> "Bytes" = [1, 2];
  list "Items" [
    object "" : "Item" {
      f64 "w" = -0.25;
    }
    ref "" = @ "T" # 3;
  ];
  ref "peer" = @ "T" # 2;
  null "other";
}
"#;
        assert_eq!(text, expected);
    }

    #[test]
    fn parse_inverts_render() {
        let tree = sample();
        assert_eq!(codec().parse(&codec().render(&tree)).unwrap(), tree);
    }

    #[test]
    fn whitespace_and_comments_are_insignificant() {
        let source = "keepsake-text 1\n// a counter\nobject \"\":\"Counter\"{u32 \"Count\"=42;// trailing\narray<i8>\"xs\"=[-1,2,];}";
        let tree = codec().parse(source).unwrap();
        assert_eq!(
            tree.root().child("Count").unwrap().value(),
            Some(&Value::U32(42))
        );
        assert_eq!(
            tree.root().child("xs").unwrap().items().unwrap(),
            &[Value::I8(-1), Value::I8(2)]
        );
    }

    #[test]
    fn special_floats_survive() {
        let mut root = Node::object("", "F");
        root.push_child(Node::scalar("nan", Value::F64(f64::NAN))).unwrap();
        root.push_child(Node::scalar("inf", Value::F32(f32::NEG_INFINITY)))
            .unwrap();
        root.push_child(Node::scalar("tiny", Value::F64(1e-300))).unwrap();
        let tree = SerializationTree::new(root).unwrap();
        let back = codec().parse(&codec().render(&tree)).unwrap();

        match back.root().child("nan").unwrap().value() {
            Some(Value::F64(v)) => assert!(v.is_nan()),
            other => panic!("expected f64, got {other:?}"),
        }
        assert_eq!(
            back.root().child("inf").unwrap().value(),
            Some(&Value::F32(f32::NEG_INFINITY))
        );
        assert_eq!(
            back.root().child("tiny").unwrap().value(),
            Some(&Value::F64(1e-300))
        );
    }

    #[test]
    fn errors_name_line_and_path() {
        let source = "keepsake-text 1\nobject \"\" : \"A\" {\n  u8 \"small\" = 300;\n}\n";
        match codec().parse(source) {
            Err(CodecError::Syntax {
                line, path, reason, ..
            }) => {
                assert_eq!(line, 3);
                assert_eq!(path.to_string(), "/small");
                assert!(reason.contains("u8"), "{reason}");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let source = "keepsake-text 1\nobject \"\" : \"A\" {\n  u128 \"big\" = 1;\n}\n";
        assert!(matches!(
            codec().parse(source),
            Err(CodecError::Syntax { .. })
        ));
    }

    #[test]
    fn depth_limit_counts_the_root_as_one_level() {
        let codec = TextCodec::new(CodecOptions {
            max_depth: 2,
            ..CodecOptions::default()
        });
        let two = "keepsake-text 1\nobject \"\" : \"A\" {\n  object \"b\" : \"B\" {}\n}\n";
        assert!(codec.parse(two).is_ok());

        let three = "keepsake-text 1\nobject \"\" : \"A\" {\n  list \"xs\" [\n    null \"\";\n  ];\n}\n";
        match codec.parse(three) {
            Err(CodecError::Syntax { path, .. }) => assert_eq!(path.to_string(), "/xs"),
            other => panic!("expected depth error, got {other:?}"),
        }
    }

    #[test]
    fn header_is_required() {
        assert!(matches!(
            codec().parse("object \"\" : \"A\" {}"),
            Err(CodecError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            codec().parse("keepsake-text 2\nobject \"\" : \"A\" {}"),
            Err(CodecError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn truncated_text_fails() {
        let text = codec().render(&sample());
        let cut = &text[..text.len() / 2];
        assert!(codec().parse(cut).is_err());
    }

    #[test]
    fn root_must_be_object() {
        assert!(matches!(
            codec().parse("keepsake-text 1\nnull \"x\";"),
            Err(CodecError::Tree(_))
        ));
    }

    #[test]
    fn stream_roundtrip() {
        let mut stream = MemoryStream::new();
        codec().write_tree(&sample(), &mut stream).unwrap();
        stream.set_position(0).unwrap();
        assert_eq!(codec().read_tree(&mut stream).unwrap(), sample());
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::I64),
            any::<u8>().prop_map(Value::U8),
            any::<u64>().prop_map(Value::U64),
            proptest::num::f32::NORMAL.prop_map(Value::F32),
            proptest::num::f64::NORMAL.prop_map(Value::F64),
            any::<String>().prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..12).prop_map(Value::Blob),
        ]
    }

    proptest! {
        #[test]
        fn parse_inverts_render_for_any_scalars(
            values in proptest::collection::vec(("\\PC{0,8}", arb_value()), 0..12)
        ) {
            let mut root = Node::object("", "Props");
            for (name, value) in values {
                root.push_child(Node::scalar(name, value)).unwrap();
            }
            let tree = SerializationTree::new(root).unwrap();
            let back = codec().parse(&codec().render(&tree)).unwrap();
            prop_assert_eq!(back, tree);
        }
    }
}
