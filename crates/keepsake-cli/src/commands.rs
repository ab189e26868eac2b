use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use keepsake_codec::{detect_format, CodecOptions, Format, TextCodec};
use keepsake_serializer::{Serializer, SerializerConfig};
use keepsake_stream::{FileStream, OpenMode};
use keepsake_tree::{Node, NodeBody, NodePath, Segment, SerializationTree, Value};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => SerializerConfig::load(path)?,
        None => SerializerConfig::default(),
    };
    let serializer = Serializer::new(config);
    let input = cli.format.fixed();

    match cli.command {
        Command::Inspect(args) => cmd_inspect(&serializer, input, args),
        Command::Convert(args) => cmd_convert(&serializer, input, args),
        Command::Find(args) => cmd_find(&serializer, input, args),
        Command::Verify(args) => cmd_verify(&serializer, input, args),
    }
}

fn cmd_inspect(serializer: &Serializer, input: Option<Format>, args: InspectArgs) -> anyhow::Result<()> {
    let (tree, _) = load_tree(serializer, &args.file, input)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print!("{}", outline(&tree));
    }
    Ok(())
}

fn cmd_convert(serializer: &Serializer, input: Option<Format>, args: ConvertArgs) -> anyhow::Result<()> {
    let (tree, from) = load_tree(serializer, &args.input, input)?;
    let to = args.to.map_or(serializer.config().format, Format::from);
    let mut out = FileStream::open(&args.output, OpenMode::Truncate)
        .with_context(|| format!("cannot create {}", args.output.display()))?;
    serializer.write_tree(&tree, &mut out, to)?;
    out.sync()?;
    println!(
        "{} Converted {} ({}) → {} ({}), {} nodes",
        "✓".green().bold(),
        args.input.display().to_string().bold(),
        from,
        args.output.display().to_string().bold(),
        to.to_string().cyan(),
        tree.node_count()
    );
    Ok(())
}

fn cmd_find(serializer: &Serializer, input: Option<Format>, args: FindArgs) -> anyhow::Result<()> {
    let (tree, _) = load_tree(serializer, &args.file, input)?;
    let node = serializer.find_node(&tree, &args.path)?;
    let codec = TextCodec::new(CodecOptions {
        indent: serializer.config().indent,
        ..CodecOptions::default()
    });
    let mut out = String::new();
    codec.render_node(&mut out, node, 0);
    print!("{out}");
    Ok(())
}

fn cmd_verify(serializer: &Serializer, input: Option<Format>, args: VerifyArgs) -> anyhow::Result<()> {
    match load_tree(serializer, &args.file, input) {
        Ok((tree, format)) => {
            println!("{} {} is a valid {} stream", "✓".green().bold(), args.file.display().to_string().bold(), format);
            println!("  Root class: {}", tree.root_class().cyan());
            println!("  Nodes: {}", tree.node_count().to_string().bold());
            Ok(())
        }
        Err(err) => {
            println!("{} {} failed verification", "✗".red().bold(), args.file.display().to_string().bold());
            Err(err)
        }
    }
}

fn load_tree(
    serializer: &Serializer,
    path: &Path,
    input: Option<Format>,
) -> anyhow::Result<(SerializationTree, Format)> {
    let mut stream = FileStream::open(path, OpenMode::ReadOnly)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let format = match input {
        Some(format) => format,
        None => detect_format(&mut stream)?,
    };
    let tree = serializer
        .read_tree(&mut stream, format)
        .with_context(|| format!("cannot read {} as {format}", path.display()))?;
    Ok((tree, format))
}

fn outline(tree: &SerializationTree) -> String {
    let mut out = String::new();
    for (path, node) in tree.walk() {
        let indent = "  ".repeat(path.depth());
        out.push_str(&format!("{indent}{} {}\n", label(&path, node).bold(), describe(node)));
    }
    out
}

fn label(path: &NodePath, node: &Node) -> String {
    match path.segments().last() {
        None => "/".to_string(),
        Some(Segment::Index(i)) => format!("[{i}]"),
        Some(Segment::Name(_)) => node.name().to_string(),
    }
}

fn describe(node: &Node) -> String {
    match node.body() {
        NodeBody::Scalar { value } => format!("{} = {}", value.kind().to_string().cyan(), render_value(value)),
        NodeBody::Array { element, items } => {
            let items: Vec<String> = items.iter().map(render_value).collect();
            format!("{} = [{}]", format!("array<{element}>").cyan(), items.join(", "))
        }
        NodeBody::Object { class, identity, children } => {
            let identity = identity
                .as_ref()
                .map(|key| format!(" @ {}", key.to_string().yellow()))
                .unwrap_or_default();
            format!("{}{identity} ({} properties)", class.green(), children.len())
        }
        NodeBody::List { children } => format!("{} ({} items)", "list".cyan(), children.len()),
        NodeBody::Reference { key } => format!("{} {}", "ref".cyan(), key.to_string().yellow()),
        NodeBody::Null => "null".dimmed().to_string(),
    }
}

fn render_value(value: &Value) -> String {
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
        Value::Text(v) => format!("{v:?}"),
        Value::Blob(v) => format!("x\"{}\"", hex::encode(v)),
    }
}

#[cfg(test)]
mod tests {
    use keepsake_tree::RefKey;

    use super::*;

    fn sample() -> SerializationTree {
        let mut root = Node::object("", "Counter").with_identity(Some(RefKey::new("T", 1)));
        root.push_child(Node::scalar("Count", Value::U32(42))).unwrap();
        let mut items = Node::list("items");
        items.push_child(Node::reference("", RefKey::new("T", 2))).unwrap();
        root.push_child(items).unwrap();
        root.push_child(Node::null("peer")).unwrap();
        SerializationTree::new(root).unwrap()
    }

    fn write(path: &Path, format: Format) {
        let mut stream = FileStream::open(path, OpenMode::Truncate).unwrap();
        Serializer::default().write_tree(&sample(), &mut stream, format).unwrap();
    }

    #[test]
    fn outline_lists_every_node_in_order() {
        colored::control::set_override(false);
        let text = outline(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "/ Counter @ (T, 1) (3 properties)",
                "  Count u32 = 42",
                "  items list (1 items)",
                "    [0] ref (T, 2)",
                "  peer null",
            ]
        );
    }

    #[test]
    fn values_render_like_text_literals() {
        assert_eq!(render_value(&Value::Text("a\"b".into())), "\"a\\\"b\"");
        assert_eq!(render_value(&Value::Blob(vec![0xde, 0xad])), "x\"dead\"");
        assert_eq!(render_value(&Value::F64(1.0)), "1.0");
    }

    #[test]
    fn load_tree_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let serializer = Serializer::default();
        for format in [Format::Text, Format::Binary] {
            let path = dir.path().join(format!("sample.{format}"));
            write(&path, format);
            let (tree, detected) = load_tree(&serializer, &path, None).unwrap();
            assert_eq!(detected, format);
            assert_eq!(tree, sample());
        }
    }

    #[test]
    fn convert_switches_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.ks");
        let output = dir.path().join("out.ks");
        write(&input, Format::Binary);

        let serializer = Serializer::default();
        cmd_convert(
            &serializer,
            None,
            ConvertArgs {
                input,
                output: output.clone(),
                to: Some(TargetFormat::Text),
            },
        )
        .unwrap();
        let (tree, format) = load_tree(&serializer, &output, None).unwrap();
        assert_eq!(format, Format::Text);
        assert_eq!(tree, sample());
    }

    #[test]
    fn convert_falls_back_to_configured_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.ks");
        let output = dir.path().join("out.ks");
        write(&input, Format::Binary);

        let config = SerializerConfig::from_toml_str("format = \"text\"").unwrap();
        let serializer = Serializer::new(config);
        let args = ConvertArgs {
            input,
            output: output.clone(),
            to: None,
        };
        cmd_convert(&serializer, None, args).unwrap();
        let (tree, format) = load_tree(&serializer, &output, None).unwrap();
        assert_eq!(format, Format::Text);
        assert_eq!(tree, sample());
    }

    #[test]
    fn verify_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ks");
        std::fs::write(&path, b"KSBT\x00\x01\x00\x00\x7f").unwrap();
        let result = cmd_verify(&Serializer::default(), None, VerifyArgs { file: path });
        assert!(result.is_err());
    }
}
