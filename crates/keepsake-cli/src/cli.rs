use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keepsake_codec::Format;

#[derive(Parser)]
#[command(
    name = "keepsake",
    about = "Inspect, convert and verify Keepsake serialization streams",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Encoding of input files; `auto` sniffs the binary header
    #[arg(long, global = true, default_value = "auto")]
    pub format: InputFormat,

    /// Serializer configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    Auto,
    Text,
    Binary,
}

impl InputFormat {
    /// The fixed encoding, or `None` for `auto`.
    pub fn fixed(self) -> Option<Format> {
        match self {
            Self::Auto => None,
            Self::Text => Some(Format::Text),
            Self::Binary => Some(Format::Binary),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetFormat {
    Text,
    Binary,
}

impl From<TargetFormat> for Format {
    fn from(target: TargetFormat) -> Self {
        match target {
            TargetFormat::Text => Format::Text,
            TargetFormat::Binary => Format::Binary,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the outline of a stored tree
    Inspect(InspectArgs),
    /// Re-encode a stream in another format
    Convert(ConvertArgs),
    /// Print the sub-tree at a node path
    Find(FindArgs),
    /// Check that a stream decodes cleanly
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    pub file: PathBuf,
    /// Print the tree as JSON instead of an outline
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Output encoding; defaults to the configured `format`
    #[arg(long)]
    pub to: Option<TargetFormat>,
}

#[derive(Args)]
pub struct FindArgs {
    pub file: PathBuf,
    /// Node path such as `/items[2]/peer`
    pub path: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub file: PathBuf,
}
