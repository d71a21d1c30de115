//! Protodata CLI
//!
//! Turns a compiled protobuf schema into plain data files:
//! - `json` / `yaml`: descriptor set (or plugin request) JSON → one document
//!   per enum, message and service
//! - `build-descriptor`: run `buf build` to produce that JSON in the first place

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use protodata_gen::OutputFormat;
use std::path::PathBuf;

mod descriptor;
mod generate;
mod persist;

#[derive(Parser)]
#[command(name = "protodata")]
#[command(
    author,
    version,
    about = "Protodata: protobuf schemas as JSON/YAML data files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate JSON data files (`.json`, two-space indented).
    Json(GenerateArgs),

    /// Generate YAML data files (`.yml`, block style).
    Yaml(GenerateArgs),

    /// Build a Buf descriptor set (`google.protobuf.FileDescriptorSet`) as JSON.
    BuildDescriptor {
        /// Buf module root (directory containing `buf.yaml`).
        root: PathBuf,
        /// Output JSON file (descriptor set).
        #[arg(short, long)]
        out: PathBuf,
        /// Exclude source info (comments + spans) from the descriptor set.
        ///
        /// Generated documents lose their `comment` entries.
        #[arg(long)]
        exclude_source_info: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub(crate) struct GenerateArgs {
    /// Descriptor set JSON, or a `CodeGeneratorRequest` rendered as JSON.
    /// Use `-` to read from stdin.
    pub(crate) descriptor: PathBuf,
    /// Output directory; documents land under `<out>/<root>/<package>/...`.
    #[arg(short, long)]
    pub(crate) out: PathBuf,
    /// Files to generate (proto paths as recorded in the descriptor set).
    ///
    /// Ignored when the input already lists `fileToGenerate`. Defaults to
    /// every file in the set.
    #[arg(short, long = "target")]
    pub(crate) targets: Vec<String>,
    /// First path segment of every generated document.
    #[arg(long, default_value = "api")]
    pub(crate) root: String,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second init (e.g. under a test harness) is harmless.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Json(args) => generate::cmd_generate(&args, OutputFormat::Json),
        Commands::Yaml(args) => generate::cmd_generate(&args, OutputFormat::Yaml),
        Commands::BuildDescriptor {
            root,
            out,
            exclude_source_info,
        } => descriptor::cmd_build_descriptor(&root, &out, exclude_source_info),
    }
}
