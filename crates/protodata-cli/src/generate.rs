//! `protodata json` / `protodata yaml`.

use crate::persist::write_artifacts;
use crate::GenerateArgs;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use protodata_gen::{generate, GenerateOptions, GenerationOutput, OutputFormat};
use protodata_schema::SchemaGraph;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

pub(crate) fn cmd_generate(args: &GenerateArgs, format: OutputFormat) -> Result<()> {
    println!(
        "{} {}",
        "Generating data files from".green().bold(),
        args.descriptor.display()
    );

    let text = read_descriptor(&args.descriptor)?;
    let output = run(&text, args, format)?;

    let written = write_artifacts(&args.out, &output.artifacts)?;
    for path in &written {
        println!("  {} {}", "→".cyan(), path.display());
    }
    report(&output)
}

/// Load + generate, no I/O.
pub(crate) fn run(
    text: &str,
    args: &GenerateArgs,
    format: OutputFormat,
) -> Result<GenerationOutput> {
    let graph = SchemaGraph::from_descriptor_json(text, &args.targets)
        .with_context(|| format!("failed to load {}", args.descriptor.display()))?;
    let encoder = format.encoder();
    let options = GenerateOptions {
        root: args.root.clone(),
    };
    let output = generate(&graph, encoder.as_ref(), &options)
        .context("schema cannot be represented as data files")?;
    Ok(output)
}

fn report(output: &GenerationOutput) -> Result<()> {
    if output.diagnostics.is_empty() {
        println!(
            "{} {} file(s)",
            "✓".green(),
            output.artifacts.len()
        );
        return Ok(());
    }

    for diagnostic in &output.diagnostics {
        eprintln!("  {} {}", "✗".red(), diagnostic);
    }
    Err(anyhow!(
        "{} entit{} could not be encoded ({} file(s) written)",
        output.diagnostics.len(),
        if output.diagnostics.len() == 1 { "y" } else { "ies" },
        output.artifacts.len()
    ))
}

fn read_descriptor(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read descriptor JSON from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
