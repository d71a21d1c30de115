//! `protodata build-descriptor`: descriptor set JSON via `buf build`.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub(crate) fn cmd_build_descriptor(root: &Path, out: &Path, exclude_source_info: bool) -> Result<()> {
    println!(
        "{} {}",
        "Building descriptor set for".green().bold(),
        root.display()
    );
    build_descriptor_set_json(root, out, exclude_source_info)?;
    println!("  {} {}", "→".cyan(), out.display());
    Ok(())
}

/// `buf build` arguments. Imports are kept: references into them need their
/// packages.
fn buf_args(root: &Path, out: &Path, exclude_source_info: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "build".into(),
        root.into(),
        "--as-file-descriptor-set".into(),
        "-o".into(),
        out.into(),
    ];
    if exclude_source_info {
        args.push("--exclude-source-info".into());
    }
    args
}

pub(crate) fn build_descriptor_set_json(
    root: &Path,
    out: &Path,
    exclude_source_info: bool,
) -> Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut cmd = Command::new("buf");
    cmd.args(buf_args(root, out, exclude_source_info));

    // Buf may not be able to write to `$HOME/.cache` in sandboxes.
    let cache_dir = PathBuf::from("build/buf_cache");
    if let Err(err) = fs::create_dir_all(&cache_dir) {
        tracing::debug!(error = %err, "no workspace-local buf cache");
    } else {
        cmd.env("XDG_CACHE_HOME", cache_dir);
    }

    tracing::debug!(?cmd, "running buf");
    let output = cmd.output().context("failed to run `buf build`")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("buf build failed:\n{stderr}"));
    }
    Ok(())
}
