//! Writing artifacts to disk.

use anyhow::{Context, Result};
use protodata_gen::Artifact;
use std::fs;
use std::path::{Path, PathBuf};

/// Write every artifact under `out_dir`, replacing existing files.
///
/// Files are created with mode `0644` on Unix. Returns the written paths.
pub(crate) fn write_artifacts(out_dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = out_dir.join(&artifact.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, &artifact.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        set_file_mode(&path)?;
        tracing::debug!(path = %path.display(), bytes = artifact.content.len(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> Result<()> {
    Ok(())
}
