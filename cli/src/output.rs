// Writing the finished notes

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

/// File name used in the data directory when the requested output cannot be written
pub const RECOVERED_FILE: &str = "recovered_notes.txt";

/// Check that `path` can plausibly receive the notes before any work is done.
pub fn check_output(path: &Path) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !parent.is_dir() {
        bail!("output directory {} does not exist", parent.display());
    }
    if path.is_dir() {
        bail!("output path {} is a directory", path.display());
    }
    Ok(())
}

/// Write the notes to `output`, falling back to `fallback_dir` if that fails.
///
/// Returns the path the notes ended up in.
pub fn save_notes(output: &Path, document: &str, fallback_dir: &Path) -> anyhow::Result<PathBuf> {
    let err = match std::fs::write(output, document) {
        Ok(()) => return Ok(output.to_path_buf()),
        Err(e) => e,
    };
    tracing::warn!("Failed to write notes to {}: {}", output.display(), err);

    let fallback = fallback_dir.join(RECOVERED_FILE);
    std::fs::create_dir_all(fallback_dir)
        .and_then(|_| std::fs::write(&fallback, document))
        .with_context(|| {
            format!(
                "Failed to write notes to {} ({}) or {}",
                output.display(),
                err,
                fallback.display()
            )
        })?;

    Ok(fallback)
}
