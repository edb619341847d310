//! Atomic file writes (write to a temp sibling, fsync, rename).

use crate::utils::fs::dirs::ensure_parent_dir;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Atomically replace `path` with `content`.
///
/// Readers see either the old file or the complete new one, never a partial
/// write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}
