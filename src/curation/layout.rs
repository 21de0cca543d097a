use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Create the named subfolders under `root`, returning their paths in the
/// same order. Existing folders and their contents are left alone.
pub fn ensure_subfolders(root: &Path, names: &[&str]) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::with_capacity(names.len());
    for name in names {
        let path = root.join(name);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create folder {}", path.display()))?;
        folders.push(path);
    }
    Ok(folders)
}
