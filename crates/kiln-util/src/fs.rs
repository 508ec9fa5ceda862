use std::path::{Path, PathBuf};

use crate::errors::KilnError;

/// Walk up from `start` looking for a file named `filename`.
/// Returns the path to the directory containing the file, or `None`.
pub fn find_ancestor_with(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

/// Ensure a directory exists, creating it and any parents if needed.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Read a UTF-8 file, labelling failures with `what` (e.g. "lockfile").
pub fn read_text(path: &Path, what: &str) -> Result<String, KilnError> {
    std::fs::read_to_string(path).map_err(|e| KilnError::Generic {
        message: format!("Failed to read {what} {}: {e}", path.display()),
    })
}

/// Write `contents` to `path`, creating parent directories first.
pub fn write_text(path: &Path, contents: &str) -> Result<(), KilnError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
