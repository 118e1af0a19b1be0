use crate::shared::error::AuditError;
use crate::shared::Result;
use std::fs;
use std::path::Path;

/// Upper bound for any control, snapshot or configuration file (10 MB).
/// Control catalogs are prose-heavy but never approach this.
pub const MAX_INPUT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Reads a UTF-8 input file after refusing symlinks, non-regular files and
/// oversized files.
///
/// # Arguments
/// * `path` - File to read
/// * `description` - What the file is (e.g. "control file"), used in messages
///
/// # Errors
/// Returns `AuditError::SecurityError` for symlinks and oversized files, and a
/// plain error when metadata or contents cannot be read.
pub fn read_input_file(path: &Path, description: &str) -> Result<String> {
    let metadata = fs::symlink_metadata(path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read {} metadata for {}: {}",
            description,
            path.display(),
            e
        )
    })?;

    if metadata.is_symlink() {
        return Err(AuditError::SecurityError {
            path: path.to_path_buf(),
            reason: format!("{} is a symbolic link", description),
            hint: "Point at the real file instead of a link".to_string(),
        }
        .into());
    }

    if !metadata.is_file() {
        anyhow::bail!("{} is not a regular file: {}", description, path.display());
    }

    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(AuditError::SecurityError {
            path: path.to_path_buf(),
            reason: format!(
                "{} is too large ({} bytes, maximum {} bytes)",
                description,
                metadata.len(),
                MAX_INPUT_FILE_SIZE
            ),
            hint: "Split the file or remove unrelated content".to_string(),
        }
        .into());
    }

    fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read {} {}: {}", description, path.display(), e)
    })
}

/// Rejects a directory path that is a symlink or not a directory.
pub fn validate_directory(path: &Path, description: &str) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| {
        anyhow::anyhow!("Failed to read {} {}: {}", description, path.display(), e)
    })?;

    if metadata.is_symlink() {
        return Err(AuditError::SecurityError {
            path: path.to_path_buf(),
            reason: format!("{} is a symbolic link", description),
            hint: "Point at the real directory instead of a link".to_string(),
        }
        .into());
    }

    if !metadata.is_dir() {
        anyhow::bail!("{} is not a directory: {}", description, path.display());
    }

    Ok(())
}
