//! Post-delivery move into the backup folder. Never overwrites: a name clash
//! gets a `_YYYYmmdd_HHMMSS` suffix before the extension.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use fs_err as fs;

use crate::error::{MonitorError, Result};

/// Picks a destination inside `backup_dir` that does not exist yet.
pub fn backup_destination(file_name: &str, backup_dir: &Path, now: DateTime<Local>) -> PathBuf {
    let plain = backup_dir.join(file_name);
    if !plain.exists() {
        return plain;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let suffix = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = now.format("%Y%m%d_%H%M%S");

    let stamped = backup_dir.join(format!("{}_{}{}", stem, stamp, suffix));
    if !stamped.exists() {
        return stamped;
    }
    // Same name twice within one second.
    (1u32..)
        .map(|n| backup_dir.join(format!("{}_{}_{}{}", stem, stamp, n, suffix)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(stamped)
}

/// Moves `source` into `backup_dir`, returning where it landed.
///
/// Falls back to copy + delete when a plain rename is not possible (for
/// example across volumes).
pub fn move_to_backup(source: &Path, backup_dir: &Path, now: DateTime<Local>) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            MonitorError::io(
                format!("Cannot move path without a file name: {}", source.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            )
        })?;
    let dest = backup_destination(&file_name, backup_dir, now);

    if fs::rename(source, &dest).is_err() {
        fs::copy(source, &dest).map_err(|e| MonitorError::io("Failed to copy file to backup", e))?;
        if let Err(e) = fs::remove_file(source) {
            let _ = fs::remove_file(&dest);
            return Err(MonitorError::io("Failed to remove source after copy", e));
        }
    }
    Ok(dest)
}
