//! Zip packaging for oversized or forced-archive batches.
//!
//! Files are first copied into an isolated staging directory, then compressed.
//! Staging is removed on every exit path. The finished archive lives in its
//! own temp directory owned by [`StagedArchive`]; dropping the value deletes
//! the archive, so a send attempt can never leak it.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use fs_err as fs;
use tempfile::TempDir;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::scan::CandidateFile;
use crate::error::{MonitorError, Result};

#[derive(Debug)]
pub struct StagedArchive {
    _dir: TempDir,
    path: PathBuf,
}

impl StagedArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

fn temp_dir_in(root: &Path, prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(root)
        .map_err(|e| MonitorError::io(format!("Failed to create temp dir in {}", root.display()), e))
}

/// Compresses `files` into `payload_YYYYmmdd_HHMMSS.zip` under `temp_root`.
pub fn build_archive(
    files: &[CandidateFile],
    temp_root: &Path,
    now: DateTime<Local>,
) -> Result<StagedArchive> {
    fs::create_dir_all(temp_root)
        .map_err(|e| MonitorError::io("Failed to create archive temp root", e))?;

    let archive_dir = temp_dir_in(temp_root, "outpost_payload_")?;
    let staging = temp_dir_in(temp_root, "outpost_staging_")?;

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let target = staging.path().join(file.file_name());
        fs::copy(&file.path, &target)
            .map_err(|e| MonitorError::io("Failed to stage file for archive", e))?;
        staged.push((file.file_name(), target));
    }

    let path = archive_dir
        .path()
        .join(format!("payload_{}.zip", now.format("%Y%m%d_%H%M%S")));
    write_zip(&path, &staged)?;
    debug!(path = %path.display(), entries = staged.len(), "Archive written");

    Ok(StagedArchive {
        _dir: archive_dir,
        path,
    })
}

fn write_zip(path: &Path, entries: &[(String, PathBuf)]) -> Result<()> {
    let archive_err = |context: &str| {
        let context = context.to_string();
        move |source: zip::result::ZipError| MonitorError::Archive { context, source }
    };

    let file = fs::File::create(path).map_err(|e| MonitorError::io("Failed to create archive", e))?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, staged_path) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(archive_err("Failed to add file to archive"))?;
        let mut source = fs::File::open(staged_path)
            .map_err(|e| MonitorError::io("Failed to open staged file", e))?;
        io::copy(&mut source, &mut zip)
            .map_err(|e| MonitorError::io("Failed to write archive entry", e))?;
    }

    zip.finish().map_err(archive_err("Failed to finalize archive"))?;
    Ok(())
}
