//! Directory sampler: lists top-level regular files that pass the extension
//! filter and have been quiet for the minimum age. Read-only.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{MonitorError, Result};

/// A directory entry eligible for "new" classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl CandidateFile {
    /// The ledger key for this file.
    pub fn identifier(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Include/exclude extension lists, already normalized to `.ext` lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ExtensionFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        ExtensionFilter { include, exclude }
    }

    /// Include is a strict allow-list when non-empty; exclude always wins.
    pub fn allows(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        if !self.include.is_empty() && !self.include.contains(&ext) {
            return false;
        }
        !self.exclude.contains(&ext)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Lists candidate files directly inside `watch_dir`.
///
/// Files modified less than `min_age` before `now` may still be being written
/// and are skipped. Entries that vanish or cannot be stat'ed mid-scan are
/// skipped with a warning.
pub fn scan_candidates(
    watch_dir: &Path,
    filter: &ExtensionFilter,
    min_age: Duration,
    now: SystemTime,
) -> Result<Vec<CandidateFile>> {
    if !watch_dir.is_dir() {
        return Err(MonitorError::io(
            format!("Watch folder is not a directory: {}", watch_dir.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(watch_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !filter.allows(path) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file without metadata");
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file without mtime");
                continue;
            }
        };

        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < min_age {
            debug!(path = %path.display(), age_secs = age.as_secs(), "File too fresh, may still be writing");
            continue;
        }

        let created = metadata.created().unwrap_or(modified);
        candidates.push(CandidateFile {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: to_utc(modified),
            created: to_utc(created),
        });
    }

    candidates.sort_by(|left, right| left.path.cmp(&right.path));
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;

    fn filter(include: &[&str], exclude: &[&str]) -> ExtensionFilter {
        ExtensionFilter::new(
            include.iter().map(|s| s.to_string()).collect(),
            exclude.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn include_list_is_strict_and_exclude_wins() {
        let f = filter(&[".pdf", ".csv"], &[".csv"]);
        assert!(f.allows(Path::new("/in/report.PDF")));
        assert!(!f.allows(Path::new("/in/data.csv")));
        assert!(!f.allows(Path::new("/in/notes.txt")));
        assert!(!f.allows(Path::new("/in/README")));
    }

    #[test]
    fn empty_filter_allows_everything_but_excludes() {
        let f = filter(&[], &[".tmp"]);
        assert!(f.allows(Path::new("/in/README")));
        assert!(f.allows(Path::new("/in/a.txt")));
        assert!(!f.allows(Path::new("/in/upload.TMP")));
    }

    #[test]
    fn scan_skips_directories_nested_files_and_filtered_extensions() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = temp.path();
        fs::write(root.join("a.txt"), b"hello").expect("write a");
        fs::write(root.join("b.tmp"), b"partial").expect("write b");
        fs::create_dir(root.join("sub")).expect("mkdir");
        fs::write(root.join("sub").join("c.txt"), b"nested").expect("write c");

        let found = scan_candidates(root, &filter(&[], &[".tmp"]), Duration::ZERO, SystemTime::now())
            .expect("scan");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name(), "a.txt");
        assert_eq!(found[0].size, 5);
        assert_eq!(found[0].identifier(), root.join("a.txt").to_string_lossy());
    }

    #[test]
    fn scan_skips_files_younger_than_min_age() {
        let temp = tempfile::tempdir().expect("temp dir");
        fs::write(temp.path().join("fresh.txt"), b"x").expect("write");

        let now = SystemTime::now();
        let too_fresh = scan_candidates(temp.path(), &ExtensionFilter::default(), Duration::from_secs(3600), now)
            .expect("scan");
        assert!(too_fresh.is_empty());

        let later = now + Duration::from_secs(7200);
        let settled = scan_candidates(temp.path(), &ExtensionFilter::default(), Duration::from_secs(3600), later)
            .expect("scan");
        assert_eq!(settled.len(), 1);
    }

    #[test]
    fn scan_of_missing_directory_is_an_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let missing = temp.path().join("nope");
        assert!(scan_candidates(&missing, &ExtensionFilter::default(), Duration::ZERO, SystemTime::now()).is_err());
    }
}
