//! Subject and body for the folder digest mail.

use std::path::Path;

use super::decide::{bytes_to_mb, Packaging};
use super::scan::CandidateFile;

pub fn digest_subject(prefix: &str, count: usize) -> String {
    format!("{} {} new file(s)", prefix, count)
}

/// Lists every new file. Sizes are omitted when archived since the
/// attachment is the zip, not the files.
pub fn digest_body(
    watch_dir: &Path,
    files: &[CandidateFile],
    total_bytes: u64,
    packaging: Packaging,
) -> String {
    let listing = files
        .iter()
        .map(|f| match packaging {
            Packaging::Archive => format!(" - {}", f.file_name()),
            Packaging::Individual => format!(" - {} ({:.2} MB)", f.file_name(), bytes_to_mb(f.size)),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The following files were detected in '{}':\n\n{}\n\nTotal size: {:.2} MB\nThis email was generated automatically.",
        watch_dir.display(),
        listing,
        bytes_to_mb(total_bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    const MB: u64 = 1024 * 1024;

    fn file(name: &str, size: u64) -> CandidateFile {
        CandidateFile {
            path: PathBuf::from("/in").join(name),
            size,
            modified: Utc::now(),
            created: Utc::now(),
        }
    }

    #[test]
    fn subject_counts_files() {
        assert_eq!(
            digest_subject("[Folder Monitor]", 2),
            "[Folder Monitor] 2 new file(s)"
        );
    }

    #[test]
    fn individual_body_lists_sizes() {
        let files = vec![file("a.txt", 5 * MB)];
        let body = digest_body(Path::new("/in"), &files, 5 * MB, Packaging::Individual);
        assert!(body.starts_with("The following files were detected in '/in':"));
        assert!(body.contains(" - a.txt (5.00 MB)"));
        assert!(body.contains("Total size: 5.00 MB"));
    }

    #[test]
    fn archive_body_lists_names_only() {
        let files = vec![file("a.txt", 5 * MB), file("b.txt", 20 * MB)];
        let body = digest_body(Path::new("/in"), &files, 25 * MB, Packaging::Archive);
        assert!(body.contains(" - a.txt\n - b.txt"));
        assert!(!body.contains("(5.00 MB)"));
        assert!(!body.contains("(20.00 MB)"));
        assert!(body.contains("Total size: 25.00 MB"));
    }
}
