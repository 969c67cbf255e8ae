//! File-backed ledger for the folder agent.
//!
//! # File Format
//!
//! ```json
//! {
//!   "last_run_utc": "2024-01-15T10:30:00+00:00",
//!   "processed_files": ["/data/inbox/a.txt", "/data/inbox/b.txt"]
//! }
//! ```
//!
//! `processed_files` is the durable source of truth for "already delivered";
//! `last_run_utc` is only a fast-path hint.
//!
//! # Defensive Design
//!
//! A missing, empty or corrupt file loads as the default state (epoch, empty
//! ledger) with a warning. A bad state file never stops a run.
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write leaves the previous state.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{MonitorError, Result};

/// On-disk shape. Kept separate so unknown or partial files still load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    last_run_utc: Option<String>,
    #[serde(default)]
    processed_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchState {
    last_run_utc: DateTime<Utc>,
    processed_files: Vec<String>,
    index: HashSet<String>,
}

impl Default for WatchState {
    fn default() -> Self {
        WatchState {
            last_run_utc: DateTime::<Utc>::UNIX_EPOCH,
            processed_files: Vec::new(),
            index: HashSet::new(),
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl WatchState {
    pub fn last_run_utc(&self) -> DateTime<Utc> {
        self.last_run_utc
    }

    pub fn processed_files(&self) -> &[String] {
        &self.processed_files
    }

    pub fn is_processed(&self, identifier: &str) -> bool {
        self.index.contains(identifier)
    }

    /// Idempotent append. Returns true if the identifier was new.
    pub fn record_processed(&mut self, identifier: &str) -> bool {
        if !self.index.insert(identifier.to_string()) {
            return false;
        }
        self.processed_files.push(identifier.to_string());
        true
    }

    /// Moves `last_run_utc` forward to `now`. Never moves it backwards.
    pub fn advance_last_run(&mut self, now: DateTime<Utc>) {
        if now > self.last_run_utc {
            self.last_run_utc = now;
        }
    }

    fn from_file(file: StateFile, path: &Path) -> Self {
        let last_run_utc = match file.last_run_utc.as_deref() {
            None => DateTime::<Utc>::UNIX_EPOCH,
            Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
                warn!(path = %path.display(), value = raw, "Unparseable last_run_utc, using epoch");
                DateTime::<Utc>::UNIX_EPOCH
            }),
        };
        let mut state = WatchState {
            last_run_utc,
            ..WatchState::default()
        };
        for identifier in &file.processed_files {
            state.record_processed(identifier);
        }
        state
    }
}

/// Loads and saves [`WatchState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct WatchStateStore {
    file_path: PathBuf,
}

impl WatchStateStore {
    pub fn new(file_path: &Path) -> Self {
        WatchStateStore {
            file_path: file_path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Never fails: unreadable state is treated as empty.
    pub fn load(&self) -> WatchState {
        let path = self.file_path.as_path();
        if !path.exists() {
            return WatchState::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "Failed to read state file, starting from empty state");
                return WatchState::default();
            }
        };

        if content.trim().is_empty() {
            warn!(path = %path.display(), "Empty state file, starting from empty state");
            return WatchState::default();
        }

        match serde_json::from_str::<StateFile>(&content) {
            Ok(file) => WatchState::from_file(file, path),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse state file, starting from empty state"
                );
                WatchState::default()
            }
        }
    }

    pub fn save(&self, state: &WatchState) -> Result<()> {
        let file = StateFile {
            last_run_utc: Some(state.last_run_utc.to_rfc3339()),
            processed_files: state.processed_files.clone(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|e| MonitorError::Json {
            context: "Failed to serialize state".to_string(),
            source: e,
        })?;

        let parent_dir = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent_dir)
            .map_err(|e| MonitorError::io("Failed to create state directory", e))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| MonitorError::io("Failed to create temp state file", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| MonitorError::io("Failed to write temp state file", e))?;
        temp_file
            .flush()
            .map_err(|e| MonitorError::io("Failed to flush temp state file", e))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|e| MonitorError::io("Failed to write state file", e.error))?;
        Ok(())
    }
}
