//! One pass of the folder agent: scan, classify, mail, move, persist.
//!
//! ```text
//! PAUSE marker present  → Paused (no side effects)
//! lock held elsewhere   → Locked (no side effects)
//! no new files          → advance last_run, save, NoNewFiles
//! ledger file reappears → warn, leave it in place
//! send fails            → nothing committed, DeliveryFailed
//! send succeeds         → move each file, record it, advance last_run, save
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, Utc};
use fs_err as fs;
use tracing::{error, info, warn};

use super::archive::{build_archive, StagedArchive};
use super::decide::{bytes_to_mb, choose_packaging, select_new, Packaging};
use super::notice::{digest_body, digest_subject};
use super::relocate::move_to_backup;
use super::scan::{scan_candidates, ExtensionFilter};
use super::state::WatchStateStore;
use crate::config::FolderConfig;
use crate::error::{MonitorError, Result};
use crate::lock::InstanceLock;
use crate::mail::{Mailer, OutgoingMail};

const LOCK_NAME: &str = "folder-monitor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Paused,
    Locked { pid: u32 },
    /// `already_delivered` lists ledger entries still sitting in the watch
    /// folder; they are never offered again.
    NoNewFiles { already_delivered: Vec<PathBuf> },
    DeliveryFailed { error: String },
    Delivered {
        delivered: usize,
        moved: Vec<MovedFile>,
        failed_moves: Vec<PathBuf>,
        already_delivered: Vec<PathBuf>,
    },
}

/// Where archives are staged: `TEMP` if set, else the state directory.
pub fn default_temp_root(config: &FolderConfig) -> PathBuf {
    env::var_os("TEMP")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.state_dir())
}

pub struct FolderRun<'a> {
    config: &'a FolderConfig,
    mailer: &'a dyn Mailer,
    temp_root: PathBuf,
}

impl<'a> FolderRun<'a> {
    pub fn new(config: &'a FolderConfig, mailer: &'a dyn Mailer) -> Self {
        FolderRun {
            config,
            mailer,
            temp_root: default_temp_root(config),
        }
    }

    pub fn with_temp_root(mut self, temp_root: &Path) -> Self {
        self.temp_root = temp_root.to_path_buf();
        self
    }

    pub fn run(&self) -> Result<CycleOutcome> {
        let config = self.config;

        if config.pause_marker().exists() {
            info!("PAUSE file detected; skipping this run.");
            return Ok(CycleOutcome::Paused);
        }

        for dir in [&config.watch_folder, &config.backup_folder, &config.state_dir()] {
            fs::create_dir_all(dir)
                .map_err(|e| MonitorError::io("Failed to create required directory", e))?;
        }

        let _lock = match InstanceLock::acquire(&config.state_dir(), LOCK_NAME) {
            Ok(lock) => lock,
            Err(MonitorError::AlreadyRunning { pid, path }) => {
                warn!(pid, path = %path.display(), "Another run holds the lock; skipping this run.");
                return Ok(CycleOutcome::Locked { pid });
            }
            Err(e) => return Err(e),
        };

        self.run_locked()
    }

    fn run_locked(&self) -> Result<CycleOutcome> {
        let config = self.config;
        let store = WatchStateStore::new(&config.state_file);
        let mut state = store.load();

        let filter = ExtensionFilter::new(
            config.include_extensions.clone(),
            config.exclude_extensions.clone(),
        );
        let candidates = scan_candidates(
            &config.watch_folder,
            &filter,
            config.min_file_age(),
            SystemTime::now(),
        )?;
        let selection = select_new(candidates, &state);

        let already_delivered: Vec<PathBuf> = selection
            .already_delivered
            .iter()
            .map(|f| f.path.clone())
            .collect();
        for path in &already_delivered {
            warn!(
                path = %path.display(),
                "File was already delivered from this path and will not be sent again; move or rename it to resend"
            );
        }

        if selection.new_files.is_empty() {
            info!("No new files found.");
            state.advance_last_run(Utc::now());
            store.save(&state)?;
            return Ok(CycleOutcome::NoNewFiles { already_delivered });
        }

        let new_files = selection.new_files.as_slice();
        let total_bytes = selection.total_bytes();
        info!(
            count = new_files.len(),
            total_mb = bytes_to_mb(total_bytes),
            "Found {} new file(s), total {} MB",
            new_files.len(),
            bytes_to_mb(total_bytes)
        );

        let packaging = choose_packaging(
            total_bytes,
            config.zip_before_email,
            config.max_total_attachment_mb,
        );
        let staged: Option<StagedArchive> = match packaging {
            Packaging::Archive => {
                let archive = build_archive(new_files, &self.temp_root, Local::now())?;
                info!(
                    path = %archive.path().display(),
                    size_mb = bytes_to_mb(archive.size()),
                    "Created ZIP"
                );
                Some(archive)
            }
            Packaging::Individual => None,
        };

        let attachments = match &staged {
            Some(archive) => vec![archive.path().to_path_buf()],
            None => new_files.iter().map(|f| f.path.clone()).collect(),
        };
        let mail = OutgoingMail {
            subject: digest_subject(&config.smtp.subject_prefix, new_files.len()),
            body: digest_body(&config.watch_folder, new_files, total_bytes, packaging),
            attachments,
        };

        let sent = self.mailer.send(&mail);
        drop(staged);
        if let Err(e) = sent {
            error!(error = %e, "Email send failed");
            return Ok(CycleOutcome::DeliveryFailed {
                error: e.to_string(),
            });
        }
        info!("Email sent successfully.");

        let mut moved = Vec::new();
        let mut failed_moves = Vec::new();
        for file in new_files {
            match move_to_backup(&file.path, &config.backup_folder, Local::now()) {
                Ok(dest) => {
                    info!("Moved: {} -> {}", file.path.display(), dest.display());
                    state.record_processed(&file.identifier());
                    moved.push(MovedFile {
                        from: file.path.clone(),
                        to: dest,
                    });
                }
                Err(e) => {
                    error!(path = %file.path.display(), error = %e, "Failed to move delivered file");
                    failed_moves.push(file.path.clone());
                }
            }
        }

        state.advance_last_run(Utc::now());
        store.save(&state)?;
        info!("Done.");

        Ok(CycleOutcome::Delivered {
            delivered: new_files.len(),
            moved,
            failed_moves,
            already_delivered,
        })
    }
}
