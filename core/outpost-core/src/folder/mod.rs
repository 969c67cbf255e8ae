//! Directory agent: relays new files from a watched folder by email.
//!
//! ## Module Structure
//!
//! - `state`: durable ledger (`last_run_utc`, `processed_files`)
//! - `scan`: directory sampler with extension and quiescence filters
//! - `decide`: new-vs-delivered classification and packaging choice
//! - `archive`: zip staging with guaranteed cleanup
//! - `notice`: digest subject/body
//! - `relocate`: collision-safe move into the backup folder
//! - `cycle`: the single-pass driver

mod archive;
mod cycle;
mod decide;
mod notice;
mod relocate;
mod scan;
mod state;

pub use archive::{build_archive, StagedArchive};
pub use cycle::{default_temp_root, CycleOutcome, FolderRun, MovedFile};
pub use decide::{bytes_to_mb, choose_packaging, classify, select_new, Novelty, Packaging, Selection};
pub use notice::{digest_body, digest_subject};
pub use relocate::{backup_destination, move_to_backup};
pub use scan::{scan_candidates, CandidateFile, ExtensionFilter};
pub use state::{WatchState, WatchStateStore};
