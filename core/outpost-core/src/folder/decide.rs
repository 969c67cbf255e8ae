//! Classifies candidates against the ledger and picks a packaging strategy.
//!
//! The ledger wins: an identifier already in `processed_files` is never
//! offered again, whatever its creation time says. Anything else is new,
//! either because it appeared after the last run or because the ledger has
//! never seen it (clock skew, manual state reset).

use tracing::debug;

use super::scan::CandidateFile;
use super::state::WatchState;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    NewByTimestamp,
    NewByLedger,
    AlreadyDelivered,
}

impl Novelty {
    pub fn is_new(self) -> bool {
        !matches!(self, Novelty::AlreadyDelivered)
    }
}

pub fn classify(candidate: &CandidateFile, state: &WatchState) -> Novelty {
    if state.is_processed(&candidate.identifier()) {
        return Novelty::AlreadyDelivered;
    }
    if candidate.created > state.last_run_utc() {
        Novelty::NewByTimestamp
    } else {
        Novelty::NewByLedger
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub new_files: Vec<CandidateFile>,
    pub already_delivered: Vec<CandidateFile>,
}

impl Selection {
    pub fn total_bytes(&self) -> u64 {
        self.new_files.iter().map(|f| f.size).sum()
    }
}

pub fn select_new(candidates: Vec<CandidateFile>, state: &WatchState) -> Selection {
    let mut selection = Selection::default();
    for candidate in candidates {
        let novelty = classify(&candidate, state);
        debug!(path = %candidate.path.display(), ?novelty, "Classified candidate");
        if novelty.is_new() {
            selection.new_files.push(candidate);
        } else {
            selection.already_delivered.push(candidate);
        }
    }
    selection
}

/// Megabytes rounded to two decimals, as shown in mail bodies.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    ((bytes as f64 / BYTES_PER_MB) * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    /// Every new file is its own attachment.
    Individual,
    /// All new files go into one zip.
    Archive,
}

/// Archive when forced, or when the total exceeds a positive size cap.
pub fn choose_packaging(total_bytes: u64, zip_before_send: bool, max_total_mb: f64) -> Packaging {
    if zip_before_send || (max_total_mb > 0.0 && bytes_to_mb(total_bytes) > max_total_mb) {
        Packaging::Archive
    } else {
        Packaging::Individual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use std::path::PathBuf;

    const MB: u64 = 1024 * 1024;

    fn candidate(path: &str, size: u64, created: DateTime<Utc>) -> CandidateFile {
        CandidateFile {
            path: PathBuf::from(path),
            size,
            modified: created,
            created,
        }
    }

    #[test]
    fn unseen_file_created_after_last_run_is_new_by_timestamp() {
        let mut state = WatchState::default();
        let now = Utc::now();
        state.advance_last_run(now - Duration::hours(1));
        assert_eq!(
            classify(&candidate("/in/a.txt", 1, now), &state),
            Novelty::NewByTimestamp
        );
    }

    #[test]
    fn unseen_old_file_is_new_by_ledger() {
        let mut state = WatchState::default();
        let now = Utc::now();
        state.advance_last_run(now);
        assert_eq!(
            classify(&candidate("/in/a.txt", 1, now - Duration::days(3)), &state),
            Novelty::NewByLedger
        );
    }

    #[test]
    fn processed_file_is_never_new_even_with_future_creation_time() {
        let mut state = WatchState::default();
        state.record_processed("/in/a.txt");
        let future = Utc::now() + Duration::days(365);
        assert_eq!(
            classify(&candidate("/in/a.txt", 1, future), &state),
            Novelty::AlreadyDelivered
        );
    }

    #[test]
    fn select_new_partitions_and_sums() {
        let mut state = WatchState::default();
        state.record_processed("/in/old.txt");
        let now = Utc::now();
        let selection = select_new(
            vec![
                candidate("/in/old.txt", 10 * MB, now),
                candidate("/in/a.txt", 5 * MB, now),
                candidate("/in/b.txt", 20 * MB, now),
            ],
            &state,
        );
        assert_eq!(selection.new_files.len(), 2);
        assert_eq!(selection.already_delivered.len(), 1);
        assert_eq!(selection.total_bytes(), 25 * MB);
    }

    #[test]
    fn packaging_follows_flag_and_size_cap() {
        assert_eq!(choose_packaging(25 * MB, false, 18.0), Packaging::Archive);
        assert_eq!(choose_packaging(10 * MB, false, 18.0), Packaging::Individual);
        assert_eq!(choose_packaging(1, true, 18.0), Packaging::Archive);
        assert_eq!(choose_packaging(500 * MB, false, 0.0), Packaging::Individual);
        assert_eq!(choose_packaging(18 * MB, false, 18.0), Packaging::Individual);
    }

    #[test]
    fn bytes_to_mb_rounds_to_two_decimals() {
        assert!((bytes_to_mb(5 * MB) - 5.0).abs() < f64::EPSILON);
        assert!((bytes_to_mb(1_500_000) - 1.43).abs() < f64::EPSILON);
        assert_eq!(bytes_to_mb(0), 0.0);
    }
}
