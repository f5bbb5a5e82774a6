//! Local persistence for in-progress sessions.
//!
//! Snapshots let an unintended page reload restore the current question
//! index, answers, and review marks — pre-submission only. Correct-answer
//! sets are never written to disk; on restore they are re-derived by value
//! lookup against the freshly fetched contest.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AnswerRecord, ContestId, ParticipationId, QuestionId, ShuffledQuestion};

/// Schema version for snapshot format compatibility
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Per-question presentation order as shown to this participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotQuestion {
    pub id: QuestionId,
    pub options: Vec<String>,
}

impl From<&ShuffledQuestion> for SnapshotQuestion {
    fn from(q: &ShuffledQuestion) -> Self {
        Self {
            id: q.id.clone(),
            options: q.options.clone(),
        }
    }
}

/// A serializable copy of one in-progress session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub contest_id: ContestId,
    pub participation_id: ParticipationId,
    pub current_index: usize,
    /// Shuffled question order with per-question option order, so a resumed
    /// session reproduces the exact presentation it started with.
    pub order: Vec<SnapshotQuestion>,
    /// Aligned with `order`.
    pub records: Vec<AnswerRecord>,
}

/// File-backed store for snapshots and the "already submitted" marker,
/// keyed by participation id.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn snapshot_path(&self, participation_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", participation_id))
    }

    fn marker_path(&self, participation_id: &str) -> PathBuf {
        self.dir.join(format!("{}.submitted", participation_id))
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), String> {
        fs::create_dir_all(&self.dir).map_err(|e| e.to_string())?;
        let json = serde_json::to_string(snapshot).map_err(|e| e.to_string())?;
        fs::write(self.snapshot_path(&snapshot.participation_id), json).map_err(|e| e.to_string())
    }

    /// Load a snapshot, tolerating absence, corruption, and schema drift —
    /// a snapshot that cannot be trusted is treated as not existing.
    pub fn load(&self, participation_id: &str) -> Option<SessionSnapshot> {
        let path = self.snapshot_path(participation_id);
        let json = read_if_present(&path)?;
        match serde_json::from_str::<SessionSnapshot>(&json) {
            Ok(snapshot) if snapshot.schema_version == SNAPSHOT_SCHEMA_VERSION => Some(snapshot),
            Ok(snapshot) => {
                tracing::debug!(
                    participation_id,
                    found = snapshot.schema_version,
                    expected = SNAPSHOT_SCHEMA_VERSION,
                    "Discarding snapshot with mismatched schema version"
                );
                None
            }
            Err(e) => {
                tracing::warn!(participation_id, error = %e, "Discarding unreadable snapshot");
                None
            }
        }
    }

    /// Erase the pre-submission copy. Called after a confirmed commit so a
    /// stale session cannot be replayed.
    pub fn clear(&self, participation_id: &str) {
        let _ = fs::remove_file(self.snapshot_path(participation_id));
    }

    pub fn mark_submitted(&self, participation_id: &str) -> Result<(), String> {
        fs::create_dir_all(&self.dir).map_err(|e| e.to_string())?;
        fs::write(self.marker_path(participation_id), b"1").map_err(|e| e.to_string())
    }

    pub fn is_submitted(&self, participation_id: &str) -> bool {
        self.marker_path(participation_id).exists()
    }

    pub fn clear_marker(&self, participation_id: &str) {
        let _ = fs::remove_file(self.marker_path(participation_id));
    }
}

fn read_if_present(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(json) => Some(json),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read snapshot");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> SessionSnapshot {
        SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            contest_id: "c1".to_string(),
            participation_id: "p1".to_string(),
            current_index: 2,
            order: vec![
                SnapshotQuestion {
                    id: "q2".to_string(),
                    options: vec!["B".to_string(), "A".to_string()],
                },
                SnapshotQuestion {
                    id: "q1".to_string(),
                    options: vec!["D".to_string(), "C".to_string()],
                },
            ],
            records: vec![
                AnswerRecord {
                    selected: "B".to_string(),
                    visited: true,
                    marked_for_review: false,
                },
                AnswerRecord {
                    selected: String::new(),
                    visited: true,
                    marked_for_review: true,
                },
            ],
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let snapshot = sample_snapshot();
        store.save(&snapshot).unwrap();

        let loaded = store.load("p1").expect("snapshot should load");
        assert_eq!(loaded.contest_id, "c1");
        assert_eq!(loaded.current_index, 2);
        assert_eq!(loaded.order.len(), 2);
        assert_eq!(loaded.records[0].selected, "B");
        assert!(loaded.records[1].marked_for_review);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load("nope").is_none());
    }

    #[test]
    fn test_schema_version_mismatch_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let mut snapshot = sample_snapshot();
        snapshot.schema_version = SNAPSHOT_SCHEMA_VERSION + 1;
        store.save(&snapshot).unwrap();

        assert!(store.load("p1").is_none());
    }

    #[test]
    fn test_corrupt_snapshot_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path().join("p1.json"), "{not json").unwrap();

        assert!(store.load("p1").is_none());
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        store.save(&sample_snapshot()).unwrap();
        assert!(store.load("p1").is_some());

        store.clear("p1");
        assert!(store.load("p1").is_none());
    }

    #[test]
    fn test_submitted_marker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        assert!(!store.is_submitted("p1"));
        store.mark_submitted("p1").unwrap();
        assert!(store.is_submitted("p1"));

        // Marker is per participation.
        assert!(!store.is_submitted("p2"));

        store.clear_marker("p1");
        assert!(!store.is_submitted("p1"));
    }
}
