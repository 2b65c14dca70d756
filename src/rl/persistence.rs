//! Durable snapshots of the agent's learned state
//!
//! A snapshot bundles the Q-table, hyperparameters and training statistics
//! into one JSON file. Writes go to a temporary file first and are renamed
//! into place, a `latest.json` pointer tracks the current snapshot, and old
//! snapshots are pruned down to a fixed retention count.
//!
//! The store is a port: the file-backed implementation is what production
//! uses, and tests can substitute the in-memory one.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::metrics::ConvergenceStatus;

use super::state::StateKey;

/// Serialized learned state. `q_table` holds, per state key, the list of
/// `(action index, value)` pairs that have been visited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub q_table: Vec<(StateKey, Vec<(u8, f64)>)>,
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub timestamp: String,
    pub stats: SnapshotStats,
}

/// Training statistics persisted with a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub episode_count: u64,
    pub reward_history: Vec<f64>,
    pub state_count: usize,
    pub total_actions: usize,
    pub convergence_status: ConvergenceStatus,
}

/// Pointer record referencing the most recent snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPointer {
    pub latest_file: PathBuf,
    pub timestamp: String,
    pub convergence_status: ConvergenceStatus,
}

/// Filesystem-safe timestamp for snapshot naming: RFC 3339 with the
/// characters Windows and URLs dislike swapped out. Nanosecond precision
/// keeps rapid successive snapshots distinct.
pub fn snapshot_timestamp() -> String {
    Utc::now()
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
        .replace([':', '.'], "-")
}

/// Durable storage port for agent snapshots.
///
/// Load failures are not errors: a missing or unreadable snapshot means the
/// caller starts from defaults.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, data: &SnapshotData) -> Result<()>;
    fn load(&self) -> Option<SnapshotData>;
}

const SNAPSHOT_PREFIX: &str = "training-data-";
const SNAPSHOT_SUFFIX: &str = ".json";
const LATEST_FILE: &str = "latest.json";
const DEFAULT_RETENTION: usize = 10;

/// Snapshot store rooted in a directory.
pub struct FileSnapshotStore {
    dir: PathBuf,
    retention: usize,
}

impl FileSnapshotStore {
    /// Open (creating if needed) a store in `dir` with the default
    /// retention of 10 snapshots.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_retention(dir, DEFAULT_RETENTION)
    }

    pub fn with_retention(dir: impl Into<PathBuf>, retention: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot directory {:?}", dir))?;
        Ok(Self { dir, retention })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_snapshot(&self, data: &SnapshotData) -> Result<PathBuf> {
        let file_name = format!("{}{}{}", SNAPSHOT_PREFIX, data.timestamp, SNAPSHOT_SUFFIX);
        let path = self.dir.join(file_name);
        let temp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(data).context("failed to serialize snapshot")?;
        std::fs::write(&temp_path, json)
            .with_context(|| format!("failed to write {:?}", temp_path))?;
        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("failed to move snapshot into place at {:?}", path))?;

        Ok(path)
    }

    fn write_pointer(&self, snapshot_path: &Path, data: &SnapshotData) -> Result<()> {
        let pointer = LatestPointer {
            latest_file: snapshot_path.to_path_buf(),
            timestamp: data.timestamp.clone(),
            convergence_status: data.stats.convergence_status.clone(),
        };
        let json =
            serde_json::to_string_pretty(&pointer).context("failed to serialize latest pointer")?;
        let path = self.dir.join(LATEST_FILE);
        std::fs::write(&path, json).with_context(|| format!("failed to write {:?}", path))
    }

    /// Delete everything but the most recent `retention` snapshots.
    /// Individual delete failures are logged and skipped.
    fn prune(&self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                eprintln!("failed to list snapshot directory {:?}: {}", self.dir, err);
                return;
            }
        };

        let mut snapshots: Vec<(SystemTime, String, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with(SNAPSHOT_PREFIX) || !name.ends_with(SNAPSHOT_SUFFIX) {
                    return None;
                }
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((modified, name, entry.path()))
            })
            .collect();

        snapshots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        for (_, name, path) in snapshots.into_iter().skip(self.retention) {
            if let Err(err) = std::fs::remove_file(&path) {
                eprintln!("failed to delete old snapshot {}: {}", name, err);
            }
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, data: &SnapshotData) -> Result<()> {
        let snapshot_path = self.write_snapshot(data)?;
        self.write_pointer(&snapshot_path, data)?;
        self.prune();
        Ok(())
    }

    fn load(&self) -> Option<SnapshotData> {
        let pointer_path = self.dir.join(LATEST_FILE);
        let pointer_json = match std::fs::read_to_string(&pointer_path) {
            Ok(json) => json,
            Err(_) => return None,
        };

        let pointer: LatestPointer = match serde_json::from_str(&pointer_json) {
            Ok(pointer) => pointer,
            Err(err) => {
                eprintln!("discarding unreadable latest pointer: {}", err);
                return None;
            }
        };

        let snapshot_json = match std::fs::read_to_string(&pointer.latest_file) {
            Ok(json) => json,
            Err(err) => {
                eprintln!(
                    "snapshot {:?} referenced by latest pointer is unreadable: {}",
                    pointer.latest_file, err
                );
                return None;
            }
        };

        match serde_json::from_str(&snapshot_json) {
            Ok(data) => Some(data),
            Err(err) => {
                eprintln!("discarding corrupt snapshot {:?}: {}", pointer.latest_file, err);
                None
            }
        }
    }
}

/// In-memory store holding the most recent snapshot; for tests.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<SnapshotData>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, data: &SnapshotData) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.clone());
        Ok(())
    }

    fn load(&self) -> Option<SnapshotData> {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_snapshot(timestamp: String) -> SnapshotData {
        SnapshotData {
            q_table: vec![(StateKey(17), vec![(0, 1.5), (2, -0.25)])],
            learning_rate: 0.2,
            discount_factor: 0.9,
            exploration_rate: 0.3,
            timestamp,
            stats: SnapshotStats {
                episode_count: 120,
                reward_history: vec![1.0, 2.0],
                state_count: 1,
                total_actions: 2,
                convergence_status: ConvergenceStatus {
                    stable_episodes: 3,
                    last_average_reward: Some(2.0),
                    has_converged: false,
                },
            },
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();

        let data = sample_snapshot(snapshot_timestamp());
        store.save(&data).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.q_table, data.q_table);
        assert_eq!(loaded.learning_rate, data.learning_rate);
        assert_eq!(loaded.stats.episode_count, 120);
        assert_eq!(loaded.stats.convergence_status.stable_episodes, 3);
    }

    #[test]
    fn test_load_without_data_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_discarded_wholesale() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();

        let data = sample_snapshot(snapshot_timestamp());
        store.save(&data).unwrap();

        // Truncate the snapshot the pointer references.
        let pointer: LatestPointer = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("latest.json")).unwrap(),
        )
        .unwrap();
        std::fs::write(&pointer.latest_file, "{ not json").unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_dangling_pointer_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();

        let pointer = LatestPointer {
            latest_file: dir.path().join("training-data-gone.json"),
            timestamp: snapshot_timestamp(),
            convergence_status: ConvergenceStatus {
                stable_episodes: 0,
                last_average_reward: None,
                has_converged: false,
            },
        };
        std::fs::write(
            dir.path().join("latest.json"),
            serde_json::to_string(&pointer).unwrap(),
        )
        .unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_rotation_keeps_most_recent() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();

        let mut timestamps = Vec::new();
        for _ in 0..15 {
            let timestamp = snapshot_timestamp();
            timestamps.push(timestamp.clone());
            store.save(&sample_snapshot(timestamp)).unwrap();
        }

        let mut remaining: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("training-data-") && n.ends_with(".json"))
            .collect();
        remaining.sort();

        assert_eq!(remaining.len(), 10);

        let mut expected: Vec<String> = timestamps[5..]
            .iter()
            .map(|t| format!("training-data-{}.json", t))
            .collect();
        expected.sort();
        assert_eq!(remaining, expected);

        // The pointer still resolves after pruning.
        assert!(store.load().is_some());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().is_none());

        let data = sample_snapshot(snapshot_timestamp());
        store.save(&data).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.q_table, data.q_table);
    }
}
