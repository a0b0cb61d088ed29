//! In-memory repository with optional JSON snapshot persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    attempt::{AttemptRecord, AttemptStats, BlockEntry},
    repositories::AttemptRepository,
};

/// In-process repository backed by concurrent maps.
///
/// This is the default backend: infallible, safe to share across tasks,
/// and sufficient for a single-process deployment. State can optionally be
/// mirrored to a JSON snapshot file; the mirror is best-effort write-behind
/// and never affects the in-memory decision. Load and save failures are
/// logged and ignored.
///
/// The snapshot is a single JSON document holding the attempt log, block
/// entries, and offense counts keyed by address. It is an implementation
/// detail, not a stable wire format.
pub struct MemoryAttemptRepository {
    attempts: DashMap<String, Vec<AttemptRecord>>,
    blocks: DashMap<String, BlockEntry>,
    offenses: DashMap<String, u32>,
    snapshot_path: Option<PathBuf>,
}

/// On-disk form of the repository state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    attempts: BTreeMap<String, Vec<AttemptRecord>>,
    blocks: BTreeMap<String, BlockEntry>,
    offenses: BTreeMap<String, u32>,
}

impl MemoryAttemptRepository {
    /// Create an empty repository with no persistence.
    pub fn new() -> Self {
        Self {
            attempts: DashMap::new(),
            blocks: DashMap::new(),
            offenses: DashMap::new(),
            snapshot_path: None,
        }
    }

    /// Create a repository mirrored to a JSON snapshot file.
    ///
    /// Existing state at `path` is loaded; a missing or unreadable snapshot
    /// starts the repository empty.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let repository = Self {
            snapshot_path: Some(path.clone()),
            ..Self::new()
        };

        if let Some(snapshot) = Self::load_snapshot(&path) {
            for (address, records) in snapshot.attempts {
                repository.attempts.insert(address, records);
            }
            for (address, entry) in snapshot.blocks {
                repository.blocks.insert(address, entry);
            }
            for (address, count) in snapshot.offenses {
                repository.offenses.insert(address, count);
            }
        }

        repository
    }

    fn load_snapshot(path: &Path) -> Option<Snapshot> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read throttle snapshot");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to parse throttle snapshot");
                None
            }
        }
    }

    /// Persist the current state to the snapshot file, if one is set.
    ///
    /// Failures are logged and ignored; the in-memory state stays
    /// authoritative.
    fn save_snapshot(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };

        let snapshot = Snapshot {
            attempts: self
                .attempts
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            blocks: self
                .blocks
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            offenses: self
                .offenses
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        };

        let bytes = match serde_json::to_vec(&snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize throttle snapshot");
                return;
            }
        };

        if let Err(e) = std::fs::write(path, bytes) {
            tracing::warn!(error = %e, path = %path.display(), "Failed to write throttle snapshot");
        }
    }
}

impl Default for MemoryAttemptRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttemptRepository for MemoryAttemptRepository {
    async fn record_attempt(&self, record: &AttemptRecord) -> Result<(), Error> {
        self.attempts
            .entry(record.address.clone())
            .or_default()
            .push(record.clone());
        self.save_snapshot();
        Ok(())
    }

    async fn attempt_stats(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        let stats = match self.attempts.get(address) {
            Some(records) => {
                let failed = records
                    .iter()
                    .filter(|r| !r.succeeded && r.attempted_at >= since);
                AttemptStats {
                    failed_count: failed.clone().count() as u32,
                    latest_at: failed.map(|r| r.attempted_at).max(),
                }
            }
            None => AttemptStats::default(),
        };

        Ok(stats)
    }

    async fn prune_attempts(&self, address: &str, before: DateTime<Utc>) -> Result<u64, Error> {
        let removed = match self.attempts.get_mut(address) {
            Some(mut records) => {
                let before_len = records.len();
                records.retain(|r| r.attempted_at >= before);
                (before_len - records.len()) as u64
            }
            None => 0,
        };

        if removed > 0 {
            self.attempts
                .remove_if(address, |_, records| records.is_empty());
            self.save_snapshot();
        }

        Ok(removed)
    }

    async fn clear_attempts(&self, address: &str) -> Result<u64, Error> {
        let removed = self
            .attempts
            .remove(address)
            .map(|(_, records)| records.len() as u64)
            .unwrap_or(0);

        if removed > 0 {
            self.save_snapshot();
        }

        Ok(removed)
    }

    async fn get_block(&self, address: &str) -> Result<Option<BlockEntry>, Error> {
        Ok(self.blocks.get(address).map(|entry| entry.value().clone()))
    }

    async fn put_block(&self, entry: &BlockEntry) -> Result<(), Error> {
        self.blocks.insert(entry.address.clone(), entry.clone());
        self.save_snapshot();
        Ok(())
    }

    async fn delete_block(&self, address: &str) -> Result<bool, Error> {
        let existed = self.blocks.remove(address).is_some();
        if existed {
            self.save_snapshot();
        }
        Ok(existed)
    }

    async fn offense_count(&self, address: &str) -> Result<u32, Error> {
        Ok(self
            .offenses
            .get(address)
            .map(|count| *count.value())
            .unwrap_or(0))
    }

    async fn set_offense_count(&self, address: &str, count: u32) -> Result<(), Error> {
        if count == 0 {
            self.offenses.remove(address);
        } else {
            self.offenses.insert(address.to_string(), count);
        }
        self.save_snapshot();
        Ok(())
    }

    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let mut removed = 0u64;
        for mut entry in self.attempts.iter_mut() {
            let before_len = entry.value().len();
            entry.value_mut().retain(|r| r.attempted_at >= before);
            removed += (before_len - entry.value().len()) as u64;
        }

        if removed > 0 {
            self.attempts.retain(|_, records| !records.is_empty());
            self.save_snapshot();
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Principal;
    use chrono::Duration;

    fn failed_attempt(address: &str, age: Duration) -> AttemptRecord {
        AttemptRecord {
            principal: Some(Principal::new("alice@example.com").unwrap()),
            address: address.to_string(),
            succeeded: false,
            attempted_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn test_stats_count_only_failures_in_window() {
        let repo = MemoryAttemptRepository::new();
        let address = "10.0.0.1";

        repo.record_attempt(&failed_attempt(address, Duration::minutes(5)))
            .await
            .unwrap();
        repo.record_attempt(&failed_attempt(address, Duration::minutes(45)))
            .await
            .unwrap();
        repo.record_attempt(&AttemptRecord::new(None, address, true))
            .await
            .unwrap();

        let stats = repo
            .attempt_stats(address, Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
        assert!(stats.latest_at.is_some());
    }

    #[tokio::test]
    async fn test_stats_for_unknown_address() {
        let repo = MemoryAttemptRepository::new();
        let stats = repo
            .attempt_stats("10.9.9.9", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats, AttemptStats::default());
    }

    #[tokio::test]
    async fn test_prune_removes_only_old_records() {
        let repo = MemoryAttemptRepository::new();
        let address = "10.0.0.1";

        repo.record_attempt(&failed_attempt(address, Duration::minutes(5)))
            .await
            .unwrap();
        repo.record_attempt(&failed_attempt(address, Duration::minutes(45)))
            .await
            .unwrap();

        let removed = repo
            .prune_attempts(address, Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let stats = repo
            .attempt_stats(address, Utc::now() - Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
    }

    #[tokio::test]
    async fn test_clear_attempts_is_per_address() {
        let repo = MemoryAttemptRepository::new();

        repo.record_attempt(&failed_attempt("10.0.0.1", Duration::zero()))
            .await
            .unwrap();
        repo.record_attempt(&failed_attempt("10.0.0.2", Duration::zero()))
            .await
            .unwrap();

        assert_eq!(repo.clear_attempts("10.0.0.1").await.unwrap(), 1);
        assert_eq!(repo.clear_attempts("10.0.0.1").await.unwrap(), 0);

        let stats = repo
            .attempt_stats("10.0.0.2", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
    }

    #[tokio::test]
    async fn test_block_entry_lifecycle() {
        let repo = MemoryAttemptRepository::new();
        let entry = BlockEntry {
            address: "10.0.0.1".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(15),
            failed_attempts: 5,
            prior_blocks: 0,
        };

        assert!(repo.get_block("10.0.0.1").await.unwrap().is_none());

        repo.put_block(&entry).await.unwrap();
        assert_eq!(repo.get_block("10.0.0.1").await.unwrap(), Some(entry));

        assert!(repo.delete_block("10.0.0.1").await.unwrap());
        assert!(!repo.delete_block("10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_offense_count_roundtrip() {
        let repo = MemoryAttemptRepository::new();

        assert_eq!(repo.offense_count("10.0.0.1").await.unwrap(), 0);

        repo.set_offense_count("10.0.0.1", 3).await.unwrap();
        assert_eq!(repo.offense_count("10.0.0.1").await.unwrap(), 3);

        repo.set_offense_count("10.0.0.1", 0).await.unwrap();
        assert_eq!(repo.offense_count("10.0.0.1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_spans_addresses() {
        let repo = MemoryAttemptRepository::new();

        repo.record_attempt(&failed_attempt("10.0.0.1", Duration::days(8)))
            .await
            .unwrap();
        repo.record_attempt(&failed_attempt("10.0.0.2", Duration::days(8)))
            .await
            .unwrap();
        repo.record_attempt(&failed_attempt("10.0.0.2", Duration::zero()))
            .await
            .unwrap();

        let removed = repo
            .cleanup_old_attempts(Utc::now() - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let stats = repo
            .attempt_stats("10.0.0.2", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("throttle.json");

        {
            let repo = MemoryAttemptRepository::with_snapshot(&path);
            repo.record_attempt(&failed_attempt("10.0.0.1", Duration::zero()))
                .await
                .unwrap();
            repo.set_offense_count("10.0.0.1", 2).await.unwrap();
            repo.put_block(&BlockEntry {
                address: "10.0.0.1".to_string(),
                created_at: Utc::now(),
                expires_at: Utc::now() + Duration::minutes(30),
                failed_attempts: 5,
                prior_blocks: 2,
            })
            .await
            .unwrap();
        }

        let reloaded = MemoryAttemptRepository::with_snapshot(&path);
        let stats = reloaded
            .attempt_stats("10.0.0.1", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
        assert_eq!(reloaded.offense_count("10.0.0.1").await.unwrap(), 2);
        assert!(reloaded.get_block("10.0.0.1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("throttle.json");
        std::fs::write(&path, b"not json").unwrap();

        let repo = MemoryAttemptRepository::with_snapshot(&path);
        let stats = repo
            .attempt_stats("10.0.0.1", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats, AttemptStats::default());
    }
}
