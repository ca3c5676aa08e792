//! Snapshot and diff persistence.
//!
//! The core never depends on a storage engine: it talks to a
//! [`SnapshotRepository`], and [`KvRepository`] provides an implementation over
//! any [`StorageBackend`].
//!
//! Key layout under the configured namespace:
//!
//! ```text
//! {ns}/sequence/{snapshots|diffs}             next identifier
//! {ns}/snapshots/{id}                         VersionSnapshot
//! {ns}/lineages/{lineage-digest}/{id}         lineage index entry
//! {ns}/diffs/{id}                             StoredDiff
//! ```
//!
//! Identifiers are zero-padded so lexical key order equals numeric order.

use crate::config::TrackerConfig;
use crate::errors::{Error, Result};
use crate::storage::{logical_key, MemoryBackend, StorageBackend, StorageHelper};
use crate::types::{DiffId, DiffResult, Lineage, SnapshotId, VersionSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// A persisted diff with its identity and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDiff {
    pub id: DiffId,
    pub lineage: Lineage,
    pub old_snapshot_id: Option<SnapshotId>,
    pub new_snapshot_id: Option<SnapshotId>,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    pub result: DiffResult,
}

/// Repository interface implemented by the storage collaborator
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Allocates a snapshot identifier without storing anything
    async fn reserve_snapshot_id(&self) -> Result<SnapshotId>;

    /// Persists a snapshot and returns it with its identifier
    ///
    /// A snapshot without an identifier gets a freshly allocated one; a
    /// snapshot carrying a reserved identifier keeps it.
    async fn save_snapshot(&self, snapshot: VersionSnapshot) -> Result<VersionSnapshot>;

    /// Removes a snapshot and its lineage index entry
    ///
    /// Deleting an identifier that was never stored is not an error.
    async fn delete_snapshot(&self, lineage: &Lineage, id: SnapshotId) -> Result<()>;

    /// Fetches a snapshot by identifier
    async fn find_snapshot(&self, id: SnapshotId) -> Result<VersionSnapshot>;

    /// All snapshots of a lineage, oldest first
    async fn find_by_lineage(&self, lineage: &Lineage) -> Result<Vec<VersionSnapshot>>;

    /// The snapshot with the greatest identifier in a lineage
    async fn find_latest(&self, lineage: &Lineage) -> Result<Option<VersionSnapshot>>;

    /// Persists a diff result
    async fn save_diff(&self, lineage: &Lineage, result: DiffResult) -> Result<StoredDiff>;

    /// Fetches a diff by identifier
    async fn find_diff(&self, id: DiffId) -> Result<StoredDiff>;

    /// Diffs newest first, optionally restricted to one service
    async fn list_diffs(&self, service_name: Option<&str>) -> Result<Vec<StoredDiff>>;

    /// Checks that the underlying storage is reachable
    async fn health(&self) -> Result<()>;

    /// Releases the underlying storage
    async fn close(&self) -> Result<()>;
}

/// Repository over a key-value backend
pub struct KvRepository<B: StorageBackend> {
    backend: B,
    helper: StorageHelper,
    namespace: String,
    sequence_lock: Mutex<()>,
}

/// In-memory repository for tests and development
pub type MemoryRepository = KvRepository<MemoryBackend>;

impl MemoryRepository {
    /// Creates an empty in-memory repository with default settings
    pub fn in_memory() -> Self {
        KvRepository::new(MemoryBackend::new(), "specwatch", 0, 0)
    }
}

impl<B: StorageBackend> KvRepository<B> {
    /// Creates a new repository
    pub fn new(
        backend: B,
        namespace: impl Into<String>,
        compression_threshold: usize,
        max_size: usize,
    ) -> Self {
        Self {
            backend,
            helper: StorageHelper::new(compression_threshold, max_size),
            namespace: namespace.into(),
            sequence_lock: Mutex::new(()),
        }
    }

    /// Creates a repository using the namespace and compression settings of
    /// a tracker configuration
    pub fn from_config(backend: B, config: &TrackerConfig) -> Self {
        Self::new(backend, config.namespace.clone(), config.compression_threshold, 0)
    }

    /// Returns the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn sequence_key(&self, kind: &str) -> String {
        format!("{}/sequence/{}", self.namespace, kind)
    }

    fn snapshot_key(&self, id: SnapshotId) -> String {
        format!("{}/snapshots/{:020}", self.namespace, id)
    }

    fn diff_key(&self, id: DiffId) -> String {
        format!("{}/diffs/{:020}", self.namespace, id)
    }

    /// Source URLs contain `/`, so lineages are indexed by digest
    fn lineage_prefix(&self, lineage: &Lineage) -> String {
        let mut hasher = Sha256::new();
        hasher.update(lineage.service_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(lineage.source_url.as_bytes());
        format!(
            "{}/lineages/{}/",
            self.namespace,
            hex::encode(hasher.finalize())
        )
    }

    fn lineage_index_key(&self, lineage: &Lineage, id: SnapshotId) -> String {
        format!("{}{:020}", self.lineage_prefix(lineage), id)
    }

    /// Allocates the next identifier of a sequence
    async fn next_id(&self, kind: &str) -> Result<u64> {
        let _guard = self.sequence_lock.lock().await;
        let key = self.sequence_key(kind);

        let current: u64 = match self.helper.get_json(&self.backend, &key).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => 0,
            Err(e) => return Err(e),
        };

        let next = current + 1;
        self.helper.put_json(&self.backend, &key, &next).await?;
        Ok(next)
    }

    /// Snapshot identifiers of a lineage, ascending
    async fn lineage_ids(&self, lineage: &Lineage) -> Result<Vec<SnapshotId>> {
        let prefix = self.lineage_prefix(lineage);
        let keys = self.backend.list(&prefix).await?;

        let mut ids: Vec<SnapshotId> = keys
            .iter()
            .filter_map(|k| logical_key(k).strip_prefix(prefix.as_str()))
            .filter_map(|id| id.parse().ok())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl<B: StorageBackend> SnapshotRepository for KvRepository<B> {
    async fn reserve_snapshot_id(&self) -> Result<SnapshotId> {
        self.next_id("snapshots").await
    }

    async fn save_snapshot(&self, snapshot: VersionSnapshot) -> Result<VersionSnapshot> {
        let id = match snapshot.id {
            Some(id) => id,
            None => self.next_id("snapshots").await?,
        };
        let stored = VersionSnapshot {
            id: Some(id),
            ..snapshot
        };

        self.helper
            .put_json(&self.backend, &self.snapshot_key(id), &stored)
            .await?;

        // The index entry is what makes the snapshot visible as "latest"
        let index_key = self.lineage_index_key(&stored.lineage(), id);
        self.helper.put_json(&self.backend, &index_key, &id).await?;

        Ok(stored)
    }

    async fn delete_snapshot(&self, lineage: &Lineage, id: SnapshotId) -> Result<()> {
        self.helper
            .delete(&self.backend, &self.lineage_index_key(lineage, id))
            .await?;
        self.helper
            .delete(&self.backend, &self.snapshot_key(id))
            .await
    }

    async fn find_snapshot(&self, id: SnapshotId) -> Result<VersionSnapshot> {
        self.helper
            .get_json(&self.backend, &self.snapshot_key(id))
            .await
            .map_err(|e| match e {
                Error::KeyNotFound(_) => Error::SnapshotNotFound(id),
                _ => e,
            })
    }

    async fn find_by_lineage(&self, lineage: &Lineage) -> Result<Vec<VersionSnapshot>> {
        let mut snapshots = Vec::new();
        for id in self.lineage_ids(lineage).await? {
            snapshots.push(self.find_snapshot(id).await?);
        }
        Ok(snapshots)
    }

    async fn find_latest(&self, lineage: &Lineage) -> Result<Option<VersionSnapshot>> {
        match self.lineage_ids(lineage).await?.last() {
            Some(&id) => Ok(Some(self.find_snapshot(id).await?)),
            None => Ok(None),
        }
    }

    async fn save_diff(&self, lineage: &Lineage, result: DiffResult) -> Result<StoredDiff> {
        let id = self.next_id("diffs").await?;
        let stored = StoredDiff {
            id,
            lineage: lineage.clone(),
            old_snapshot_id: result.old.id,
            new_snapshot_id: result.new.id,
            created_at: chrono::Utc::now().timestamp(),
            result,
        };

        self.helper
            .put_json(&self.backend, &self.diff_key(id), &stored)
            .await?;
        Ok(stored)
    }

    async fn find_diff(&self, id: DiffId) -> Result<StoredDiff> {
        self.helper
            .get_json(&self.backend, &self.diff_key(id))
            .await
            .map_err(|e| match e {
                Error::KeyNotFound(_) => Error::DiffNotFound(id),
                _ => e,
            })
    }

    async fn list_diffs(&self, service_name: Option<&str>) -> Result<Vec<StoredDiff>> {
        let prefix = format!("{}/diffs/", self.namespace);
        let keys = self.backend.list(&prefix).await?;

        let mut ids: Vec<DiffId> = keys
            .iter()
            .filter_map(|k| logical_key(k).strip_prefix(prefix.as_str()))
            .filter_map(|id| id.parse().ok())
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.dedup();

        let mut diffs = Vec::new();
        for id in ids {
            let diff = self.find_diff(id).await?;
            if service_name.map_or(true, |name| diff.lineage.service_name == name) {
                diffs.push(diff);
            }
        }
        Ok(diffs)
    }

    async fn health(&self) -> Result<()> {
        self.backend.list(&self.sequence_key("")).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}
