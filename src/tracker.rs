//! Ingestion pipeline around the fingerprint gate and diff engines.
//!
//! For one lineage the sequence "read latest hash, fingerprint, decide,
//! persist" runs under a lineage-scoped lock, so two concurrent ingestions of
//! the same `(service, source)` pair cannot both observe the same "latest"
//! snapshot.

use crate::canonical::Canonicalizer;
use crate::config::TrackerConfig;
use crate::diff::Differ;
use crate::errors::{Error, Result};
use crate::extract::{extract_endpoints, extract_schemas, parse_document, version_tag};
use crate::fingerprint::FingerprintResolver;
use crate::repository::{SnapshotRepository, StoredDiff};
use crate::types::{Lineage, SnapshotId, VersionSnapshot};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tag used when neither the caller nor the document supplies a version
pub const UNKNOWN_VERSION_TAG: &str = "unknown";

/// What the caller knows about the document being ingested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub lineage: Lineage,
    /// Caller-supplied tag; falls back to `info.version`
    pub version_tag: Option<String>,
}

impl IngestRequest {
    /// Creates a request without an explicit version tag
    pub fn new(service_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            lineage: Lineage::new(service_name, source_url),
            version_tag: None,
        }
    }

    /// Sets an explicit version tag
    pub fn with_version_tag(mut self, tag: impl Into<String>) -> Self {
        self.version_tag = Some(tag.into());
        self
    }
}

/// Result of one ingestion
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// False when the fingerprint matched the lineage's latest snapshot
    pub changed: bool,
    /// The newly stored snapshot, or the existing latest one when unchanged
    pub snapshot: VersionSnapshot,
    /// Present when a previous snapshot existed and the content changed
    pub diff: Option<StoredDiff>,
}

/// Ingests documents into a repository, recording diffs between versions
pub struct Tracker<R: SnapshotRepository> {
    repository: R,
    config: TrackerConfig,
    canonicalizer: Canonicalizer,
    resolver: FingerprintResolver,
    differ: Differ,
    lineage_locks: Mutex<HashMap<Lineage, Arc<Mutex<()>>>>,
}

impl<R: SnapshotRepository> Tracker<R> {
    /// Creates a tracker with the given repository and configuration
    pub fn new(repository: R, config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        let canonicalizer = Canonicalizer::new();
        Ok(Self {
            resolver: FingerprintResolver::new(canonicalizer, config.tracked_section.clone()),
            differ: Differ::new(canonicalizer),
            canonicalizer,
            repository,
            config,
            lineage_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the underlying repository
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Returns the configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    async fn lineage_lock(&self, lineage: &Lineage) -> Arc<Mutex<()>> {
        let mut locks = self.lineage_locks.lock().await;
        locks
            .entry(lineage.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the lineage's lock entry once no ingestion holds or awaits it
    async fn release_lineage_lock(&self, lineage: &Lineage) {
        let mut locks = self.lineage_locks.lock().await;
        if locks
            .get(lineage)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(lineage);
        }
    }

    /// Parses raw bytes and ingests the resulting document
    pub async fn ingest_raw(&self, request: IngestRequest, raw: &[u8]) -> Result<IngestOutcome> {
        let document = parse_document(raw, self.config.max_document_size)?;
        self.ingest(request, &document).await
    }

    /// Ingests an already-parsed document
    ///
    /// Either the new snapshot and its diff are both stored, or neither is.
    pub async fn ingest(&self, request: IngestRequest, document: &Value) -> Result<IngestOutcome> {
        let lineage = request.lineage.clone();

        let lock = self.lineage_lock(&lineage).await;
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(request, document).await
        };
        drop(lock);
        self.release_lineage_lock(&lineage).await;

        result.map_err(|e| Error::lineage(lineage.service_name, lineage.source_url, e))
    }

    async fn ingest_locked(&self, request: IngestRequest, document: &Value) -> Result<IngestOutcome> {
        let lineage = request.lineage;
        let latest = self.repository.find_latest(&lineage).await?;
        let fingerprint = self
            .resolver
            .resolve(document, latest.as_ref().map(|s| s.content_hash.as_str()));

        if !fingerprint.changed {
            if let Some(latest) = latest {
                tracing::debug!(
                    lineage = %lineage,
                    hash = %fingerprint.hash,
                    snapshot_id = ?latest.id,
                    "fingerprint unchanged, skipping diff"
                );
                return Ok(IngestOutcome {
                    changed: false,
                    snapshot: latest,
                    diff: None,
                });
            }
        }

        let id = self.repository.reserve_snapshot_id().await?;
        let snapshot = VersionSnapshot {
            id: Some(id),
            service_name: lineage.service_name.clone(),
            source_url: lineage.source_url.clone(),
            version_tag: request
                .version_tag
                .or_else(|| version_tag(document))
                .unwrap_or_else(|| UNKNOWN_VERSION_TAG.to_string()),
            content_hash: fingerprint.hash,
            canonical_document: fingerprint.canonical,
            endpoints: extract_endpoints(document, &self.config),
            schemas: extract_schemas(document, &self.canonicalizer),
            created_at: chrono::Utc::now().timestamp(),
        };

        let pending_diff = match &latest {
            Some(previous) => Some(self.differ.diff_snapshots(previous, &snapshot)?),
            None => None,
        };

        let snapshot = match self.repository.save_snapshot(snapshot).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.rollback_snapshot(&lineage, id).await;
                return Err(e);
            }
        };

        let diff = match pending_diff {
            Some(result) => match self.repository.save_diff(&lineage, result).await {
                Ok(stored) => Some(stored),
                Err(e) => {
                    self.rollback_snapshot(&lineage, id).await;
                    return Err(e);
                }
            },
            None => None,
        };

        tracing::info!(
            lineage = %lineage,
            snapshot_id = id,
            version_tag = %snapshot.version_tag,
            endpoints = snapshot.endpoints.len(),
            schemas = snapshot.schemas.len(),
            "stored new snapshot"
        );
        if let Some(stored) = &diff {
            let result = &stored.result;
            tracing::info!(
                lineage = %lineage,
                diff_id = stored.id,
                old_snapshot_id = ?stored.old_snapshot_id,
                new_snapshot_id = ?stored.new_snapshot_id,
                endpoints_added = result.endpoint_statistics.added,
                endpoints_removed = result.endpoint_statistics.removed,
                endpoints_updated = result.endpoint_statistics.updated,
                schemas_added = result.schema_statistics.added,
                schemas_removed = result.schema_statistics.removed,
                schemas_updated = result.schema_statistics.updated,
                "api surface changed"
            );
        }

        Ok(IngestOutcome {
            changed: true,
            snapshot,
            diff,
        })
    }

    /// Removes a partially committed snapshot so a retry sees the previous latest
    async fn rollback_snapshot(&self, lineage: &Lineage, id: SnapshotId) {
        if let Err(e) = self.repository.delete_snapshot(lineage, id).await {
            tracing::error!(
                lineage = %lineage,
                snapshot_id = id,
                error = %e,
                "failed to roll back snapshot"
            );
        }
    }

    /// History of a lineage, oldest first
    pub async fn history(&self, lineage: &Lineage) -> Result<Vec<VersionSnapshot>> {
        self.repository.find_by_lineage(lineage).await
    }

    /// Recorded diffs, newest first, optionally for one service
    pub async fn diffs(&self, service_name: Option<&str>) -> Result<Vec<StoredDiff>> {
        self.repository.list_diffs(service_name).await
    }
}
