//! Storage backend abstraction and utilities.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Suffix appended to keys whose value is gzip-compressed
const COMPRESSED_SUFFIX: &str = ".gz";

/// Storage backend trait for low-level key-value operations
///
/// This abstracts the underlying storage mechanism (SQL table, KV store, ...)
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stores a value at the given key
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieves a value by key
    ///
    /// Returns `Error::KeyNotFound` if key doesn't exist
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Deletes a key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists all keys with the given prefix
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Closes the backend connection
    async fn close(&self) -> Result<()>;
}

/// In-memory key-value backend
///
/// Thread-safe, useful for testing and development.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    closed: RwLock<bool>,
}

impl MemoryBackend {
    /// Creates a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    async fn ensure_open(&self) -> Result<()> {
        if *self.inner.closed.read().await {
            return Err(Error::backend_unavailable("backend is closed"));
        }
        Ok(())
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    /// Returns true if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_open().await?;
        let mut entries = self.inner.entries.write().await;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.ensure_open().await?;
        let entries = self.inner.entries.read().await;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open().await?;
        let mut entries = self.inner.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.ensure_open().await?;
        let entries = self.inner.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let mut closed = self.inner.closed.write().await;
        *closed = true;
        Ok(())
    }
}

/// Storage helper for JSON serialization and compression
#[derive(Debug, Clone)]
pub struct StorageHelper {
    compression_threshold: usize,
    max_size: usize,
}

impl StorageHelper {
    /// Creates a new storage helper; a zero threshold or size disables the check
    pub fn new(compression_threshold: usize, max_size: usize) -> Self {
        Self {
            compression_threshold,
            max_size,
        }
    }

    /// Stores a JSON-serializable value
    pub async fn put_json<B: StorageBackend + ?Sized>(
        &self,
        backend: &B,
        key: &str,
        value: &impl serde::Serialize,
    ) -> Result<()> {
        let data = serde_json::to_vec(value)?;

        if self.max_size > 0 && data.len() > self.max_size {
            return Err(Error::document_too_large(data.len(), self.max_size));
        }

        if self.compression_threshold > 0 && data.len() > self.compression_threshold {
            let compressed = compress_data(&data)?;
            backend
                .put(&format!("{key}{COMPRESSED_SUFFIX}"), &compressed)
                .await
        } else {
            backend.put(key, &data).await
        }
    }

    /// Retrieves and deserializes a JSON value
    pub async fn get_json<B: StorageBackend + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        backend: &B,
        key: &str,
    ) -> Result<T> {
        // Try compressed version first
        let data = match backend.get(&format!("{key}{COMPRESSED_SUFFIX}")).await {
            Ok(compressed) => decompress_data(&compressed)?,
            Err(e) if e.is_not_found() => backend.get(key).await?,
            Err(e) => return Err(e),
        };

        serde_json::from_slice(&data).map_err(|e| Error::invalid_document(e.to_string()))
    }

    /// Deletes a value stored by [`StorageHelper::put_json`], compressed or not
    pub async fn delete<B: StorageBackend + ?Sized>(&self, backend: &B, key: &str) -> Result<()> {
        backend.delete(&format!("{key}{COMPRESSED_SUFFIX}")).await?;
        backend.delete(key).await
    }
}

/// Strips the compression suffix from a listed key
pub fn logical_key(key: &str) -> &str {
    key.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(key)
}

/// Compresses data using gzip
fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses gzip data
fn decompress_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}
