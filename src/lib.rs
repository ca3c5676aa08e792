//! specwatch - API snapshot fingerprinting and diff engine
//!
//! specwatch records successive versions of a service's OpenAPI document and
//! reports what changed between them at the level of individual endpoints and
//! schemas.
//!
//! # Overview
//!
//! specwatch provides:
//! - Key-order independent canonical forms of JSON documents
//! - SHA-256 content fingerprints that gate all further work
//! - Field-level endpoint and schema diffs
//! - Stable JSON summaries of every diff
//! - Backend-agnostic persistence of snapshots and diffs
//!
//! # Basic Usage
//!
//! Diffing two snapshots:
//!
//! ```
//! use specwatch::prelude::*;
//! use serde_json::json;
//!
//! let old = json!({"paths": {"/users": {"get": {"summary": "list"}}}});
//! let new = json!({"paths": {"/users": {"get": {"summary": "list users"}}}});
//!
//! let config = TrackerConfig::default();
//! let old_endpoints = extract_endpoints(&old, &config);
//! let new_endpoints = extract_endpoints(&new, &config);
//!
//! let records = diff_endpoints(&old_endpoints, &new_endpoints);
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].kind, ChangeKind::Updated);
//! assert!(records[0].changed_fields.contains_key("summary"));
//! ```
//!
//! Ingesting documents end to end:
//!
//! ```
//! use specwatch::prelude::*;
//! use serde_json::json;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let tracker = Tracker::new(MemoryRepository::in_memory(), TrackerConfig::default())?;
//! let request = IngestRequest::new("users", "http://users/openapi.json");
//!
//! tracker.ingest(request.clone(), &json!({"paths": {"/users": {"get": {}}}})).await?;
//! let outcome = tracker
//!     .ingest(request, &json!({"paths": {"/users": {"get": {}, "post": {}}}}))
//!     .await?;
//!
//! let diff = outcome.diff.expect("second version produces a diff");
//! assert_eq!(diff.result.endpoint_statistics.added, 1);
//! # Ok::<(), specwatch::Error>(())
//! # }).unwrap();
//! # }
//! ```

pub mod canonical;
pub mod config;
pub mod diff;
pub mod errors;
pub mod extract;
pub mod fingerprint;
pub mod repository;
pub mod storage;
pub mod tracker;
pub mod types;

// Re-exports for convenience
pub use errors::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::canonical::Canonicalizer;
    pub use crate::config::TrackerConfig;
    pub use crate::diff::*;
    pub use crate::errors::{Error, Result};
    pub use crate::extract::*;
    pub use crate::fingerprint::*;
    pub use crate::repository::*;
    pub use crate::storage::*;
    pub use crate::tracker::*;
    pub use crate::types::*;
}
