//! Field-level diffing of snapshots

pub mod endpoint;
pub mod schema;
pub mod summary;

pub use endpoint::*;
pub use schema::*;
pub use summary::*;

use crate::canonical::Canonicalizer;
use crate::errors::Result;
use crate::types::{DiffResult, VersionSnapshot};

/// Runs both diff engines over two snapshots and builds the summary
#[derive(Debug, Clone)]
pub struct Differ {
    schemas: SchemaDiffer,
}

impl Differ {
    /// Creates a new differ
    pub fn new(canonicalizer: Canonicalizer) -> Self {
        Self {
            schemas: SchemaDiffer::new(canonicalizer),
        }
    }

    /// Compares two snapshots of the same lineage
    pub fn diff_snapshots(&self, old: &VersionSnapshot, new: &VersionSnapshot) -> Result<DiffResult> {
        let endpoint_records = diff_endpoints(&old.endpoints, &new.endpoints);
        let schema_records = self.schemas.diff(&old.schemas, &new.schemas);
        build_diff(old, new, endpoint_records, schema_records)
    }
}

impl Default for Differ {
    fn default() -> Self {
        Self::new(Canonicalizer::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EndpointDescriptor, SchemaDescriptor};

    fn snapshot(id: u64, endpoints: Vec<EndpointDescriptor>, schemas: Vec<SchemaDescriptor>) -> VersionSnapshot {
        VersionSnapshot {
            id: Some(id),
            service_name: "orders".to_string(),
            source_url: "http://orders/openapi.json".to_string(),
            version_tag: format!("v{id}"),
            content_hash: String::new(),
            canonical_document: String::new(),
            endpoints,
            schemas,
            created_at: 0,
        }
    }

    #[test]
    fn test_diff_snapshots() {
        let old = snapshot(
            1,
            vec![EndpointDescriptor::new("/orders", "get")],
            vec![SchemaDescriptor::new("Order", r#"{"type":"object"}"#)],
        );
        let new = snapshot(
            2,
            vec![
                EndpointDescriptor::new("/orders", "get"),
                EndpointDescriptor::new("/orders", "post"),
            ],
            vec![SchemaDescriptor::new("Order", r#"{"type":"array"}"#)],
        );

        let result = Differ::default().diff_snapshots(&old, &new).unwrap();
        assert_eq!(result.endpoint_statistics.added, 1);
        assert_eq!(result.schema_statistics.updated, 1);
        assert_eq!(result.records.len(), 2);
        assert!(result.has_changes());
    }

    #[test]
    fn test_diff_identical_snapshots() {
        let old = snapshot(1, vec![EndpointDescriptor::new("/a", "get")], Vec::new());
        let new = snapshot(2, vec![EndpointDescriptor::new("/a", "get")], Vec::new());

        let result = Differ::default().diff_snapshots(&old, &new).unwrap();
        assert!(!result.has_changes());
        assert_eq!(result.endpoint_statistics.total, 0);
    }
}
