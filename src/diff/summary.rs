//! Diff summary document: the persisted audit artifact of one comparison.
//!
//! Field names of [`DiffSummary`] are a wire contract. Lists are omitted from
//! the serialized document when empty, never emitted as `[]`.

use crate::errors::{Error, Result};
use crate::types::{
    ChangeKind, ChangeRecord, ChangeStatistics, ChangedFields, DiffResult, SnapshotId,
    SnapshotRef, VersionSnapshot,
};
use serde::{Deserialize, Serialize};

/// Changed fields of one updated endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedEndpointDetail {
    pub path: String,
    pub method: String,
    pub changes: ChangedFields,
}

/// Serialized shape of a diff summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub service_name: String,
    pub old_version_id: Option<SnapshotId>,
    pub old_version_tag: String,
    pub new_version_id: Option<SnapshotId>,
    pub new_version_tag: String,
    pub statistics: ChangeStatistics,
    pub schema_statistics: ChangeStatistics,
    pub total_old_endpoints: usize,
    pub total_new_endpoints: usize,
    pub total_old_schemas: usize,
    pub total_new_schemas: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub added_endpoints: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub removed_endpoints: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub updated_endpoints_details: Vec<UpdatedEndpointDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub added_schemas: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub removed_schemas: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub updated_schemas: Vec<String>,
}

impl DiffSummary {
    /// Serializes the summary to compact JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }

    /// Deserializes a persisted summary
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| Error::invalid_document(e.to_string()))
    }

    /// Total number of changes across both entity types
    pub fn total_changes(&self) -> usize {
        self.statistics.total + self.schema_statistics.total
    }
}

/// Aggregates endpoint and schema records into a summary
pub fn summarize(
    old: &VersionSnapshot,
    new: &VersionSnapshot,
    endpoint_records: &[ChangeRecord],
    schema_records: &[ChangeRecord],
) -> DiffSummary {
    let endpoint_labels = |kind: ChangeKind| -> Vec<String> {
        endpoint_records
            .iter()
            .filter(|r| r.kind == kind)
            .filter_map(|r| r.endpoint().map(|e| e.display_label()))
            .collect()
    };

    let schema_names = |kind: ChangeKind| -> Vec<String> {
        schema_records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.identity_key.clone())
            .collect()
    };

    let updated_endpoints_details = endpoint_records
        .iter()
        .filter(|r| r.kind == ChangeKind::Updated)
        .filter_map(|r| {
            r.endpoint().map(|e| UpdatedEndpointDetail {
                path: e.path.clone(),
                method: e.http_method.clone(),
                changes: r.changed_fields.clone(),
            })
        })
        .collect();

    DiffSummary {
        service_name: new.service_name.clone(),
        old_version_id: old.id,
        old_version_tag: old.version_tag.clone(),
        new_version_id: new.id,
        new_version_tag: new.version_tag.clone(),
        statistics: ChangeStatistics::tally(endpoint_records),
        schema_statistics: ChangeStatistics::tally(schema_records),
        total_old_endpoints: old.endpoints.len(),
        total_new_endpoints: new.endpoints.len(),
        total_old_schemas: old.schemas.len(),
        total_new_schemas: new.schemas.len(),
        added_endpoints: endpoint_labels(ChangeKind::Added),
        removed_endpoints: endpoint_labels(ChangeKind::Removed),
        updated_endpoints_details,
        added_schemas: schema_names(ChangeKind::Added),
        removed_schemas: schema_names(ChangeKind::Removed),
        updated_schemas: schema_names(ChangeKind::Updated),
    }
}

/// Builds the full diff result for one comparison
///
/// Pure: no I/O, no side effects beyond construction.
pub fn build_diff(
    old: &VersionSnapshot,
    new: &VersionSnapshot,
    endpoint_records: Vec<ChangeRecord>,
    schema_records: Vec<ChangeRecord>,
) -> Result<DiffResult> {
    let summary = summarize(old, new, &endpoint_records, &schema_records);
    let summary_json = summary.to_json()?;

    let endpoint_statistics = summary.statistics;
    let schema_statistics = summary.schema_statistics;

    let mut records = endpoint_records;
    records.extend(schema_records);

    Ok(DiffResult {
        service_name: new.service_name.clone(),
        old: SnapshotRef::from(old),
        new: SnapshotRef::from(new),
        records,
        endpoint_statistics,
        schema_statistics,
        summary_json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Descriptor, EndpointDescriptor, EntityType, FieldChange, SchemaDescriptor};

    fn snapshot(id: Option<u64>, tag: &str) -> VersionSnapshot {
        VersionSnapshot {
            id,
            service_name: "users".to_string(),
            source_url: "http://users/v3/api-docs".to_string(),
            version_tag: tag.to_string(),
            content_hash: "0".repeat(64),
            canonical_document: "{}".to_string(),
            endpoints: Vec::new(),
            schemas: Vec::new(),
            created_at: 0,
        }
    }

    fn endpoint_record(kind: ChangeKind, path: &str, method: &str) -> ChangeRecord {
        let descriptor = Descriptor::Endpoint(EndpointDescriptor::new(path, method));
        let key = format!("{path}:{method}");
        match kind {
            ChangeKind::Added => ChangeRecord::added(EntityType::Endpoint, key, descriptor),
            ChangeKind::Removed => ChangeRecord::removed(EntityType::Endpoint, key, descriptor),
            ChangeKind::Updated => {
                let mut changes = ChangedFields::new();
                changes.insert("summary".to_string(), FieldChange::new("a", "b"));
                ChangeRecord::updated(
                    EntityType::Endpoint,
                    key,
                    descriptor.clone(),
                    descriptor,
                    changes,
                )
            }
        }
    }

    #[test]
    fn test_summary_lists_and_statistics() {
        let old = snapshot(Some(1), "1.0.0");
        let new = snapshot(Some(2), "1.1.0");
        let endpoints = vec![
            endpoint_record(ChangeKind::Added, "/users", "post"),
            endpoint_record(ChangeKind::Removed, "/legacy", "get"),
            endpoint_record(ChangeKind::Updated, "/users", "get"),
        ];
        let schemas = vec![ChangeRecord::added(
            EntityType::Schema,
            "Account".to_string(),
            Descriptor::Schema(SchemaDescriptor::new("Account", "{}")),
        )];

        let summary = summarize(&old, &new, &endpoints, &schemas);
        assert_eq!(summary.added_endpoints, vec!["POST /users"]);
        assert_eq!(summary.removed_endpoints, vec!["GET /legacy"]);
        assert_eq!(summary.updated_endpoints_details.len(), 1);
        assert_eq!(summary.updated_endpoints_details[0].method, "get");
        assert_eq!(summary.added_schemas, vec!["Account"]);
        assert_eq!(summary.statistics.total, 3);
        assert_eq!(summary.schema_statistics.added, 1);
        assert_eq!(summary.total_changes(), 4);
    }

    #[test]
    fn test_empty_lists_are_omitted() {
        let old = snapshot(None, "1.0.0");
        let new = snapshot(Some(2), "1.0.1");
        let endpoints = vec![endpoint_record(ChangeKind::Added, "/health", "get")];

        let result = build_diff(&old, &new, endpoints, Vec::new()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&result.summary_json).unwrap();

        assert_eq!(doc["serviceName"], "users");
        assert!(doc["oldVersionId"].is_null());
        assert_eq!(doc["newVersionId"], 2);
        assert_eq!(doc["statistics"]["added"], 1);
        assert_eq!(doc["schemaStatistics"]["total"], 0);
        assert_eq!(doc["addedEndpoints"][0], "GET /health");
        for absent in [
            "removedEndpoints",
            "updatedEndpointsDetails",
            "addedSchemas",
            "removedSchemas",
            "updatedSchemas",
        ] {
            assert!(doc.get(absent).is_none(), "{absent} should be omitted");
        }
    }

    #[test]
    fn test_build_diff_orders_endpoint_records_first() {
        let old = snapshot(Some(1), "a");
        let new = snapshot(Some(2), "b");
        let schemas = vec![ChangeRecord::removed(
            EntityType::Schema,
            "Old".to_string(),
            Descriptor::Schema(SchemaDescriptor::new("Old", "{}")),
        )];
        let endpoints = vec![endpoint_record(ChangeKind::Removed, "/x", "get")];

        let result = build_diff(&old, &new, endpoints, schemas).unwrap();
        assert_eq!(result.records[0].entity_type, EntityType::Endpoint);
        assert_eq!(result.records[1].entity_type, EntityType::Schema);
        assert_eq!(result.old.id, Some(1));
        assert_eq!(result.new.version_tag, "b");
        assert_eq!(result.records_for(EntityType::Schema).count(), 1);
    }

    #[test]
    fn test_summary_reads_back() {
        let old = snapshot(Some(1), "1.0.0");
        let new = snapshot(Some(2), "2.0.0");
        let endpoints = vec![endpoint_record(ChangeKind::Updated, "/users", "get")];

        let result = build_diff(&old, &new, endpoints, Vec::new()).unwrap();
        let summary = DiffSummary::from_json(&result.summary_json).unwrap();
        assert_eq!(summary.new_version_tag, "2.0.0");
        assert_eq!(
            summary.updated_endpoints_details[0].changes["summary"],
            FieldChange::new("a", "b")
        );
        assert!(summary.added_endpoints.is_empty());
    }
}
