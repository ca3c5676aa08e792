//! Core type definitions for snapshot tracking.
//!
//! Every type here is a plain value object: descriptors are produced fresh per
//! snapshot, snapshots are never mutated after they are stored, and change
//! records only exist as the output of a single diff invocation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier assigned by the repository, monotonically increasing
pub type SnapshotId = u64;

/// Identifier of a persisted diff record
pub type DiffId = u64;

/// Identity of one observed API surface: all snapshots sharing it form a lineage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineage {
    pub service_name: String,
    pub source_url: String,
}

impl Lineage {
    /// Creates a new lineage key
    pub fn new(service_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            source_url: source_url.into(),
        }
    }
}

impl std::fmt::Display for Lineage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.service_name, self.source_url)
    }
}

/// Normalized, diff-comparable view of one HTTP operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub path: String,
    pub http_method: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub operation_id: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub request_schema_ref: String,
    #[serde(default)]
    pub response_schema_ref: String,
}

impl EndpointDescriptor {
    /// Creates a descriptor with every optional attribute at its default
    pub fn new(path: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            http_method: http_method.into(),
            ..Default::default()
        }
    }

    /// Identity key within a snapshot: `path:httpMethod`
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.path, self.http_method)
    }

    /// Human-readable label used in summaries, e.g. `POST /users`
    pub fn display_label(&self) -> String {
        format!("{} {}", self.http_method.to_uppercase(), self.path)
    }
}

/// Normalized view of one named schema document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    pub name: String,
    /// Canonical string form of the whole schema tree
    pub raw_schema: String,
    /// Canonical string form of the `properties` sub-document, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
}

impl SchemaDescriptor {
    /// Creates a schema descriptor
    pub fn new(name: impl Into<String>, raw_schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_schema: raw_schema.into(),
            properties: None,
        }
    }
}

/// One observation of a service's API surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    /// Assigned by the repository on save; `None` for unsaved snapshots
    #[serde(default)]
    pub id: Option<SnapshotId>,
    pub service_name: String,
    pub source_url: String,
    pub version_tag: String,
    /// Lowercase hex SHA-256 of `canonical_document`
    pub content_hash: String,
    /// Canonical string form of the tracked sub-document
    pub canonical_document: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointDescriptor>,
    #[serde(default)]
    pub schemas: Vec<SchemaDescriptor>,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

impl VersionSnapshot {
    /// Returns the lineage this snapshot belongs to
    pub fn lineage(&self) -> Lineage {
        Lineage::new(self.service_name.clone(), self.source_url.clone())
    }
}

/// Classification of a change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Added,
    Removed,
    Updated,
}

impl ChangeKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "ADDED",
            ChangeKind::Removed => "REMOVED",
            ChangeKind::Updated => "UPDATED",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of entity a change record refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Endpoint,
    Schema,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Endpoint => "ENDPOINT",
            EntityType::Schema => "SCHEMA",
        };
        write!(f, "{s}")
    }
}

/// Descriptor captured on either side of a change record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Descriptor {
    Endpoint(EndpointDescriptor),
    Schema(SchemaDescriptor),
}

/// Before/after pair of one changed field; `None` serializes as `null`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FieldChange {
    /// Creates a change where both sides are present
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: Some(before.into()),
            after: Some(after.into()),
        }
    }
}

/// Field name to before/after pair, ordered by field name
pub type ChangedFields = BTreeMap<String, FieldChange>;

/// One classified difference between two descriptor collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub entity_type: EntityType,
    pub identity_key: String,
    pub before: Option<Descriptor>,
    pub after: Option<Descriptor>,
    /// Only populated for `UPDATED`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changed_fields: ChangedFields,
}

impl ChangeRecord {
    /// Creates an `ADDED` record
    pub fn added(entity_type: EntityType, identity_key: String, after: Descriptor) -> Self {
        Self {
            kind: ChangeKind::Added,
            entity_type,
            identity_key,
            before: None,
            after: Some(after),
            changed_fields: ChangedFields::new(),
        }
    }

    /// Creates a `REMOVED` record
    pub fn removed(entity_type: EntityType, identity_key: String, before: Descriptor) -> Self {
        Self {
            kind: ChangeKind::Removed,
            entity_type,
            identity_key,
            before: Some(before),
            after: None,
            changed_fields: ChangedFields::new(),
        }
    }

    /// Creates an `UPDATED` record
    pub fn updated(
        entity_type: EntityType,
        identity_key: String,
        before: Descriptor,
        after: Descriptor,
        changed_fields: ChangedFields,
    ) -> Self {
        Self {
            kind: ChangeKind::Updated,
            entity_type,
            identity_key,
            before: Some(before),
            after: Some(after),
            changed_fields,
        }
    }

    /// Endpoint descriptor on the "after" side, falling back to "before"
    pub fn endpoint(&self) -> Option<&EndpointDescriptor> {
        match (&self.after, &self.before) {
            (Some(Descriptor::Endpoint(e)), _) | (None, Some(Descriptor::Endpoint(e))) => Some(e),
            _ => None,
        }
    }

    /// Schema descriptor on the "after" side, falling back to "before"
    pub fn schema(&self) -> Option<&SchemaDescriptor> {
        match (&self.after, &self.before) {
            (Some(Descriptor::Schema(s)), _) | (None, Some(Descriptor::Schema(s))) => Some(s),
            _ => None,
        }
    }
}

/// Per-entity-type tally of change records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatistics {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub total: usize,
}

impl ChangeStatistics {
    /// Tallies records by kind
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a ChangeRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            match record.kind {
                ChangeKind::Added => stats.added += 1,
                ChangeKind::Removed => stats.removed += 1,
                ChangeKind::Updated => stats.updated += 1,
            }
            stats.total += 1;
        }
        stats
    }
}

/// Reference to one side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRef {
    pub id: Option<SnapshotId>,
    pub version_tag: String,
    pub content_hash: String,
}

impl From<&VersionSnapshot> for SnapshotRef {
    fn from(snapshot: &VersionSnapshot) -> Self {
        Self {
            id: snapshot.id,
            version_tag: snapshot.version_tag.clone(),
            content_hash: snapshot.content_hash.clone(),
        }
    }
}

/// One comparison between an old and a new snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub service_name: String,
    pub old: SnapshotRef,
    pub new: SnapshotRef,
    /// Endpoint records first, then schema records
    pub records: Vec<ChangeRecord>,
    pub endpoint_statistics: ChangeStatistics,
    pub schema_statistics: ChangeStatistics,
    /// Serialized summary document (the persisted audit artifact)
    pub summary_json: String,
}

impl DiffResult {
    /// Returns true if any record was produced
    pub fn has_changes(&self) -> bool {
        !self.records.is_empty()
    }

    /// Records for one entity type
    pub fn records_for(&self, entity_type: EntityType) -> impl Iterator<Item = &ChangeRecord> {
        self.records
            .iter()
            .filter(move |r| r.entity_type == entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_identity_and_label() {
        let endpoint = EndpointDescriptor::new("/users/{id}", "get");
        assert_eq!(endpoint.identity_key(), "/users/{id}:get");
        assert_eq!(endpoint.display_label(), "GET /users/{id}");
    }

    #[test]
    fn test_change_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Updated).unwrap(),
            "\"UPDATED\""
        );
        assert_eq!(
            serde_json::to_string(&EntityType::Schema).unwrap(),
            "\"SCHEMA\""
        );
        assert_eq!(ChangeKind::Removed.to_string(), "REMOVED");
    }

    #[test]
    fn test_field_change_null_side() {
        let change = FieldChange {
            before: None,
            after: Some("{\"type\":\"string\"}".to_string()),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert!(json["before"].is_null());
        assert_eq!(json["after"], "{\"type\":\"string\"}");
    }

    #[test]
    fn test_statistics_tally() {
        let a = ChangeRecord::added(
            EntityType::Endpoint,
            "/a:get".to_string(),
            Descriptor::Endpoint(EndpointDescriptor::new("/a", "get")),
        );
        let r = ChangeRecord::removed(
            EntityType::Endpoint,
            "/b:get".to_string(),
            Descriptor::Endpoint(EndpointDescriptor::new("/b", "get")),
        );
        let stats = ChangeStatistics::tally([&a, &r, &a]);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn test_record_descriptor_accessors() {
        let record = ChangeRecord::removed(
            EntityType::Endpoint,
            "/b:delete".to_string(),
            Descriptor::Endpoint(EndpointDescriptor::new("/b", "delete")),
        );
        assert_eq!(record.endpoint().map(|e| e.path.as_str()), Some("/b"));
        assert!(record.schema().is_none());
    }

    #[test]
    fn test_descriptor_untagged_round_trip() {
        let descriptor = Descriptor::Schema(SchemaDescriptor::new("User", "{}"));
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"rawSchema\""));
        let back: Descriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }
}
