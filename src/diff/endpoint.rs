//! Endpoint diffing keyed by `path:httpMethod`

use crate::types::{ChangeRecord, ChangedFields, Descriptor, EndpointDescriptor, EntityType, FieldChange};
use std::collections::HashMap;

/// Tracked endpoint fields, in the order they are compared
pub const TRACKED_ENDPOINT_FIELDS: [&str; 5] = [
    "summary",
    "operationId",
    "deprecated",
    "requestSchemaRef",
    "responseSchemaRef",
];

/// Classifies every endpoint identity key as added, removed or updated
///
/// Added records follow the order of `new`; removed and updated records follow
/// the order of `old`. Identity keys are assumed unique within each side.
pub fn diff_endpoints(old: &[EndpointDescriptor], new: &[EndpointDescriptor]) -> Vec<ChangeRecord> {
    let old_map: HashMap<String, &EndpointDescriptor> =
        old.iter().map(|e| (e.identity_key(), e)).collect();
    let new_map: HashMap<String, &EndpointDescriptor> =
        new.iter().map(|e| (e.identity_key(), e)).collect();

    let mut records = Vec::new();

    for endpoint in new {
        let key = endpoint.identity_key();
        if !old_map.contains_key(&key) {
            records.push(ChangeRecord::added(
                EntityType::Endpoint,
                key,
                Descriptor::Endpoint(endpoint.clone()),
            ));
        }
    }

    for endpoint in old {
        let key = endpoint.identity_key();
        if !new_map.contains_key(&key) {
            records.push(ChangeRecord::removed(
                EntityType::Endpoint,
                key,
                Descriptor::Endpoint(endpoint.clone()),
            ));
        }
    }

    for endpoint in old {
        let key = endpoint.identity_key();
        let Some(after) = new_map.get(&key) else {
            continue;
        };

        let changes = endpoint_field_changes(endpoint, after);
        if !changes.is_empty() {
            records.push(ChangeRecord::updated(
                EntityType::Endpoint,
                key,
                Descriptor::Endpoint(endpoint.clone()),
                Descriptor::Endpoint((*after).clone()),
                changes,
            ));
        }
    }

    records
}

/// Compares the tracked fields of two endpoints with exact equality
pub fn endpoint_field_changes(
    before: &EndpointDescriptor,
    after: &EndpointDescriptor,
) -> ChangedFields {
    let mut changes = ChangedFields::new();

    let mut compare = |field: &str, b: String, a: String| {
        if b != a {
            changes.insert(field.to_string(), FieldChange::new(b, a));
        }
    };

    compare("summary", before.summary.clone(), after.summary.clone());
    compare(
        "operationId",
        before.operation_id.clone(),
        after.operation_id.clone(),
    );
    compare(
        "deprecated",
        before.deprecated.to_string(),
        after.deprecated.to_string(),
    );
    compare(
        "requestSchemaRef",
        before.request_schema_ref.clone(),
        after.request_schema_ref.clone(),
    );
    compare(
        "responseSchemaRef",
        before.response_schema_ref.clone(),
        after.response_schema_ref.clone(),
    );

    changes
}
