//! Schema diffing keyed by schema name, with property-level detail.

use crate::canonical::Canonicalizer;
use crate::types::{ChangeRecord, ChangedFields, Descriptor, EntityType, FieldChange, SchemaDescriptor};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Top-level keywords with dedicated comparison rules
const STRUCTURAL_KEYWORDS: [&str; 3] = ["type", "required", "properties"];

/// Prefix of per-property change keys, e.g. `property.email`
pub const PROPERTY_PREFIX: &str = "property.";

/// Synthetic field used when a schema cannot be compared structurally
pub const RAW_SCHEMA_FIELD: &str = "rawSchema";

/// Schema diff engine
#[derive(Debug, Clone)]
pub struct SchemaDiffer {
    canonicalizer: Canonicalizer,
}

impl SchemaDiffer {
    /// Creates a new schema differ
    pub fn new(canonicalizer: Canonicalizer) -> Self {
        Self { canonicalizer }
    }

    /// Classifies every schema name as added, removed or updated
    ///
    /// Ordering follows the same rules as endpoint diffing: added records in
    /// `new` order, removed and updated records in `old` order.
    pub fn diff(&self, old: &[SchemaDescriptor], new: &[SchemaDescriptor]) -> Vec<ChangeRecord> {
        let old_map: HashMap<&str, &SchemaDescriptor> =
            old.iter().map(|s| (s.name.as_str(), s)).collect();
        let new_map: HashMap<&str, &SchemaDescriptor> =
            new.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut records = Vec::new();

        for schema in new {
            if !old_map.contains_key(schema.name.as_str()) {
                records.push(ChangeRecord::added(
                    EntityType::Schema,
                    schema.name.clone(),
                    Descriptor::Schema(schema.clone()),
                ));
            }
        }

        for schema in old {
            if !new_map.contains_key(schema.name.as_str()) {
                records.push(ChangeRecord::removed(
                    EntityType::Schema,
                    schema.name.clone(),
                    Descriptor::Schema(schema.clone()),
                ));
            }
        }

        for schema in old {
            let Some(after) = new_map.get(schema.name.as_str()) else {
                continue;
            };

            let changes = self.schema_changes(schema, after);
            if !changes.is_empty() {
                records.push(ChangeRecord::updated(
                    EntityType::Schema,
                    schema.name.clone(),
                    Descriptor::Schema(schema.clone()),
                    Descriptor::Schema((*after).clone()),
                    changes,
                ));
            }
        }

        records
    }

    /// Field-level changes between two versions of the same schema
    ///
    /// Empty when the canonical documents are byte-identical. Schemas that
    /// cannot be parsed, or whose shape is not comparable, degrade to a single
    /// `rawSchema` change holding both raw strings.
    pub fn schema_changes(&self, before: &SchemaDescriptor, after: &SchemaDescriptor) -> ChangedFields {
        let parsed = (
            serde_json::from_str::<Value>(&before.raw_schema),
            serde_json::from_str::<Value>(&after.raw_schema),
        );

        let (old_doc, new_doc) = match parsed {
            (Ok(old_doc), Ok(new_doc)) => (old_doc, new_doc),
            _ => {
                tracing::warn!(schema = %before.name, "schema is not valid JSON, comparing raw strings");
                return raw_changes(before, after);
            }
        };

        let old_canonical = self.canonicalizer.to_canonical_string(&old_doc);
        let new_canonical = self.canonicalizer.to_canonical_string(&new_doc);
        if old_canonical == new_canonical {
            return ChangedFields::new();
        }

        match (SchemaShape::of(&old_doc), SchemaShape::of(&new_doc)) {
            (Some(old_shape), Some(new_shape)) => self.shape_changes(&old_shape, &new_shape),
            _ => raw_changes(before, after),
        }
    }

    fn shape_changes(&self, old: &SchemaShape<'_>, new: &SchemaShape<'_>) -> ChangedFields {
        let mut changes = ChangedFields::new();
        let render = |v: &Value| self.scalar_text(v);

        let old_type = old.root.get("type").map(render);
        let new_type = new.root.get("type").map(render);
        if old_type != new_type {
            changes.insert(
                "type".to_string(),
                FieldChange {
                    before: old_type,
                    after: new_type,
                },
            );
        }

        if old.required != new.required {
            changes.insert(
                "required".to_string(),
                FieldChange::new(
                    self.canonicalizer.to_canonical_string(&Value::Array(old.required.clone())),
                    self.canonicalizer.to_canonical_string(&Value::Array(new.required.clone())),
                ),
            );
        }

        let names: BTreeSet<&String> = old.properties.keys().chain(new.properties.keys()).collect();
        for name in names {
            let before = old.properties.get(name.as_str()).map(|v| self.canonicalizer.to_canonical_string(v));
            let after = new.properties.get(name.as_str()).map(|v| self.canonicalizer.to_canonical_string(v));
            if before != after {
                changes.insert(format!("{PROPERTY_PREFIX}{name}"), FieldChange { before, after });
            }
        }

        // Any other top-level keyword (description, enum, items, ...) is
        // compared on its canonical form so no change goes unrecorded.
        let keywords: BTreeSet<&String> = old
            .root
            .keys()
            .chain(new.root.keys())
            .filter(|k| !STRUCTURAL_KEYWORDS.contains(&k.as_str()))
            .collect();
        for keyword in keywords {
            let before = old.root.get(keyword.as_str()).map(render);
            let after = new.root.get(keyword.as_str()).map(render);
            if before != after {
                changes.insert(keyword.clone(), FieldChange { before, after });
            }
        }

        changes
    }

    /// Plain text for strings, canonical JSON for everything else
    fn scalar_text(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => self.canonicalizer.to_canonical_string(other),
        }
    }
}

/// The parts of a schema object that are compared field by field
struct SchemaShape<'a> {
    root: &'a Map<String, Value>,
    required: Vec<Value>,
    properties: Map<String, Value>,
}

impl<'a> SchemaShape<'a> {
    /// Returns `None` on a structural mismatch: a non-object root, a
    /// non-array `required`, or a non-object `properties`
    fn of(doc: &'a Value) -> Option<Self> {
        let root = doc.as_object()?;

        let required = match root.get("required") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return None,
        };

        let properties = match root.get("properties") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(props)) => props.clone(),
            Some(_) => return None,
        };

        Some(Self {
            root,
            required,
            properties,
        })
    }
}

fn raw_changes(before: &SchemaDescriptor, after: &SchemaDescriptor) -> ChangedFields {
    let mut changes = ChangedFields::new();
    if before.raw_schema != after.raw_schema {
        changes.insert(
            RAW_SCHEMA_FIELD.to_string(),
            FieldChange::new(before.raw_schema.clone(), after.raw_schema.clone()),
        );
    }
    changes
}
