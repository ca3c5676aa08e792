//! Document parsing and descriptor extraction.
//!
//! Turns a raw OpenAPI document into the normalized endpoint and schema
//! descriptors the diff engines compare. The diff engines never look at the
//! raw document themselves.

use crate::canonical::Canonicalizer;
use crate::config::TrackerConfig;
use crate::errors::{Error, Result};
use crate::types::{EndpointDescriptor, SchemaDescriptor};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Path item keys that describe operations; everything else (`parameters`,
/// `summary`, `servers`, `x-*`) is path-level metadata
static HTTP_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["get", "put", "post", "delete", "options", "head", "patch", "trace"]
        .into_iter()
        .collect()
});

/// Returns true if a path item key names an HTTP operation
pub fn is_http_method(key: &str) -> bool {
    HTTP_METHODS.contains(key.to_ascii_lowercase().as_str())
}

/// Parses a raw document into a tree
///
/// This is the only parse boundary in the crate: malformed input is reported
/// as [`Error::InvalidDocument`], never silently replaced by an empty tree.
pub fn parse_document(raw: &[u8], max_size: usize) -> Result<Value> {
    if max_size > 0 && raw.len() > max_size {
        return Err(Error::document_too_large(raw.len(), max_size));
    }

    let document: Value =
        serde_json::from_slice(raw).map_err(|e| Error::invalid_document(e.to_string()))?;

    if !document.is_object() {
        return Err(Error::invalid_document("document root must be an object"));
    }

    Ok(document)
}

/// Returns `info.version`, if present
pub fn version_tag(document: &Value) -> Option<String> {
    document
        .get("info")
        .and_then(|info| info.get("version"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

/// Extracts one descriptor per (path, method) pair under the tracked section
///
/// Reads the same section the fingerprint covers (`paths` by default), so an
/// unchanged fingerprint always means unchanged endpoints.
pub fn extract_endpoints(document: &Value, config: &TrackerConfig) -> Vec<EndpointDescriptor> {
    let Some(paths) = document
        .get(&config.tracked_section)
        .and_then(|v| v.as_object())
    else {
        return Vec::new();
    };

    let mut endpoints = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };

        for (method, operation) in item {
            if !is_http_method(method) {
                continue;
            }
            let Some(operation) = operation.as_object() else {
                continue;
            };
            endpoints.push(parse_operation(path, method, operation, config));
        }
    }

    endpoints
}

fn parse_operation(
    path: &str,
    method: &str,
    obj: &Map<String, Value>,
    config: &TrackerConfig,
) -> EndpointDescriptor {
    let request_ref = obj
        .get("requestBody")
        .and_then(|body| schema_ref(body, config));

    let response_ref = obj
        .get("responses")
        .and_then(|responses| responses.get(&config.success_status))
        .and_then(|response| schema_ref(response, config));

    EndpointDescriptor {
        path: path.to_string(),
        http_method: method.to_string(),
        summary: text(obj.get("summary")),
        operation_id: text(obj.get("operationId")),
        deprecated: obj
            .get("deprecated")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        request_schema_ref: request_ref.unwrap_or_default(),
        response_schema_ref: response_ref.unwrap_or_default(),
    }
}

/// Resolves `content.<media_type>.schema.$ref` and strips the component prefix
fn schema_ref(container: &Value, config: &TrackerConfig) -> Option<String> {
    let reference = container
        .get("content")?
        .get(&config.media_type)?
        .get("schema")?
        .get("$ref")?
        .as_str()?;

    Some(
        reference
            .strip_prefix(config.schema_ref_prefix.as_str())
            .unwrap_or(reference)
            .to_string(),
    )
}

fn text(value: Option<&Value>) -> String {
    value
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_default()
}

/// Extracts one descriptor per entry of `components.schemas`
pub fn extract_schemas(document: &Value, canonicalizer: &Canonicalizer) -> Vec<SchemaDescriptor> {
    let Some(schemas) = document
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(|s| s.as_object())
    else {
        return Vec::new();
    };

    schemas
        .iter()
        .map(|(name, schema)| SchemaDescriptor {
            name: name.clone(),
            raw_schema: canonicalizer.to_canonical_string(schema),
            properties: schema
                .get("properties")
                .map(|props| canonicalizer.to_canonical_string(props)),
        })
        .collect()
}
