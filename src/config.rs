//! Tracker configuration.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for extraction, fingerprinting and storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Storage key prefix
    pub namespace: String,
    /// Top-level document key whose canonical form is fingerprinted and
    /// whose entries are extracted as endpoints
    pub tracked_section: String,
    /// Prefix stripped from `$ref` values to obtain schema names
    pub schema_ref_prefix: String,
    /// Media type used when resolving request/response schema refs
    pub media_type: String,
    /// Response status whose schema becomes the response schema ref
    pub success_status: String,
    /// Raw documents above this size are rejected (0 disables the check)
    pub max_document_size: usize,
    /// Stored JSON above this size is gzip-compressed (0 disables compression)
    pub compression_threshold: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            namespace: "specwatch".to_string(),
            tracked_section: "paths".to_string(),
            schema_ref_prefix: "#/components/schemas/".to_string(),
            media_type: "application/json".to_string(),
            success_status: "200".to_string(),
            max_document_size: 8 * 1024 * 1024,
            compression_threshold: 100 * 1024,
        }
    }
}

impl TrackerConfig {
    /// Deserializes a configuration from JSON, filling absent fields with defaults
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data)
            .map_err(|e| Error::validation("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::validation("namespace", "namespace is required"));
        }

        if self.tracked_section.is_empty() {
            return Err(Error::validation(
                "tracked_section",
                "tracked section is required",
            ));
        }

        if self.media_type.is_empty() {
            return Err(Error::validation("media_type", "media type is required"));
        }

        if self.success_status.is_empty() {
            return Err(Error::validation(
                "success_status",
                "success status is required",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.tracked_section, "paths");
        assert_eq!(config.schema_ref_prefix, "#/components/schemas/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = TrackerConfig::from_json(br#"{"namespace": "prod", "success_status": "201"}"#)
            .unwrap();
        assert_eq!(config.namespace, "prod");
        assert_eq!(config.success_status, "201");
        assert_eq!(config.media_type, "application/json");
    }

    #[test]
    fn test_from_json_rejects_empty_section() {
        let err = TrackerConfig::from_json(br#"{"tracked_section": ""}"#).unwrap_err();
        assert!(err.to_string().contains("tracked_section"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(TrackerConfig::from_json(b"not json").is_err());
    }
}
