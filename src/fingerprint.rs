//! Content fingerprints and the change gate.
//!
//! The fingerprint is the lowercase hex SHA-256 of the canonical form of the
//! tracked sub-document. It is the only thing consulted to decide whether a
//! freshly fetched document warrants extraction and diffing at all.

use crate::canonical::Canonicalizer;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Outcome of resolving a document against the last known fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Lowercase hex SHA-256 of `canonical`
    pub hash: String,
    /// Canonical string form of the tracked sub-document
    pub canonical: String,
    /// True iff `hash` differs from the last known hash (or there was none)
    pub changed: bool,
}

/// Calculates the lowercase hex SHA-256 of a canonical string
pub fn hash_canonical(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes the tracked section of documents and compares against a lineage's
/// latest hash
#[derive(Debug, Clone)]
pub struct FingerprintResolver {
    canonicalizer: Canonicalizer,
    tracked_section: String,
}

impl FingerprintResolver {
    /// Creates a resolver tracking the given top-level section
    pub fn new(canonicalizer: Canonicalizer, tracked_section: impl Into<String>) -> Self {
        Self {
            canonicalizer,
            tracked_section: tracked_section.into(),
        }
    }

    /// Returns the tracked sub-document, or `null` when the document lacks it
    pub fn tracked<'a>(&self, document: &'a Value) -> &'a Value {
        document.get(&self.tracked_section).unwrap_or(&Value::Null)
    }

    /// Fingerprints a document without comparing it to anything
    pub fn fingerprint(&self, document: &Value) -> (String, String) {
        let canonical = self.canonicalizer.to_canonical_string(self.tracked(document));
        let hash = hash_canonical(&canonical);
        (hash, canonical)
    }

    /// Fingerprints a document and decides whether it changed
    ///
    /// `last_known_hash == None` means the lineage has no prior observation,
    /// which always counts as changed.
    pub fn resolve(&self, document: &Value, last_known_hash: Option<&str>) -> Fingerprint {
        let (hash, canonical) = self.fingerprint(document);
        let changed = last_known_hash != Some(hash.as_str());
        Fingerprint {
            hash,
            canonical,
            changed,
        }
    }
}
