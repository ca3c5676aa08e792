//! Canonical form of document trees.
//!
//! Two logically identical documents always canonicalize to the same tree and
//! serialize to the same bytes, regardless of the key order they arrived in.
//! Object keys are emitted in ascending byte order, arrays keep their element
//! order, and scalars pass through untouched.

use serde_json::{Map, Value};

/// Canonicalizer shared by every component that needs the canonical form
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonicalizer;

impl Canonicalizer {
    /// Creates a new canonicalizer
    pub fn new() -> Self {
        Self
    }

    /// Recursively normalizes a tree
    ///
    /// # Examples
    ///
    /// ```
    /// use specwatch::canonical::Canonicalizer;
    ///
    /// let canon = Canonicalizer::new();
    /// let a = serde_json::json!({"b": 1, "a": [{"y": 2, "x": 1}]});
    /// assert_eq!(
    ///     canon.to_canonical_string(&a),
    ///     r#"{"a":[{"x":1,"y":2}],"b":1}"#
    /// );
    /// ```
    pub fn canonicalize(&self, node: &Value) -> Value {
        match node {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

                // Inserting in sorted order keeps the output ordered whether the
                // map is backed by a BTreeMap or an insertion-ordered map.
                let mut sorted = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    sorted.insert(key.clone(), self.canonicalize(value));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.canonicalize(item)).collect())
            }
            scalar => scalar.clone(),
        }
    }

    /// Canonicalizes a tree and serializes it compactly
    ///
    /// Falls back to the tree's default string rendering if serialization
    /// fails; the fallback is logged because it is lossy.
    pub fn to_canonical_string(&self, node: &Value) -> String {
        let canonical = self.canonicalize(node);
        match serde_json::to_string(&canonical) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "canonical serialization failed, using raw rendering");
                node.to_string()
            }
        }
    }

    /// Parses a raw JSON string and returns its canonical serialization
    pub fn canonicalize_str(&self, raw: &str) -> crate::Result<String> {
        let node: Value = serde_json::from_str(raw)
            .map_err(|e| crate::Error::invalid_document(e.to_string()))?;
        Ok(self.to_canonical_string(&node))
    }

    /// Like [`Canonicalizer::canonicalize_str`], but degrades to the raw input
    /// when it cannot be parsed
    pub fn canonicalize_str_lossy(&self, raw: &str) -> String {
        match self.canonicalize_str(raw) {
            Ok(canonical) => canonical,
            Err(e) => {
                tracing::warn!(error = %e, "document is not valid JSON, keeping raw form");
                raw.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_sorts_nested_keys() {
        let canon = Canonicalizer::new();
        let doc = json!({
            "zeta": {"b": true, "a": null},
            "alpha": [{"k2": "v", "k1": 1.5}, 3, "x"]
        });

        assert_eq!(
            canon.to_canonical_string(&doc),
            r#"{"alpha":[{"k1":1.5,"k2":"v"},3,"x"],"zeta":{"a":null,"b":true}}"#
        );
    }

    #[test]
    fn test_array_order_is_preserved() {
        let canon = Canonicalizer::new();
        let a = canon.to_canonical_string(&json!(["b", "a"]));
        let b = canon.to_canonical_string(&json!(["a", "b"]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_scalars_unchanged() {
        let canon = Canonicalizer::new();
        for value in [json!(null), json!(1), json!("s"), json!(false), json!(2.5)] {
            assert_eq!(canon.canonicalize(&value), value);
        }
    }

    #[test]
    fn test_key_order_uses_bytes() {
        let canon = Canonicalizer::new();
        let doc = json!({"b": 1, "B": 2, "_": 3, "a": 4});
        assert_eq!(
            canon.to_canonical_string(&doc),
            r#"{"B":2,"_":3,"a":4,"b":1}"#
        );
    }

    #[test]
    fn test_canonicalize_str() {
        let canon = Canonicalizer::new();
        let out = canon.canonicalize_str(r#"{ "b" : 1, "a" : 2 }"#).unwrap();
        assert_eq!(out, r#"{"a":2,"b":1}"#);
        assert!(canon.canonicalize_str("{not json").is_err());
    }

    #[test]
    fn test_lossy_fallback_keeps_raw() {
        let canon = Canonicalizer::new();
        assert_eq!(canon.canonicalize_str_lossy("{not json"), "{not json");
    }

    #[test]
    fn test_input_order_is_not_output_order() {
        let canon = Canonicalizer::new();
        let mut map = Map::new();
        map.insert("b".to_string(), json!(1));
        map.insert("a".to_string(), json!({"y": 2, "x": 1}));
        let doc = Value::Object(map);

        let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"b":1,"a":{"y":2,"x":1}}"#);

        assert_eq!(canon.to_canonical_string(&doc), r#"{"a":{"x":1,"y":2},"b":1}"#);
        let canonical = canon.canonicalize(&doc);
        let keys: Vec<&str> = canonical.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    fn keys_sorted(node: &Value) -> bool {
        match node {
            Value::Object(map) => {
                map.keys()
                    .zip(map.keys().skip(1))
                    .all(|(a, b)| a.as_bytes() < b.as_bytes())
                    && map.values().all(keys_sorted)
            }
            Value::Array(items) => items.iter().all(keys_sorted),
            _ => true,
        }
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::vec(("[a-zA-Z_]{1,5}", inner), 0..6)
                    .prop_map(|entries| Value::Object(entries.into_iter().collect())),
            ]
        })
    }

    fn reversed_keys(node: &Value) -> Value {
        match node {
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map.iter().rev() {
                    out.insert(k.clone(), reversed_keys(v));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(reversed_keys).collect()),
            other => other.clone(),
        }
    }

    proptest! {
        #[test]
        fn prop_canonicalize_is_idempotent(doc in arb_json()) {
            let canon = Canonicalizer::new();
            let once = canon.canonicalize(&doc);
            let twice = canon.canonicalize(&once);
            prop_assert_eq!(canon.to_canonical_string(&once), canon.to_canonical_string(&twice));
        }

        #[test]
        fn prop_key_order_does_not_matter(doc in arb_json()) {
            let canon = Canonicalizer::new();
            prop_assert_eq!(
                canon.to_canonical_string(&doc),
                canon.to_canonical_string(&reversed_keys(&doc))
            );
        }

        #[test]
        fn prop_canonical_keys_are_sorted(doc in arb_json()) {
            let canon = Canonicalizer::new();
            prop_assert!(keys_sorted(&canon.canonicalize(&reversed_keys(&doc))));

            let reparsed: Value = serde_json::from_str(&canon.to_canonical_string(&doc)).unwrap();
            prop_assert!(keys_sorted(&reparsed));
        }
    }
}
