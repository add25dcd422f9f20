//! Manifest-extension document with defensive normalization.

use serde_json::{Map, Value, json};

/// The manifest-extension document. `annotations` and `audit` are
/// guaranteed present with the right container types after
/// normalization; unknown top-level keys are preserved untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    root: Map<String, Value>,
}

impl Default for ManifestDocument {
    fn default() -> Self {
        let mut root = Map::new();
        root.insert("annotations".to_string(), json!({}));
        root.insert("audit".to_string(), json!([]));
        Self { root }
    }
}

impl ManifestDocument {
    /// Build a document from an arbitrary parsed JSON value. A
    /// non-object root is discarded; wrong-typed `annotations`/`audit`
    /// fields are replaced with empty containers. Malformed shape is
    /// never a validation failure.
    pub fn from_value(value: Value) -> Self {
        let root = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut doc = Self { root };
        doc.normalize();
        doc
    }

    /// Ensure `annotations` is an object and `audit` is an array.
    pub fn normalize(&mut self) {
        if !self
            .root
            .get("annotations")
            .is_some_and(Value::is_object)
        {
            self.root.insert("annotations".to_string(), json!({}));
        }
        if !self.root.get("audit").is_some_and(Value::is_array) {
            self.root.insert("audit".to_string(), json!([]));
        }
    }

    /// The annotations map.
    pub fn annotations(&self) -> &Map<String, Value> {
        self.root
            .get("annotations")
            .and_then(Value::as_object)
            .expect("normalized document always has an annotations object")
    }

    /// Set one annotation, replacing any prior value under that key.
    pub fn set_annotation(&mut self, key: &str, value: Value) {
        if let Some(Value::Object(annotations)) = self.root.get_mut("annotations") {
            annotations.insert(key.to_string(), value);
        }
    }

    /// The audit history, oldest first.
    pub fn audit(&self) -> &Vec<Value> {
        self.root
            .get("audit")
            .and_then(Value::as_array)
            .expect("normalized document always has an audit array")
    }

    /// Append one audit entry. The audit list only ever grows.
    pub fn push_audit(&mut self, entry: Value) {
        if let Some(Value::Array(audit)) = self.root.get_mut("audit") {
            audit.push(entry);
        }
    }

    /// Replace the top-level `promotion` block wholesale.
    pub fn set_promotion(&mut self, record: Value) {
        self.root.insert("promotion".to_string(), record);
    }

    /// The current `promotion` block, if any.
    pub fn promotion(&self) -> Option<&Value> {
        self.root.get("promotion")
    }

    /// The document as a JSON value for serialization.
    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_empty_containers() {
        let doc = ManifestDocument::default();
        assert!(doc.annotations().is_empty());
        assert!(doc.audit().is_empty());
        assert!(doc.promotion().is_none());
    }

    #[test]
    fn non_object_root_is_discarded() {
        let doc = ManifestDocument::from_value(json!([1, 2, 3]));
        assert!(doc.annotations().is_empty());
        assert!(doc.audit().is_empty());
    }

    #[test]
    fn wrong_typed_fields_are_replaced() {
        let doc = ManifestDocument::from_value(json!({
            "annotations": 5,
            "audit": "nope",
        }));
        assert!(doc.annotations().is_empty());
        assert!(doc.audit().is_empty());
    }

    #[test]
    fn unknown_top_level_keys_survive() {
        let doc = ManifestDocument::from_value(json!({
            "annotations": {"a": 1},
            "audit": [],
            "promotion": {"status": "verified"},
            "custom": true,
        }));
        assert_eq!(doc.annotations()["a"], json!(1));
        assert_eq!(doc.promotion().unwrap()["status"], json!("verified"));
        assert_eq!(doc.to_value()["custom"], json!(true));
    }

    #[test]
    fn annotation_is_last_writer_wins() {
        let mut doc = ManifestDocument::default();
        doc.set_annotation("canary", json!({"status": "old"}));
        doc.set_annotation("canary", json!({"status": "new"}));
        assert_eq!(doc.annotations()["canary"]["status"], json!("new"));
    }

    #[test]
    fn audit_only_grows() {
        let mut doc = ManifestDocument::default();
        doc.push_audit(json!({"action": "rollback", "reason": "a"}));
        doc.push_audit(json!({"action": "rollback", "reason": "b"}));
        assert_eq!(doc.audit().len(), 2);
        assert_eq!(doc.audit()[0]["reason"], json!("a"));
    }

    #[test]
    fn promotion_is_replaced_wholesale() {
        let mut doc = ManifestDocument::default();
        doc.set_promotion(json!({"status": "verified", "signers": ["k1"]}));
        doc.set_promotion(json!({"status": "verified", "signers": ["k2"]}));
        assert_eq!(doc.promotion().unwrap()["signers"], json!(["k2"]));
    }
}
