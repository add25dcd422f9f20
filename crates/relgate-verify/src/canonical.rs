//! Canonical JSON for signing payloads.
//!
//! Objects are recursively key-sorted and serialized compactly, so the
//! bytes under the signature are independent of sidecar key order and
//! whitespace.

use serde_json::{Map, Value};

/// Serialize a JSON value canonically: object keys sorted ascending at
/// every depth, compact separators.
pub fn canonical_json(value: &Value) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&sort_keys(value))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"z":2,"y":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"y":3,"z":2},"b":1}"#).unwrap();
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn output_is_compact_and_sorted() {
        let value = json!({"b": [1, 2], "a": "x"});
        let bytes = canonical_json(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":"x","b":[1,2]}"#);
    }

    #[test]
    fn arrays_keep_their_order() {
        let value = json!([3, 1, 2]);
        let bytes = canonical_json(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "[3,1,2]");
    }
}
