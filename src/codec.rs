use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::StoreError;
use crate::store::KeyValueStore;

pub fn read<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, fallback: T) -> T {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return fallback,
        Err(e) => {
            warn!(key, error = %e, "store read failed, using fallback");
            return fallback;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "malformed stored value, using fallback");
            fallback
        }
    }
}

pub fn read_optional<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    read(store, key, None)
}

pub fn write<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let encoded = encode(key, value)?;
    store.set(key, &encoded)
}

pub fn remove(store: &dyn KeyValueStore, key: &str) -> Result<(), StoreError> {
    store.remove(key)
}

pub fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

/// Splits a stored collection into its elements. Anything that is not a JSON
/// array counts as an empty collection.
pub fn decode_array(key: &str, raw: Option<&str>) -> Vec<Value> {
    let Some(raw) = raw else { return Vec::new() };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Null) => Vec::new(),
        Ok(other) => {
            warn!(key, kind = value_kind(&other), "expected a stored array");
            Vec::new()
        }
        Err(e) => {
            warn!(key, error = %e, "malformed stored collection");
            Vec::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: i64,
        tags: Vec<String>,
    }

    #[test]
    fn test_read_missing_returns_fallback() {
        let store = MemoryStore::new();
        let value: Vec<Entry> = read(&store, "jobs", Vec::new());
        assert!(value.is_empty());
        assert_eq!(read_optional::<Entry>(&store, "currentUser"), None);
    }

    #[test]
    fn test_read_malformed_returns_fallback() {
        let store = MemoryStore::new();
        store.set("jobs", "{oops").unwrap();
        let fallback = vec![Entry { id: 7, tags: vec![] }];
        assert_eq!(read(&store, "jobs", fallback.clone()), fallback);

        // Right JSON, wrong shape.
        store.set("jobs", r#"{"id": "seven"}"#).unwrap();
        assert_eq!(read(&store, "jobs", fallback.clone()), fallback);
    }

    #[test]
    fn test_write_then_read_is_deep_equal() {
        let store = MemoryStore::new();
        let written = vec![
            Entry { id: 1, tags: vec!["rust".into(), "remote".into()] },
            Entry { id: 2, tags: vec![] },
        ];
        write(&store, "jobs", &written).unwrap();
        let read_back: Vec<Entry> = read(&store, "jobs", Vec::new());
        assert_eq!(read_back, written);
    }

    #[test]
    fn test_decode_array() {
        assert!(decode_array("jobs", None).is_empty());
        assert!(decode_array("jobs", Some("null")).is_empty());
        assert!(decode_array("jobs", Some("{\"a\":1}")).is_empty());
        assert!(decode_array("jobs", Some("[1,")).is_empty());
        assert_eq!(decode_array("jobs", Some("[1, {\"a\": 2}]")).len(), 2);
    }
}
