//! The key-value storage seam.
//!
//! The backend itself lives outside this crate. Records are kept as raw JSON
//! entries so that obsolete or malformed entries survive a round trip.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::module::OptionValue;

/// A persisted option record: option key -> `{"value": ...}`.
pub type StoredRecord = BTreeMap<String, Value>;

#[cfg(test)]
use mockall::automock;

/// Opaque key-value store holding one [`StoredRecord`] per module.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Reads the record stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>>;

    /// Reads several records in one round trip. Keys with no record are omitted.
    async fn batch(&self, keys: &[String]) -> Result<HashMap<String, StoredRecord>>;

    /// Merges `partial` into the record under `key`, creating it if absent.
    async fn patch(&self, key: &str, partial: StoredRecord) -> Result<()>;
}

/// Returns the value carried by a stored entry.
///
/// JSON-falsy entries and entries without a `value` field count as corrupt.
pub fn stored_value(entry: &Value) -> Option<&Value> {
    if is_falsy(entry) {
        return None;
    }
    entry.as_object()?.get("value")
}

fn is_falsy(entry: &Value) -> bool {
    match entry {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Builds the single-key record written by a set: `{ key: {"value": value} }`.
pub fn partial_record(key: &str, value: OptionValue) -> StoredRecord {
    StoredRecord::from([(key.to_string(), json!({ "value": value }))])
}
