//! Shared test utilities for modopts crates.
//!
//! Provides a recording in-memory [`StorageAdapter`], fixture builders for
//! modules and stored records, and guards for process-global state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use modopts_state::{Module, ModuleOption, StorageAdapter, StoredRecord};
use serde_json::{json, Value};

/// Serialize tests that mutate process-global state (env vars, cwd, etc).
pub fn env_guard() -> MutexGuard<'static, ()> {
    static TEST_SERIAL: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// RAII guard for environment variables - restores original value on drop.
pub struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

/// Set (or with `None`, unset) an environment variable until the guard drops.
pub fn set_env_var(key: &'static str, value: Option<&str>) -> EnvVarGuard {
    let previous = std::env::var(key).ok();
    match value {
        Some(val) => std::env::set_var(key, val),
        None => std::env::remove_var(key),
    }
    EnvVarGuard { key, previous }
}

/// Install a test-writer tracing subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Builds a stored record from `(key, value)` pairs, wrapping each as `{"value": v}`.
pub fn record(entries: &[(&str, Value)]) -> StoredRecord {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), json!({ "value": v })))
        .collect()
}

/// Builds a module declaring each `(key, initial value)` pair.
pub fn module(id: &str, options: &[(&str, Value)]) -> Module {
    options.iter().fold(Module::new(id), |m, (k, v)| {
        m.with_option(*k, ModuleOption::new(v.clone()))
    })
}

/// One recorded `patch` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchCall {
    pub key: String,
    pub partial: StoredRecord,
}

/// In-memory storage that records every call.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: parking_lot::Mutex<HashMap<String, StoredRecord>>,
    patches: parking_lot::Mutex<Vec<PatchCall>>,
    batches: parking_lot::Mutex<Vec<Vec<String>>>,
    gets: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record under `key`.
    pub fn with_record(self, key: &str, record: StoredRecord) -> Self {
        self.records.lock().insert(key.to_string(), record);
        self
    }

    /// Makes every `get` and `batch` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every `patch` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn record(&self, key: &str) -> Option<StoredRecord> {
        self.records.lock().get(key).cloned()
    }

    pub fn patches(&self) -> Vec<PatchCall> {
        self.patches.lock().clone()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("read failed for {key}");
        }
        Ok(self.records.lock().get(key).cloned())
    }

    async fn batch(&self, keys: &[String]) -> Result<HashMap<String, StoredRecord>> {
        self.batches.lock().push(keys.to_vec());
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("batch read failed for {} keys", keys.len());
        }
        let records = self.records.lock();
        Ok(keys
            .iter()
            .filter_map(|k| records.get(k).map(|r| (k.clone(), r.clone())))
            .collect())
    }

    async fn patch(&self, key: &str, partial: StoredRecord) -> Result<()> {
        self.patches.lock().push(PatchCall {
            key: key.to_string(),
            partial: partial.clone(),
        });
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write failed for {key}");
        }
        self.records
            .lock()
            .entry(key.to_string())
            .or_default()
            .extend(partial);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_env_var_sets_and_restores() {
        let _g = env_guard();
        const KEY: &str = "MODOPTS_TEST_UTILS_TEST_VAR";
        std::env::remove_var(KEY);

        {
            let _guard = set_env_var(KEY, Some("test_value"));
            assert_eq!(std::env::var(KEY).ok(), Some("test_value".to_string()));
        }
        assert!(std::env::var(KEY).is_err());
    }

    #[tokio::test]
    async fn patch_merges_into_existing_record() {
        let storage = MemoryStorage::new().with_record(
            "RESoptions.M",
            record(&[("a", json!(1)), ("b", json!(2))]),
        );

        storage
            .patch("RESoptions.M", record(&[("b", json!(3))]))
            .await
            .unwrap();

        let stored = storage.record("RESoptions.M").unwrap();
        assert_eq!(stored["a"], json!({"value": 1}));
        assert_eq!(stored["b"], json!({"value": 3}));
        assert_eq!(storage.patches().len(), 1);
    }

    #[tokio::test]
    async fn batch_omits_missing_keys() {
        let storage = MemoryStorage::new().with_record("k1", record(&[("a", json!(1))]));
        let found = storage
            .batch(&["k1".to_string(), "k2".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert!(found.contains_key("k1"));
        assert_eq!(storage.batches(), vec![vec!["k1".to_string(), "k2".to_string()]]);
    }

    #[tokio::test]
    async fn failing_reads_report_errors() {
        let storage = MemoryStorage::new();
        storage.fail_reads(true);
        assert!(storage.get("k").await.is_err());
        assert_eq!(storage.get_count(), 1);
    }
}
