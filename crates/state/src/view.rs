//! Obsolete-preserving view of a module's options.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::module::{OptionHandle, OptionMap, OptionValue};
use crate::storage::{stored_value, StoredRecord};

/// One entry of an [`ObsoleteView`].
#[derive(Debug, Clone)]
pub enum ViewEntry {
    /// A declared option, shared with the module's live mapping.
    Live(OptionHandle),
    /// A stored entry the module no longer declares, kept verbatim.
    Obsolete(Value),
}

impl ViewEntry {
    pub fn value(&self) -> Option<OptionValue> {
        match self {
            ViewEntry::Live(handle) => Some(handle.value()),
            ViewEntry::Obsolete(raw) => stored_value(raw).cloned(),
        }
    }
}

/// Every stored key of a module overlaid with its live options.
///
/// The container is independent of the module: dropping or reshaping it has
/// no effect on the live mapping. Live entries share their option with the
/// module, so `Live(h).set_value(..)` is visible everywhere.
#[derive(Debug, Clone, Default)]
pub struct ObsoleteView {
    entries: BTreeMap<String, ViewEntry>,
}

impl ObsoleteView {
    /// Copies the stored record, then overlays the live options.
    pub fn build(stored: &StoredRecord, live: &OptionMap) -> Self {
        let mut entries: BTreeMap<String, ViewEntry> = stored
            .iter()
            .map(|(key, raw)| (key.clone(), ViewEntry::Obsolete(raw.clone())))
            .collect();

        for (key, handle) in live.iter() {
            entries.insert(key.to_string(), ViewEntry::Live(handle.clone()));
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&ViewEntry> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &str) -> Option<OptionValue> {
        self.entries.get(key)?.value()
    }

    pub fn is_obsolete(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(ViewEntry::Obsolete(_)))
    }

    pub fn obsolete_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(k, e)| match e {
            ViewEntry::Obsolete(_) => Some(k.as_str()),
            ViewEntry::Live(_) => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ViewEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exports the view in stored-record shape. Obsolete entries are copied
    /// as stored, live ones are written from their current value.
    pub fn to_record(&self) -> StoredRecord {
        self.entries
            .iter()
            .map(|(key, entry)| {
                let raw = match entry {
                    ViewEntry::Live(handle) => json!({ "value": handle.value() }),
                    ViewEntry::Obsolete(raw) => raw.clone(),
                };
                (key.clone(), raw)
            })
            .collect()
    }
}
