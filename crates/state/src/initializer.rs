//! Merges stored options into a module's live options.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::debug;

use crate::module::{Module, ModuleId};
use crate::storage::{stored_value, StoredRecord};

/// Copies defaults and stored values into a module's options.
///
/// Runs at most once per process for a given module; see [`Initializer`].
pub fn apply_stored_options(module: &Module, stored: Option<&StoredRecord>) {
    let options = module.options();
    if options.is_empty() {
        return;
    }

    for handle in options.handles() {
        handle.capture_default();
    }

    let Some(stored) = stored else {
        return;
    };

    for (key, entry) in stored {
        let Some(value) = stored_value(entry) else {
            debug!(module = %module.id(), option = %key, "skipping corrupt stored option");
            continue;
        };
        let Some(handle) = options.get(key) else {
            debug!(module = %module.id(), option = %key, "skipping obsolete stored option");
            continue;
        };
        handle.set_value(value.clone());
    }
}

/// Memo of modules whose options have been initialized.
#[derive(Debug, Default)]
pub struct Initializer {
    done: Mutex<HashSet<ModuleId>>,
}

impl Initializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes `module` unless it already was. Returns whether this call
    /// applied the options; later calls ignore `stored`.
    pub fn initialize(&self, module: &Module, stored: Option<&StoredRecord>) -> bool {
        // Held across the merge so a concurrent caller never sees a half-applied module.
        let mut done = self.done.lock();
        if done.contains(module.id()) {
            debug!(module = %module.id(), "options already initialized");
            return false;
        }
        apply_stored_options(module, stored);
        done.insert(module.id().clone());
        true
    }

    pub fn is_initialized(&self, id: &ModuleId) -> bool {
        self.done.lock().contains(id)
    }
}
