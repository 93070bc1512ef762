//! The option store: loads persisted options into modules and writes changes back.
//!
//! # Persistence model
//!
//! [`OptionStore::set`] updates memory, queues the storage patch and fires
//! the option's change callback without waiting for the patch. Patches are
//! written in issue order by a single detached writer task, which keeps
//! draining the queue after the store is dropped. Patches issued before a
//! Tokio runtime exists stay queued until the store is next used inside one.
//! A crash before a patch completes leaves storage behind memory.
//! [`OptionStore::flush`] waits for queued patches, and
//! [`OptionStore::set_durable`] awaits its patch before touching memory.
//!
//! # Memoization
//!
//! Each module is initialized at most once per store. The obsolete loader
//! keeps one `OnceCell` per module so concurrent first calls share a single
//! storage read.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::env::StoreConfig;
use crate::error::{OptionsError, StorageOp};
use crate::initializer::Initializer;
use crate::key::{normalize_option_key, storage_key};
use crate::module::{Module, ModuleId, OpaqueModuleId, OptionHandle, OptionValue};
use crate::registry::ModuleRegistry;
use crate::storage::{partial_record, StorageAdapter, StoredRecord};
use crate::view::ObsoleteView;
use crate::writer::PatchWriter;
use crate::Result;

/// Synchronizes module options with a [`StorageAdapter`].
pub struct OptionStore {
    storage: Arc<dyn StorageAdapter>,
    registry: Arc<dyn ModuleRegistry>,
    namespace: String,
    initializer: Initializer,
    /// Stored snapshot per module, fixed at the first obsolete load.
    obsolete: Mutex<HashMap<ModuleId, Arc<OnceCell<StoredRecord>>>>,
    writer: PatchWriter,
}

impl OptionStore {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        registry: Arc<dyn ModuleRegistry>,
        config: StoreConfig,
    ) -> Self {
        Self {
            writer: PatchWriter::new(Arc::clone(&storage)),
            storage,
            registry,
            namespace: config.namespace,
            initializer: Initializer::new(),
            obsolete: Mutex::new(HashMap::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn storage_key(&self, module: &Module) -> String {
        storage_key(&self.namespace, module.id())
    }

    pub fn is_initialized(&self, id: &ModuleId) -> bool {
        self.initializer.is_initialized(id)
    }

    /// Applies defaults and `stored` to `module`, once per module id.
    pub fn initialize(&self, module: &Module, stored: Option<&StoredRecord>) -> bool {
        self.initializer.initialize(module, stored)
    }

    /// Loads stored options for every registered module with a single batch read.
    pub async fn load_module_options(&self) -> Result<()> {
        let modules = self.registry.all();
        let keys: Vec<String> = modules.iter().map(|m| self.storage_key(m)).collect();

        let mut records = self.storage.batch(&keys).await.map_err(|e| {
            OptionsError::storage(StorageOp::Batch, format!("{}.*", self.namespace), e)
        })?;

        let mut applied = 0usize;
        let mut found = 0usize;
        for (module, key) in modules.iter().zip(&keys) {
            let stored = records.remove(key);
            found += usize::from(stored.is_some());
            if self.initialize(module, stored.as_ref()) {
                applied += 1;
            }
        }
        info!(
            modules = modules.len(),
            initialized = applied,
            stored = found,
            "loaded module options"
        );
        Ok(())
    }

    /// Returns the module's options together with stored keys it no longer declares.
    ///
    /// The first call per module reads storage and initializes the module;
    /// later calls rebuild the view from live state and the first snapshot.
    pub async fn load_obsolete(&self, id: &OpaqueModuleId) -> Result<ObsoleteView> {
        let module = self.resolve(id)?;
        let cell = {
            let mut obsolete = self.obsolete.lock();
            Arc::clone(obsolete.entry(module.id().clone()).or_default())
        };

        let snapshot = cell
            .get_or_try_init(|| async {
                let key = self.storage_key(&module);
                let stored = self
                    .storage
                    .get(&key)
                    .await
                    .map_err(|e| OptionsError::storage(StorageOp::Get, key.as_str(), e))?;
                self.initialize(&module, stored.as_ref());
                Ok::<_, OptionsError>(stored.unwrap_or_default())
            })
            .await?;

        Ok(ObsoleteView::build(snapshot, module.options()))
    }

    /// Sets an option and queues its patch for the background writer.
    ///
    /// Keys with a `_<digits>` instance suffix resolve to their base option.
    /// Returns `Ok(false)` when the module does not declare the key; nothing
    /// is written and no callback fires.
    pub fn set(&self, id: &OpaqueModuleId, option_key: &str, value: OptionValue) -> Result<bool> {
        let module = self.resolve(id)?;
        let key = normalize_option_key(option_key);
        let Some(handle) = lookup(&module, &key) else {
            return Ok(false);
        };

        let partial = partial_record(&key, value.clone());
        self.writer
            .patch_after(self.storage_key(&module), partial, || handle.set_value(value));
        handle.notify_change();
        Ok(true)
    }

    /// Like [`set`](Self::set) but waits for storage to acknowledge the write.
    ///
    /// Memory is only updated, and the callback only fired, once the patch
    /// succeeded; a failed patch is returned and memory is left as it was.
    pub async fn set_durable(
        &self,
        id: &OpaqueModuleId,
        option_key: &str,
        value: OptionValue,
    ) -> Result<bool> {
        let module = self.resolve(id)?;
        let key = normalize_option_key(option_key);
        let Some(handle) = lookup(&module, &key) else {
            return Ok(false);
        };

        let storage_key = self.storage_key(&module);
        self.writer
            .patch_acknowledged(storage_key.clone(), partial_record(&key, value.clone()))
            .await
            .map_err(|e| OptionsError::storage(StorageOp::Patch, storage_key, e))?;

        handle.set_value(value);
        handle.notify_change();
        Ok(true)
    }

    /// Waits for every patch queued so far. Write failures are logged, not returned.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Number of patches queued but not yet written.
    pub fn pending_writes(&self) -> usize {
        self.writer.queued()
    }

    fn resolve(&self, id: &OpaqueModuleId) -> Result<Arc<Module>> {
        self.registry
            .get(id)
            .ok_or_else(|| OptionsError::UnknownModule(id.clone()))
    }
}

fn lookup<'m>(module: &'m Module, key: &str) -> Option<&'m OptionHandle> {
    let handle = module.option(key);
    if handle.is_none() {
        warn!(module = %module.id(), option = %key, "could not find option");
    } else {
        debug!(module = %module.id(), option = %key, "setting option");
    }
    handle
}
