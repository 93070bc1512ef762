//! Persisted options for pluggable modules.
//!
//! This crate keeps the options declared by a host application's modules in
//! sync with a key-value store:
//! - Loading stored values into every module at startup with one batch read.
//! - Exposing a module's full stored surface, including keys it no longer declares.
//! - Writing single-option changes back as partial patches and notifying listeners.
//!
//! The storage backend and the module registry belong to the host; they are
//! consumed through [`StorageAdapter`] and [`ModuleRegistry`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use modopts_state::{
//!     Module, ModuleOption, OpaqueModuleId, OptionStore, StaticRegistry, StorageAdapter,
//!     StoreConfig,
//! };
//!
//! # async fn run(storage: Arc<dyn StorageAdapter>) -> modopts_state::Result<()> {
//! let registry = StaticRegistry::new([
//!     Module::new("nightMode").with_option("enabled", ModuleOption::new(false)),
//! ])?;
//! let store = OptionStore::new(storage, Arc::new(registry), StoreConfig::load()?);
//!
//! store.load_module_options().await?;
//! store.set(&OpaqueModuleId::from("nightMode"), "enabled", true.into())?;
//! store.flush().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod env;
pub mod error;
pub mod initializer;
pub mod key;
pub mod module;
pub mod registry;
pub mod storage;
pub mod store;
pub mod view;
mod writer;

pub type Result<T> = std::result::Result<T, OptionsError>;

pub use env::{load_settings_from, settings_file, Settings, StoreConfig};
pub use error::{OptionsError, StorageOp};
pub use initializer::{apply_stored_options, Initializer};
pub use key::{normalize_option_key, storage_key, DEFAULT_NAMESPACE};
pub use module::{
    Module, ModuleId, ModuleOption, OnChange, OpaqueModuleId, OptionHandle, OptionMap,
    OptionValue,
};
pub use registry::{ModuleRegistry, StaticRegistry};
pub use storage::{partial_record, stored_value, StorageAdapter, StoredRecord};
pub use store::OptionStore;
pub use view::{ObsoleteView, ViewEntry};
