//! Module registry seam.
//!
//! The host application owns its modules; the store only needs to enumerate
//! them in order and resolve opaque ids.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::OptionsError;
use crate::module::{Module, OpaqueModuleId};

/// Source of module descriptors.
pub trait ModuleRegistry: Send + Sync {
    /// All registered modules, in registry order.
    fn all(&self) -> Vec<Arc<Module>>;

    /// Resolves an opaque id. `None` means the id is unknown.
    fn get(&self, id: &OpaqueModuleId) -> Option<Arc<Module>>;
}

/// Fixed registry whose opaque ids are the module ids.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    modules: Vec<Arc<Module>>,
    /// Index into `modules` by module id.
    index: HashMap<String, usize>,
}

impl StaticRegistry {
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Result<Self, OptionsError> {
        let mut registry = Self::default();
        for module in modules {
            let key = module.id().0.clone();
            if registry.index.contains_key(&key) {
                return Err(OptionsError::DuplicateModule(module.id().clone()));
            }
            registry.index.insert(key, registry.modules.len());
            registry.modules.push(Arc::new(module));
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleRegistry for StaticRegistry {
    fn all(&self) -> Vec<Arc<Module>> {
        self.modules.clone()
    }

    fn get(&self, id: &OpaqueModuleId) -> Option<Arc<Module>> {
        self.index
            .get(&id.0)
            .map(|&i| Arc::clone(&self.modules[i]))
    }
}
