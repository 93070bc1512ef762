//! Module descriptors and the options they declare.
//!
//! A [`Module`] owns a fixed set of option keys, each backed by an
//! [`OptionHandle`]. Handles are shared references: cloning one does not copy
//! the option, so every holder observes the same `value`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Option values are opaque JSON; this crate never validates them.
pub type OptionValue = serde_json::Value;

/// Zero-argument change callback. Reads the new value from the option itself.
pub type OnChange = Arc<dyn Fn() + Send + Sync>;

/// Unique module identifier, also the suffix of the module's storage key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub String);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        ModuleId(s.to_string())
    }
}

/// Identifier handed to callers outside the crate. Only a
/// [`ModuleRegistry`](crate::ModuleRegistry) knows how to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpaqueModuleId(pub String);

impl fmt::Display for OpaqueModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OpaqueModuleId {
    fn from(s: &str) -> Self {
        OpaqueModuleId(s.to_string())
    }
}

impl From<&ModuleId> for OpaqueModuleId {
    fn from(id: &ModuleId) -> Self {
        OpaqueModuleId(id.0.clone())
    }
}

/// A single configurable setting.
pub struct ModuleOption {
    pub value: OptionValue,
    /// Captured from `value` the first time the module is initialized.
    pub default: Option<OptionValue>,
    pub on_change: Option<OnChange>,
}

impl ModuleOption {
    pub fn new(value: impl Into<OptionValue>) -> Self {
        Self {
            value: value.into(),
            default: None,
            on_change: None,
        }
    }

    pub fn on_change(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ModuleOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleOption")
            .field("value", &self.value)
            .field("default", &self.default)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// Shared handle to a [`ModuleOption`].
#[derive(Clone, Debug)]
pub struct OptionHandle(Arc<RwLock<ModuleOption>>);

impl OptionHandle {
    pub fn new(option: ModuleOption) -> Self {
        Self(Arc::new(RwLock::new(option)))
    }

    pub fn value(&self) -> OptionValue {
        self.0.read().value.clone()
    }

    pub fn default_value(&self) -> Option<OptionValue> {
        self.0.read().default.clone()
    }

    pub fn set_value(&self, value: OptionValue) {
        self.0.write().value = value;
    }

    /// Records the current value as the default.
    pub fn capture_default(&self) {
        let mut guard = self.0.write();
        guard.default = Some(guard.value.clone());
    }

    /// Runs the change callback, if any. The lock is released first so the
    /// callback can read `value()`.
    pub fn notify_change(&self) {
        let callback = self.0.read().on_change.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// True when both handles point at the same option.
    pub fn ptr_eq(&self, other: &OptionHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The declared options of a module, keyed by option key.
#[derive(Clone, Debug, Default)]
pub struct OptionMap {
    entries: BTreeMap<String, OptionHandle>,
}

impl OptionMap {
    pub fn get(&self, key: &str) -> Option<&OptionHandle> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionHandle)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn handles(&self) -> impl Iterator<Item = &OptionHandle> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A pluggable unit of the host application.
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    options: OptionMap,
}

impl Module {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ModuleId(id.into()),
            options: OptionMap::default(),
        }
    }

    /// Declares an option. Declaring the same key twice replaces the first.
    pub fn with_option(mut self, key: impl Into<String>, option: ModuleOption) -> Self {
        self.options
            .entries
            .insert(key.into(), OptionHandle::new(option));
        self
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&OptionHandle> {
        self.options.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builder_declares_options_in_key_order() {
        let module = Module::new("nightMode")
            .with_option("zeta", ModuleOption::new(1))
            .with_option("alpha", ModuleOption::new("a"));

        assert_eq!(module.id().to_string(), "nightMode");
        let keys: Vec<_> = module.options().keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
        assert_eq!(module.option("alpha").unwrap().value(), json!("a"));
        assert!(module.option("missing").is_none());
    }

    #[test]
    fn default_is_unset_until_captured() {
        let handle = OptionHandle::new(ModuleOption::new(json!(true)));
        assert_eq!(handle.default_value(), None);

        handle.capture_default();
        handle.set_value(json!(false));

        assert_eq!(handle.default_value(), Some(json!(true)));
        assert_eq!(handle.value(), json!(false));
    }

    #[test]
    fn cloned_handles_share_the_option() {
        let handle = OptionHandle::new(ModuleOption::new(1));
        let other = handle.clone();
        other.set_value(json!(2));

        assert!(handle.ptr_eq(&other));
        assert_eq!(handle.value(), json!(2));
    }

    #[test]
    fn notify_change_lets_callback_read_value() {
        let seen = Arc::new(RwLock::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        // The callback needs the handle it belongs to; wire it up after creation.
        let slot: Arc<RwLock<Option<OptionHandle>>> = Arc::new(RwLock::new(None));
        let option = {
            let seen = Arc::clone(&seen);
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            ModuleOption::new("red").on_change(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(handle) = slot.read().as_ref() {
                    *seen.write() = Some(handle.value());
                }
            })
        };
        let handle = OptionHandle::new(option);
        *slot.write() = Some(handle.clone());

        handle.set_value(json!("blue"));
        handle.notify_change();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.read(), Some(json!("blue")));
    }

    #[test]
    fn debug_hides_callback_body() {
        let option = ModuleOption::new(3).on_change(|| {});
        let rendered = format!("{option:?}");
        assert!(rendered.contains("on_change: true"), "{rendered}");
    }
}
