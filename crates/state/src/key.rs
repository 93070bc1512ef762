//! Storage key derivation and option key normalization.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::module::ModuleId;

/// Namespace prefix for every stored option record.
///
/// Part of the persisted layout: a different prefix orphans all records
/// written under the old one.
pub const DEFAULT_NAMESPACE: &str = "RESoptions";

static INSTANCE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_[0-9]+$").expect("Invalid regex pattern"));

/// Returns the storage key for a module: `"<namespace>.<moduleID>"`.
pub fn storage_key(namespace: &str, id: &ModuleId) -> String {
    format!("{namespace}.{id}")
}

/// Strips a trailing `_<digits>` instance suffix, so `foo_3` resolves to `foo`.
pub fn normalize_option_key(key: &str) -> Cow<'_, str> {
    INSTANCE_SUFFIX.replace(key, "")
}
