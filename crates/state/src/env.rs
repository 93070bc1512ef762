//! Store configuration from the environment and the settings file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::OptionsError;
use crate::key::DEFAULT_NAMESPACE;

/// Returns the user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home));
    }
    dirs::home_dir()
}

/// Returns the namespace override from `MODOPTS_NAMESPACE`, if set and non-empty.
pub fn env_namespace() -> Option<String> {
    std::env::var("MODOPTS_NAMESPACE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Returns the path of the settings file.
///
/// `MODOPTS_SETTINGS` wins; otherwise `~/.config/modopts/settings.json`.
pub fn settings_file() -> Option<PathBuf> {
    if let Ok(custom) = std::env::var("MODOPTS_SETTINGS") {
        return Some(PathBuf::from(custom));
    }
    home_dir().map(|h| h.join(".config/modopts/settings.json"))
}

/// Settings parsed from the JSON settings file.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Loads settings from `path`. A missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings, OptionsError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = fs::read_to_string(path).map_err(|e| OptionsError::Settings {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    serde_json::from_str(&text).map_err(|e| OptionsError::Settings {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Prefix of every storage key.
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Resolves the configuration: `MODOPTS_NAMESPACE`, then the settings
    /// file, then [`DEFAULT_NAMESPACE`].
    pub fn load() -> Result<Self, OptionsError> {
        let settings = match settings_file() {
            Some(path) => load_settings_from(&path)?,
            None => Settings::default(),
        };
        let namespace = env_namespace()
            .or(settings.namespace.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        if namespace != DEFAULT_NAMESPACE {
            info!(namespace = %namespace, "using non-default option namespace");
        }
        Ok(Self { namespace })
    }
}
