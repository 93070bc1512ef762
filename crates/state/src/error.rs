//! Error types for the option store.

use std::path::PathBuf;

use crate::module::{ModuleId, OpaqueModuleId};

/// Errors surfaced by the option store.
///
/// Unknown option keys are deliberately absent: `OptionStore::set` reports
/// them as `Ok(false)` with a warning instead.
#[derive(thiserror::Error, Debug)]
pub enum OptionsError {
    #[error("unknown module: {0}")]
    UnknownModule(OpaqueModuleId),

    #[error("module registered twice: {0}")]
    DuplicateModule(ModuleId),

    #[error("storage {op} failed for '{key}': {source}")]
    Storage {
        op: StorageOp,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read settings from {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Storage operation that produced an [`OptionsError::Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Get,
    Batch,
    Patch,
}

impl std::fmt::Display for StorageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StorageOp::Get => "get",
            StorageOp::Batch => "batch",
            StorageOp::Patch => "patch",
        };
        f.write_str(s)
    }
}

impl OptionsError {
    pub(crate) fn storage(op: StorageOp, key: impl Into<String>, source: anyhow::Error) -> Self {
        OptionsError::Storage {
            op,
            key: key.into(),
            source,
        }
    }
}
