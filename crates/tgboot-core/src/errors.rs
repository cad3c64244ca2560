use std::path::PathBuf;

use crate::domain::PythonVersion;

/// Core error type for the bootstrapper.
///
/// Every variant is fatal to the bootstrap sequence. The precondition variants
/// (`MissingRuntime` .. `IncompleteConfig`) carry enough context to print a
/// human-readable message without further lookups.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("python interpreter `{interpreter}` was not found on PATH")]
    MissingRuntime { interpreter: String },

    #[error("python {found} is too old, {required} or newer is required")]
    UnsupportedVersion {
        found: PythonVersion,
        required: PythonVersion,
    },

    #[error("configuration file not found: {}", .0.display())]
    MissingConfig(PathBuf),

    #[error("configuration file {} is missing required keys: {}", .path.display(), .missing.join(", "))]
    IncompleteConfig { path: PathBuf, missing: Vec<String> },

    #[error("requirements manifest not found: {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("dependency installation failed: {0}")]
    DependencyInstall(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
