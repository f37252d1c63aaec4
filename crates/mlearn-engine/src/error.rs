//! Error types for the learning engine.
//!
//! Storage errors are surfaced to callers as `StoreError`; the hook entry
//! points in the `mlearn` binary log them and carry on.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Store Error Type
// ============================================================================

/// Errors from the session store, pattern repository and configuration.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed on a specific path.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Session state could not be serialized.
    #[error("Failed to serialize session state: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file is not valid TOML for `LearningConfig`.
    #[error("Invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No home directory to derive default locations from.
    #[error("Could not determine home directory")]
    NoHomeDir,
}

impl StoreError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, StoreError>;
