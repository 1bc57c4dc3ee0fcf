//! Error types for taskdeck
//!
//! The persistence layer wraps every filesystem-level failure at its own
//! boundary: callers see `Safety`, `Corruption`, or `NotFound`, never a raw
//! OS error from the write path. In-memory invariant violations are
//! programming errors and panic instead of being represented here.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for taskdeck operations
#[derive(Error, Debug)]
pub enum Error {
    /// Write-time failure (disk full, permission denied, unserializable
    /// payload). The target file is guaranteed untouched.
    #[error("Save failed for {path}: {source}")]
    Safety {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The primary file and every backup slot failed to parse. The corrupt
    /// files are left on disk for manual inspection.
    #[error("Cannot load {path}: primary file and {attempts} backup slot(s) are unreadable")]
    Corruption { path: PathBuf, attempts: usize },

    /// No data file on disk. First run; callers are expected to start from
    /// an empty collection rather than treat this as an error.
    #[error("No data file at {0}")]
    NotFound(PathBuf),

    /// Retained for backward compatibility with persisted error output.
    /// Writes are serialized by an in-process mutex and never time out
    /// waiting for a file lock, so no code path constructs this variant.
    #[error("Lock acquisition timed out: {0}")]
    LockTimeout(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// True for the "first run" condition: the primary file is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type alias for taskdeck operations
pub type Result<T> = std::result::Result<T, Error>;
