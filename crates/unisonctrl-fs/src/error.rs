//! Error types for unisonctrl-fs

use std::path::PathBuf;

/// Result type for unisonctrl-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Filesystem-level failures, always naming the path involved
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file exists but is not valid in its format
    #[error("Cannot parse {format} configuration {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported configuration format '{extension}' (expected toml, json, yaml or yml)")]
    UnsupportedFormat { extension: String },

    /// Locking failed for a reason other than contention
    #[error("Cannot lock {path}")]
    LockFailed { path: PathBuf },

    /// Non-blocking lock attempt found another holder
    #[error("{path} is locked by another process")]
    LockHeld { path: PathBuf },
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
