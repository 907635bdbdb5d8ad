//! Error types for unisonctrl-core

use std::path::PathBuf;

/// Result type for unisonctrl-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in unisonctrl-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration parsed but failed schema validation
    #[error("Invalid configuration in {path}:\n  - {}", .violations.join("\n  - "))]
    ConfigInvalid {
        path: PathBuf,
        violations: Vec<String>,
    },

    /// A rule named a sort method the engine does not know; the whole
    /// partitioning for the pass is abandoned
    #[error("Rule '{syncname}' uses unknown sort method '{sort_method}'; partitioning aborted")]
    PartitioningAbort {
        syncname: String,
        sort_method: String,
    },

    /// The local sync root is missing or not a directory
    #[error("Sync root {path} does not exist or is not a directory")]
    SyncRootMissing { path: PathBuf },

    /// Attempt to signal a pid this system never recorded
    #[error("Refusing to signal pid {pid}: it is not a recorded sync instance")]
    Unauthorized { pid: u32 },

    /// The external sync process could not be launched
    #[error("Failed to spawn sync instance '{syncname}': {source}")]
    Spawn {
        syncname: String,
        #[source]
        source: std::io::Error,
    },

    /// The process outlived both the terminate and the kill window
    #[error("Process {pid} is still alive after SIGTERM and SIGKILL")]
    Unkillable { pid: u32 },

    /// Sending a signal failed for a reason other than "no such process"
    #[error("Failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    /// An instance record on disk could not be decoded
    #[error("Corrupt instance record {path}: {message}")]
    StoreCorrupt { path: PathBuf, message: String },

    /// Another invocation currently holds the pass lock
    #[error("Another reconciliation pass is in progress (lock at {path})")]
    PassInProgress { path: PathBuf },

    /// Filesystem error from unisonctrl-fs
    #[error(transparent)]
    Fs(#[from] unisonctrl_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
