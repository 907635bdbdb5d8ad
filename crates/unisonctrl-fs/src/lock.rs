//! Advisory lock serializing reconciliation passes
//!
//! Separate `unisonctrl` invocations share the on-disk instance records.
//! Without serialization two overlapping passes could both decide an
//! instance is missing and spawn it twice, so each pass holds an exclusive
//! `fs2` lock on a well-known file for its whole duration.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// Guard for an exclusive pass lock; released when dropped.
#[derive(Debug)]
pub struct PassLock {
    file: File,
    path: PathBuf,
}

impl PassLock {
    /// Block until the lock at `path` is acquired.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        tracing::debug!(lock = %path.display(), "Waiting for pass lock");
        file.lock_exclusive().map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;
        tracing::debug!(lock = %path.display(), "Pass lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Acquire the lock without waiting.
    ///
    /// Fails with [`Error::LockHeld`] when another holder exists.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                file,
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::LockHeld {
                path: path.to_path_buf(),
            }),
            Err(_) => Err(Error::LockFailed {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(lock = %self.path.display(), error = %e, "Failed to release pass lock");
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::io(path, e))
}
