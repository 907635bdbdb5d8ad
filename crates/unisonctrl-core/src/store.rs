//! Durable storage of instance records
//!
//! [`JsonFileStore`] keeps one `<syncname>.json` file per running instance.
//! The whole directory is read once on open; every mutation is written
//! through immediately, so a crash mid-pass loses at most the action in
//! flight.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use unisonctrl_fs::io::{ensure_dir, read_text, remove_if_exists, write_atomic};

use crate::instance::InstanceRecord;
use crate::{Error, Result};

/// Keyed store of instance records, one per syncname
pub trait InstanceStateStore {
    fn get(&self, syncname: &str) -> Option<&InstanceRecord>;

    /// Insert or replace the record for `record.syncname`.
    fn set(&mut self, record: InstanceRecord) -> Result<()>;

    /// Delete a record, returning it if it existed.
    fn remove(&mut self, syncname: &str) -> Result<Option<InstanceRecord>>;

    /// All records, ordered by syncname
    fn list(&self) -> &BTreeMap<String, InstanceRecord>;

    /// Persist the in-memory view in full.
    fn flush(&mut self) -> Result<()>;
}

/// One JSON file per instance under a single directory
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    records: BTreeMap<String, InstanceRecord>,
}

impl JsonFileStore {
    /// Open the store at `dir`, loading every record file.
    ///
    /// A missing directory is created when `create` is set and an error
    /// otherwise. Files without a `.json` extension are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::StoreCorrupt`] when a record file cannot be decoded or its
    /// name disagrees with the syncname inside it.
    pub fn open(dir: &Path, create: bool) -> Result<Self> {
        ensure_dir(dir, create)?;

        let mut records = BTreeMap::new();
        let entries = std::fs::read_dir(dir).map_err(|e| unisonctrl_fs::Error::io(dir, e))?;

        for entry in entries {
            let path = entry.map_err(|e| unisonctrl_fs::Error::io(dir, e))?.path();

            if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
                tracing::debug!(path = %path.display(), "Ignoring non-record file");
                continue;
            }

            let record = load_record(&path)?;
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if stem != record.syncname {
                return Err(Error::StoreCorrupt {
                    path,
                    message: format!(
                        "file name does not match syncname '{}'",
                        record.syncname
                    ),
                });
            }

            records.insert(record.syncname.clone(), record);
        }

        tracing::debug!(dir = %dir.display(), count = records.len(), "Loaded instance records");
        Ok(Self {
            dir: dir.to_path_buf(),
            records,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, syncname: &str) -> PathBuf {
        self.dir.join(format!("{syncname}.json"))
    }

    fn write_record(&self, record: &InstanceRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)?;
        write_atomic(&self.record_path(&record.syncname), content.as_bytes())?;
        Ok(())
    }
}

fn load_record(path: &Path) -> Result<InstanceRecord> {
    let content = read_text(path)?;
    serde_json::from_str(&content).map_err(|e| Error::StoreCorrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl InstanceStateStore for JsonFileStore {
    fn get(&self, syncname: &str) -> Option<&InstanceRecord> {
        self.records.get(syncname)
    }

    fn set(&mut self, record: InstanceRecord) -> Result<()> {
        self.write_record(&record)?;
        self.records.insert(record.syncname.clone(), record);
        Ok(())
    }

    fn remove(&mut self, syncname: &str) -> Result<Option<InstanceRecord>> {
        remove_if_exists(&self.record_path(syncname))?;
        Ok(self.records.remove(syncname))
    }

    fn list(&self) -> &BTreeMap<String, InstanceRecord> {
        &self.records
    }

    fn flush(&mut self) -> Result<()> {
        for record in self.records.values() {
            self.write_record(record)?;
        }
        Ok(())
    }
}
