//! Desired-vs-recorded diffing
//!
//! The controller never touches processes or the store. It only turns a
//! desired partitioning and the current records into an ordered action
//! list; the reconciliation loop carries the actions out.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use unisonctrl_fs::{Digest, relative_to};

use super::record::InstanceRecord;
use crate::rules::DesiredAssignment;

/// Fingerprint of an instance's effective configuration.
///
/// Covers exactly the syncname, the ordered directory list and the ordered
/// global options; reordering either list changes the result.
pub fn config_fingerprint(syncname: &str, dirs: &[String], global_options: &[String]) -> String {
    Digest::new()
        .field(syncname)
        .list(dirs)
        .list(global_options)
        .finish()
}

/// One lifecycle decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    /// Desired instance with no record
    Create {
        syncname: String,
        dirs: Vec<String>,
        fingerprint: String,
    },
    /// Desired instance whose record has a different fingerprint
    Restart {
        previous: InstanceRecord,
        dirs: Vec<String>,
        fingerprint: String,
    },
    /// Recorded instance that is no longer desired
    Kill { record: InstanceRecord },
}

impl Action {
    pub fn syncname(&self) -> &str {
        match self {
            Self::Create { syncname, .. } => syncname,
            Self::Restart { previous, .. } => &previous.syncname,
            Self::Kill { record } => &record.syncname,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Restart { .. } => "restart",
            Self::Kill { .. } => "kill",
        }
    }
}

/// Diffs desired assignments against stored records
#[derive(Debug, Clone, Copy)]
pub struct InstanceController<'a> {
    local_root: &'a Path,
    global_options: &'a [String],
}

impl<'a> InstanceController<'a> {
    pub fn new(local_root: &'a Path, global_options: &'a [String]) -> Self {
        Self {
            local_root,
            global_options,
        }
    }

    /// Directories of a desired assignment, relative to the local root
    pub fn relative_dirs(&self, dirs: &[std::path::PathBuf]) -> Vec<String> {
        dirs.iter()
            .map(|dir| {
                relative_to(dir, self.local_root)
                    .unwrap_or_else(|| dir.to_string_lossy().into_owned())
            })
            .collect()
    }

    /// Compute the actions converging `current` onto `desired`.
    ///
    /// Creates and restarts come first (in syncname order), kills of
    /// decommissioned instances last.
    pub fn reconcile(
        &self,
        desired: &DesiredAssignment,
        current: &BTreeMap<String, InstanceRecord>,
    ) -> Vec<Action> {
        let mut actions = Vec::new();

        for (syncname, dirs) in desired {
            let dirs = self.relative_dirs(dirs);
            let fingerprint = config_fingerprint(syncname, &dirs, self.global_options);

            match current.get(syncname) {
                None => {
                    tracing::debug!(%syncname, "Instance missing, will create");
                    actions.push(Action::Create {
                        syncname: syncname.clone(),
                        dirs,
                        fingerprint,
                    });
                }
                Some(record) if record.config_fingerprint == fingerprint => {
                    tracing::debug!(%syncname, pid = record.pid, "Instance up to date");
                }
                Some(record) => {
                    tracing::debug!(
                        %syncname,
                        old = %record.config_fingerprint,
                        new = %fingerprint,
                        "Fingerprint changed, will restart"
                    );
                    actions.push(Action::Restart {
                        previous: record.clone(),
                        dirs,
                        fingerprint,
                    });
                }
            }
        }

        for (syncname, record) in current {
            if !desired.contains_key(syncname) {
                tracing::debug!(%syncname, pid = record.pid, "Instance no longer desired, will kill");
                actions.push(Action::Kill {
                    record: record.clone(),
                });
            }
        }

        actions
    }
}
