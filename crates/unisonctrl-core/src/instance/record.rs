//! Persisted description of one running sync instance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sync instance this system spawned.
///
/// Records are replaced whole on (re)start and removed when the instance
/// is killed or found dead; they are never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub syncname: String,
    /// OS pid of the unison process
    pub pid: u32,
    /// Digest of (syncname, dirs_to_sync, global options)
    pub config_fingerprint: String,
    /// Directories relative to the local root, in sync order
    pub dirs_to_sync: Vec<String>,
    /// Process start time (seconds since epoch) captured at spawn, used to
    /// tell our process apart from a later one that reused the pid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_started_at: Option<u64>,
    #[serde(default = "Utc::now")]
    pub spawned_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// Whether a running process with `start_time` is the one this record
    /// describes. Start times are second-granular, so one second of skew is
    /// tolerated.
    pub fn matches_start_time(&self, start_time: u64) -> bool {
        match self.process_started_at {
            Some(recorded) => recorded.abs_diff(start_time) <= 1,
            None => true,
        }
    }
}
