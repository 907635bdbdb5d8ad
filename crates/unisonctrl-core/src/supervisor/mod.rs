//! Launching, finding and stopping sync processes
//!
//! [`Supervisor`] is the seam between the reconciliation loop and the OS.
//! [`OsSupervisor`] is the real implementation; tests drive the loop with a
//! scripted one.

mod os;
mod request;

use std::collections::{BTreeMap, BTreeSet};

pub use os::OsSupervisor;
pub use request::SpawnRequest;

use crate::Result;

/// A freshly launched process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedProcess {
    pub pid: u32,
    /// OS start time in seconds since the epoch, when it could be read
    pub started_at: Option<u64>,
}

/// Running sync processes: pid -> start time (seconds since the epoch)
pub type ActualProcesses = BTreeMap<u32, u64>;

/// Process operations the reconciliation loop depends on
pub trait Supervisor {
    /// Launch a detached process without waiting for it.
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess>;

    /// Running, non-zombie processes of the sync binary. Never fails; an
    /// empty map means none were found.
    fn list_actual(&self) -> ActualProcesses;

    /// Stop `pid`, escalating from SIGTERM to SIGKILL.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Unauthorized`] when `pid` is not in `known_pids`;
    ///   no signal is sent.
    /// - [`crate::Error::Unkillable`] when the process survives both windows.
    fn terminate(&self, pid: u32, known_pids: &BTreeSet<u32>) -> Result<()>;
}
