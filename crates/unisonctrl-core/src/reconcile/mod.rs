//! Reconciliation passes
//!
//! A pass observes the running processes, drops records whose process is
//! gone, partitions the sync root, diffs the result against the records and
//! applies the actions. Passes from separate invocations are serialized by
//! the [`PassLock`] the loop holds for its whole lifetime.

mod guard;
mod report;

use std::collections::BTreeSet;

use unisonctrl_fs::PassLock;
use unisonctrl_fs::io::ensure_dir;

pub use report::{ActionFailure, InstanceStatus, PassReport, Plan};

use self::guard::FlushGuard;
use crate::config::Config;
use crate::instance::{Action, InstanceController, InstanceRecord};
use crate::rules::{DesiredAssignment, RuleEngine};
use crate::store::{InstanceStateStore, JsonFileStore};
use crate::supervisor::{ActualProcesses, OsSupervisor, SpawnRequest, Supervisor};
use crate::{Error, Result};

/// How to behave when another pass holds the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Block until the other pass finishes
    #[default]
    Wait,
    /// Fail with [`Error::PassInProgress`]
    NoWait,
}

/// Acquire the pass lock for `config`.
pub fn acquire_pass_lock(config: &Config, mode: LockMode) -> Result<PassLock> {
    let path = config.lock_path();
    let lock = match mode {
        LockMode::Wait => PassLock::acquire(&path),
        LockMode::NoWait => PassLock::try_acquire(&path),
    };
    lock.map_err(|e| match e {
        unisonctrl_fs::Error::LockHeld { path } => Error::PassInProgress { path },
        other => Error::Fs(other),
    })
}

/// Drives one controller invocation against a store and a supervisor.
pub struct ReconciliationLoop<'c, S, P> {
    config: &'c Config,
    store: S,
    supervisor: P,
    _lock: PassLock,
}

impl<'c> ReconciliationLoop<'c, JsonFileStore, OsSupervisor> {
    /// Prepare the data and log directories, take the pass lock, then load
    /// the instance records.
    pub fn open(config: &'c Config, mode: LockMode) -> Result<Self> {
        let create = config.make_root_directories_if_not_found;
        ensure_dir(&config.data_dir, create)?;
        ensure_dir(&config.unison_log_dir, create)?;

        let lock = acquire_pass_lock(config, mode)?;
        let store = JsonFileStore::open(&config.running_data_dir(), create)?;
        Ok(Self::new(config, lock, store, OsSupervisor::from_config(config)))
    }
}

impl<'c, S, P> ReconciliationLoop<'c, S, P>
where
    S: InstanceStateStore,
    P: Supervisor,
{
    /// Assemble a loop from parts. `lock` must be the pass lock for
    /// `config`, taken before `store` was loaded.
    pub fn new(config: &'c Config, lock: PassLock, store: S, supervisor: P) -> Self {
        Self {
            config,
            store,
            supervisor,
            _lock: lock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one full pass.
    ///
    /// Spawn failures and unkillable processes are collected in the report
    /// and the pass moves on. A missing sync root, an unknown sort method or
    /// an attempt to signal an unrecorded pid abort the pass; records
    /// changed up to that point are kept.
    pub fn run_pass(&mut self) -> Result<PassReport> {
        let mut store = FlushGuard::new(&mut self.store);
        let mut report = PassReport::default();

        let actual = self.supervisor.list_actual();
        report.healed = heal(&mut *store, &actual)?;

        let desired = partition(self.config)?;
        let controller =
            InstanceController::new(&self.config.local_root, &self.config.global_options);
        let actions = controller.reconcile(&desired, store.list());

        let touched: BTreeSet<&str> = actions.iter().map(Action::syncname).collect();
        report.unchanged = desired
            .keys()
            .filter(|name| !touched.contains(name.as_str()))
            .cloned()
            .collect();

        for action in &actions {
            apply(self.config, &self.supervisor, &mut *store, action, &mut report)?;
        }

        tracing::info!(
            healed = report.healed.len(),
            created = report.created.len(),
            restarted = report.restarted.len(),
            killed = report.killed.len(),
            unchanged = report.unchanged.len(),
            failures = report.failures.len(),
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// Compute what [`run_pass`](Self::run_pass) would do without spawning,
    /// signalling or touching the store.
    pub fn plan(&self) -> Result<Plan> {
        let actual = self.supervisor.list_actual();

        let mut current = self.store.list().clone();
        let healed: Vec<String> = current
            .values()
            .filter(|record| !is_running(record, &actual))
            .map(|record| record.syncname.clone())
            .collect();
        for syncname in &healed {
            current.remove(syncname);
        }

        let desired = partition(self.config)?;
        let actions = InstanceController::new(&self.config.local_root, &self.config.global_options)
            .reconcile(&desired, &current);

        Ok(Plan { healed, actions })
    }

    /// Stored records with the liveness of their processes
    pub fn status(&self) -> Vec<InstanceStatus> {
        let actual = self.supervisor.list_actual();
        self.store
            .list()
            .values()
            .map(|record| InstanceStatus {
                running: is_running(record, &actual),
                record: record.clone(),
            })
            .collect()
    }

    /// Terminate every recorded instance and drop its record.
    pub fn stop_all(&mut self) -> Result<PassReport> {
        let mut store = FlushGuard::new(&mut self.store);
        let mut report = PassReport::default();

        let records: Vec<InstanceRecord> = store.list().values().cloned().collect();
        for record in records {
            let action = Action::Kill { record };
            apply(self.config, &self.supervisor, &mut *store, &action, &mut report)?;
        }

        tracing::info!(
            killed = report.killed.len(),
            failures = report.failures.len(),
            "Stopped sync instances"
        );
        Ok(report)
    }
}

fn partition(config: &Config) -> Result<DesiredAssignment> {
    RuleEngine::new(&config.rules).partition(&config.local_root)
}

fn is_running(record: &InstanceRecord, actual: &ActualProcesses) -> bool {
    actual
        .get(&record.pid)
        .is_some_and(|started| record.matches_start_time(*started))
}

/// Drop records whose process is gone or whose pid now belongs to a
/// different process. Returns the affected syncnames.
fn heal<S: InstanceStateStore>(store: &mut S, actual: &ActualProcesses) -> Result<Vec<String>> {
    let stale: Vec<InstanceRecord> = store
        .list()
        .values()
        .filter(|record| !is_running(record, actual))
        .cloned()
        .collect();

    let mut healed = Vec::with_capacity(stale.len());
    for record in stale {
        if actual.contains_key(&record.pid) {
            tracing::warn!(
                syncname = %record.syncname,
                pid = record.pid,
                "Pid was reused by another process, dropping record"
            );
        } else {
            tracing::debug!(
                syncname = %record.syncname,
                pid = record.pid,
                "Instance is no longer running, dropping record"
            );
        }
        store.remove(&record.syncname)?;
        healed.push(record.syncname);
    }
    Ok(healed)
}

fn known_pids<S: InstanceStateStore>(store: &S) -> BTreeSet<u32> {
    store.list().values().map(|record| record.pid).collect()
}

/// Carry out one action. Per-action failures land in `report`; only
/// authorization and store errors are returned.
fn apply<S, P>(
    config: &Config,
    supervisor: &P,
    store: &mut S,
    action: &Action,
    report: &mut PassReport,
) -> Result<()>
where
    S: InstanceStateStore,
    P: Supervisor,
{
    match action {
        Action::Create {
            syncname,
            dirs,
            fingerprint,
        } => {
            if spawn_instance(config, supervisor, store, syncname, dirs, fingerprint, action, report)? {
                tracing::info!(%syncname, dirs = dirs.len(), "Created sync instance");
                report.created.push(syncname.clone());
            }
        }
        Action::Restart {
            previous,
            dirs,
            fingerprint,
        } => {
            if !stop_instance(supervisor, store, previous, action, report)? {
                return Ok(());
            }
            if spawn_instance(
                config,
                supervisor,
                store,
                &previous.syncname,
                dirs,
                fingerprint,
                action,
                report,
            )? {
                tracing::info!(syncname = %previous.syncname, old_pid = previous.pid, "Restarted sync instance");
                report.restarted.push(previous.syncname.clone());
            }
        }
        Action::Kill { record } => {
            if stop_instance(supervisor, store, record, action, report)? {
                tracing::info!(syncname = %record.syncname, pid = record.pid, "Killed sync instance");
                report.killed.push(record.syncname.clone());
            }
        }
    }
    Ok(())
}

/// Terminate the process behind `record` and drop the record. Returns
/// false when the process could not be stopped; the record is kept then.
fn stop_instance<S, P>(
    supervisor: &P,
    store: &mut S,
    record: &InstanceRecord,
    action: &Action,
    report: &mut PassReport,
) -> Result<bool>
where
    S: InstanceStateStore,
    P: Supervisor,
{
    match supervisor.terminate(record.pid, &known_pids(store)) {
        Ok(()) => {
            store.remove(&record.syncname)?;
            Ok(true)
        }
        Err(e @ Error::Unauthorized { .. }) => Err(e),
        Err(e) => {
            tracing::error!(syncname = %record.syncname, pid = record.pid, error = %e, "Failed to stop sync instance");
            report.fail(action, &e);
            Ok(false)
        }
    }
}

/// Spawn an instance and record it. Returns false when the spawn failed;
/// no record is written then.
///
/// A process that cannot be recorded is terminated again before the store
/// error is returned, so no untracked instance outlives the pass.
#[allow(clippy::too_many_arguments)]
fn spawn_instance<S, P>(
    config: &Config,
    supervisor: &P,
    store: &mut S,
    syncname: &str,
    dirs: &[String],
    fingerprint: &str,
    action: &Action,
    report: &mut PassReport,
) -> Result<bool>
where
    S: InstanceStateStore,
    P: Supervisor,
{
    let request = SpawnRequest::for_instance(config, syncname, dirs);
    match supervisor.spawn(&request) {
        Ok(spawned) => {
            let recorded = store.set(InstanceRecord {
                syncname: syncname.to_string(),
                pid: spawned.pid,
                config_fingerprint: fingerprint.to_string(),
                dirs_to_sync: dirs.to_vec(),
                process_started_at: spawned.started_at,
                spawned_at: chrono::Utc::now(),
            });
            if let Err(e) = recorded {
                tracing::error!(%syncname, pid = spawned.pid, error = %e, "Cannot record sync instance, terminating it");
                let just_spawned = BTreeSet::from([spawned.pid]);
                if let Err(kill_err) = supervisor.terminate(spawned.pid, &just_spawned) {
                    tracing::error!(
                        %syncname,
                        pid = spawned.pid,
                        error = %kill_err,
                        "Unrecorded sync instance is still running"
                    );
                }
                return Err(e);
            }
            Ok(true)
        }
        Err(e) => {
            tracing::error!(%syncname, error = %e, "Failed to spawn sync instance");
            report.fail(action, &e);
            Ok(false)
        }
    }
}
