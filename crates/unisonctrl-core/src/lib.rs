//! Reconciliation engine for unisonctrl
//!
//! Keeps a set of long-running unison processes matched to a rule-driven
//! partitioning of a sync root:
//!
//! - **Rules**: ordered selectors that split the root's directories into
//!   named, disjoint batches
//! - **Instance lifecycle**: fingerprint-based diffing of desired batches
//!   against the recorded instances
//! - **Supervision**: spawning detached processes and stopping them with
//!   SIGTERM, then SIGKILL
//! - **Reconciliation**: one locked pass tying the above together
//!
//! # Architecture
//!
//! ```text
//!                 unisonctrl (CLI)
//!                        |
//!                 unisonctrl-core
//!   config -> rules -> instance -> reconcile
//!                            store / supervisor
//!                        |
//!                  unisonctrl-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use unisonctrl_core::{Config, LockMode, ReconciliationLoop};
//!
//! let config = Config::load("/etc/unisonctrl/config.toml".as_ref())?;
//! let report = ReconciliationLoop::open(&config, LockMode::Wait)?.run_pass()?;
//! println!("{} instances changed", report.changes());
//! ```

pub mod config;
pub mod error;
pub mod instance;
pub mod reconcile;
pub mod rules;
pub mod store;
pub mod supervisor;

pub use config::{Config, ConfigFile, DEFAULT_CONFIG_PATH, TerminationPolicy};
pub use error::{Error, Result};
pub use instance::{Action, InstanceController, InstanceRecord, config_fingerprint};
pub use reconcile::{
    ActionFailure, InstanceStatus, LockMode, PassReport, Plan, ReconciliationLoop,
    acquire_pass_lock,
};
pub use rules::{DesiredAssignment, RuleEngine, SortMethod, SyncRule};
pub use store::{InstanceStateStore, JsonFileStore};
pub use supervisor::{ActualProcesses, OsSupervisor, SpawnRequest, SpawnedProcess, Supervisor};
