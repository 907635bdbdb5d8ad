//! Outcomes of passes, dry runs and status queries

use serde::Serialize;

use crate::instance::{Action, InstanceRecord};

/// One action that could not be carried out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub syncname: String,
    /// `create`, `restart` or `kill`
    pub action: String,
    pub error: String,
}

/// What a reconciliation pass (or a stop) did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Records dropped because their process was gone or its pid reused
    pub healed: Vec<String>,
    pub created: Vec<String>,
    pub restarted: Vec<String>,
    pub killed: Vec<String>,
    pub unchanged: Vec<String>,
    pub failures: Vec<ActionFailure>,
}

impl PassReport {
    /// True when every attempted action succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of instances whose process changed
    pub fn changes(&self) -> usize {
        self.created.len() + self.restarted.len() + self.killed.len()
    }

    pub(crate) fn fail(&mut self, action: &Action, error: &crate::Error) {
        self.failures.push(ActionFailure {
            syncname: action.syncname().to_string(),
            action: action.kind().to_string(),
            error: error.to_string(),
        });
    }
}

/// Dry-run result: what a pass would do right now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub healed: Vec<String>,
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.healed.is_empty() && self.actions.is_empty()
    }
}

/// A stored record together with the liveness of its process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    #[serde(flatten)]
    pub record: InstanceRecord,
    pub running: bool,
}
