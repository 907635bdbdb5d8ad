//! Sync instance records and lifecycle decisions

mod controller;
mod record;

pub use controller::{Action, InstanceController, config_fingerprint};
pub use record::InstanceRecord;
