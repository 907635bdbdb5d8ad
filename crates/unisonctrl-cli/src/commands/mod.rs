//! Command implementations for unisonctrl-cli
//!
//! Every command returns whether it finished without per-instance failures;
//! `main` turns `false` into exit status 2.

pub mod list;
pub mod reconcile;
pub mod validate;

pub use list::run_list;
pub use reconcile::{run_plan, run_reconcile, run_stop};
pub use validate::run_validate;

use serde::Serialize;

use crate::error::Result;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
