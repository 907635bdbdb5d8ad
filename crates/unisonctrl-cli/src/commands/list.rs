//! List command implementation

use colored::Colorize;
use unisonctrl_core::{Config, LockMode, ReconciliationLoop};

use super::print_json;
use crate::error::Result;

/// Print the recorded instances and whether their processes are alive
pub fn run_list(config: &Config, json: bool) -> Result<bool> {
    let pass = ReconciliationLoop::open(config, LockMode::Wait)?;
    let statuses = pass.status();

    if json {
        print_json(&statuses)?;
        return Ok(true);
    }

    if statuses.is_empty() {
        println!("{}", "No sync instances recorded".dimmed());
        return Ok(true);
    }

    println!("{}", "Sync Instances".bold());
    println!();
    for status in &statuses {
        let state = if status.running {
            "running".green()
        } else {
            "dead".red()
        };
        println!(
            "  {} pid {} [{}] {} dirs, since {}",
            status.record.syncname.cyan(),
            status.record.pid,
            state,
            status.record.dirs_to_sync.len(),
            status.record.spawned_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(true)
}
