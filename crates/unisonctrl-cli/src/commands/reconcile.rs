//! reconcile, plan and stop

use colored::Colorize;
use unisonctrl_core::{Action, Config, LockMode, PassReport, Plan, ReconciliationLoop};

use super::print_json;
use crate::error::Result;

fn lock_mode(no_wait: bool) -> LockMode {
    if no_wait { LockMode::NoWait } else { LockMode::Wait }
}

/// Run one reconciliation pass
pub fn run_reconcile(config: &Config, no_wait: bool, json: bool) -> Result<bool> {
    let mut pass = ReconciliationLoop::open(config, lock_mode(no_wait))?;
    let report = pass.run_pass()?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(report.is_clean())
}

/// Stop every recorded instance
pub fn run_stop(config: &Config, no_wait: bool, json: bool) -> Result<bool> {
    let mut pass = ReconciliationLoop::open(config, lock_mode(no_wait))?;
    let report = pass.stop_all()?;

    if json {
        print_json(&report)?;
    } else if report.killed.is_empty() && report.failures.is_empty() {
        println!("{}", "No sync instances running".dimmed());
    } else {
        print_report(&report);
    }
    Ok(report.is_clean())
}

/// Show what a pass would do
pub fn run_plan(config: &Config, json: bool) -> Result<bool> {
    let pass = ReconciliationLoop::open(config, LockMode::Wait)?;
    let plan = pass.plan()?;

    if json {
        print_json(&plan)?;
    } else {
        print_plan(&plan);
    }
    Ok(true)
}

fn print_report(report: &PassReport) {
    for name in &report.healed {
        println!("{} {} {}", "!".yellow(), name, "(process gone, record dropped)".dimmed());
    }
    for name in &report.created {
        println!("{} {}", "+".green(), name.cyan());
    }
    for name in &report.restarted {
        println!("{} {}", "~".yellow(), name.cyan());
    }
    for name in &report.killed {
        println!("{} {}", "-".red(), name.cyan());
    }
    for failure in &report.failures {
        println!(
            "{} {} {}: {}",
            "x".red().bold(),
            failure.action,
            failure.syncname.cyan(),
            failure.error.red()
        );
    }

    println!();
    let summary = format!(
        "{} created, {} restarted, {} killed, {} unchanged",
        report.created.len(),
        report.restarted.len(),
        report.killed.len(),
        report.unchanged.len()
    );
    if report.is_clean() {
        println!("{}", summary.green());
    } else {
        println!("{} ({} failed)", summary.yellow(), report.failures.len());
    }
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "Nothing to do; all instances are up to date".green());
        return;
    }

    for name in &plan.healed {
        println!("{} {} {}", "!".yellow(), name, "(process gone, record would be dropped)".dimmed());
    }
    for action in &plan.actions {
        match action {
            Action::Create { syncname, dirs, .. } => {
                println!("{} create {} ({} dirs)", "+".green(), syncname.cyan(), dirs.len());
                print_dirs(dirs);
            }
            Action::Restart { previous, dirs, .. } => {
                println!(
                    "{} restart {} (pid {}, {} dirs)",
                    "~".yellow(),
                    previous.syncname.cyan(),
                    previous.pid,
                    dirs.len()
                );
                print_dirs(dirs);
            }
            Action::Kill { record } => {
                println!("{} kill {} (pid {})", "-".red(), record.syncname.cyan(), record.pid);
            }
        }
    }
}

fn print_dirs(dirs: &[String]) {
    for dir in dirs {
        println!("    {}", dir.dimmed());
    }
}
