//! Validate command implementation

use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use unisonctrl_core::Config;

use super::print_json;
use crate::error::Result;

#[derive(Serialize)]
struct Validation<'a> {
    path: &'a Path,
    rules: Vec<&'a str>,
    warnings: Vec<String>,
}

/// Report on an already loaded (and therefore valid) configuration
pub fn run_validate(path: &Path, config: &Config, json: bool) -> Result<bool> {
    let validation = Validation {
        path,
        rules: config.rules.iter().map(|r| r.syncname.as_str()).collect(),
        warnings: config.warnings(),
    };

    if json {
        print_json(&validation)?;
        return Ok(true);
    }

    println!(
        "{} {} ({} rules)",
        "Configuration OK:".green().bold(),
        path.display(),
        validation.rules.len()
    );
    println!("{}:   {}", "Sync root".dimmed(), config.local_root.display());
    println!("{}:      {}", "Remote".dimmed(), config.remote_root_url());
    println!("{}:      {}", "Binary".dimmed(), config.unison_path.display());
    for warning in &validation.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
    Ok(true)
}
