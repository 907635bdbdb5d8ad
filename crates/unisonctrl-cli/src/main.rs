//! unisonctrl CLI
//!
//! Runs reconciliation passes for a fleet of unison sync instances.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use unisonctrl_core::Config;

use cli::{Cli, Commands};
use error::Result;

/// Exit status of a run whose pass had per-instance failures
const EXIT_PARTIAL_FAILURE: i32 = 2;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_PARTIAL_FAILURE),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)?;
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    match cli.command.unwrap_or(Commands::Reconcile { no_wait: false }) {
        Commands::Reconcile { no_wait } => commands::run_reconcile(&config, no_wait, cli.json),
        Commands::Plan => commands::run_plan(&config, cli.json),
        Commands::List => commands::run_list(&config, cli.json),
        Commands::Stop { no_wait } => commands::run_stop(&config, no_wait, cli.json),
        Commands::Validate => commands::run_validate(&cli.config, &config, cli.json),
    }
}

/// Log to stderr so `--json` output stays parseable. `-v` forces debug;
/// otherwise `RUST_LOG` applies, defaulting to warnings.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("{}: tracing subscriber already installed", "warning".yellow());
    }
    tracing::debug!("Verbose mode enabled");
}
