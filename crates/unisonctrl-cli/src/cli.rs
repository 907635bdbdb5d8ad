//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use unisonctrl_core::DEFAULT_CONFIG_PATH;

/// unisonctrl - keep a fleet of unison sync instances matched to your rules
#[derive(Parser, Debug)]
#[command(name = "unisonctrl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml, .json, .yaml)
    #[arg(short, long, global = true, env = "UNISONCTRL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// The command to run; a reconciliation pass when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run one reconciliation pass
    ///
    /// Drops records of dead instances, partitions the sync root and
    /// starts, restarts or kills unison instances to match.
    Reconcile {
        /// Fail instead of waiting when another pass is running
        #[arg(long)]
        no_wait: bool,
    },

    /// Show what a reconciliation pass would do, without doing it
    Plan,

    /// List recorded sync instances
    List,

    /// Stop every recorded sync instance
    Stop {
        /// Fail instead of waiting when another pass is running
        #[arg(long)]
        no_wait: bool,
    },

    /// Check the configuration file and exit
    Validate,
}
