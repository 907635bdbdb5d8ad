//! Error types for unisonctrl-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from unisonctrl-core
    #[error(transparent)]
    Core(#[from] unisonctrl_core::Error),

    /// JSON output could not be rendered
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
