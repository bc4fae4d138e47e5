//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A `--channel` filter names a channel that is not configured
    #[error("Unknown channel(s) requested: {names}")]
    UnknownChannels { names: String },

    /// A worker thread panicked
    #[error("Worker thread {thread} panicked")]
    WorkerPanicked { thread: usize },

    /// Building or tearing down the topology failed
    #[error("Broadcast error: {0}")]
    Broadcast(#[from] broadcast::BroadcastError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn unknown_channels(names: &[String]) -> Self {
        Self::UnknownChannels {
            names: names.join(", "),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
