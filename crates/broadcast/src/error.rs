//! Broadcast error types

use thiserror::Error;

/// Errors raised while building sinks and channels from configuration
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// A channel names a sink that was never configured
    #[error("channel '{channel}' references unknown sink '{sink}'")]
    UnknownSinkReference { channel: String, sink: String },

    /// No channel with the requested name
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    /// Registry or settings failure (from contract)
    #[error("broadcast error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BroadcastError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
