//! Layered error definitions
//!
//! Categorized by source: config / registry / backend

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Registry Errors =====
    /// Channel id outside `0..MAX_CHANNELS`
    #[error("channel id {id} out of range (max {max})")]
    ChannelIdOutOfRange { id: usize, max: usize },

    /// No free slot left in the shared sink table
    #[error("sink table full: capacity {capacity}")]
    SinkTableFull { capacity: usize },

    /// Sink id is not known to the context
    #[error("unknown sink: {0}")]
    UnknownSink(String),

    /// Context still has live channels or attached sinks
    #[error("broadcast context in use: {channels} channel(s), {sinks} attached sink(s)")]
    ContextInUse { channels: usize, sinks: usize },

    // ===== Backend Errors =====
    /// Backend write error
    #[error("sink '{sink_name}' write error: {message}")]
    BackendWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create backend write error
    pub fn backend_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
