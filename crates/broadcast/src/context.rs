//! BroadcastContext - owner of the shared registries
//!
//! Channels and sinks created against one context only ever see each
//! other. Share it with `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, instrument};

use contracts::{ContextConfig, ContractError, RetryPolicy, SinkId};

use crate::registry::SinkRegistry;
use crate::settings::SettingsRegistry;

/// Shared broadcast state: settings per channel id and the sink table
#[derive(Debug)]
pub struct BroadcastContext {
    settings: SettingsRegistry,
    sinks: SinkRegistry,
    retry: RetryPolicy,
    next_sink_id: AtomicU64,
}

impl BroadcastContext {
    /// Create a context.
    ///
    /// # Errors
    /// Rejects a zero sink table capacity and retry policies whose backoff
    /// shrinks.
    #[instrument(
        name = "broadcast_context_new",
        skip(config),
        fields(capacity = config.sink_table_capacity)
    )]
    pub fn new(config: ContextConfig) -> Result<Arc<Self>, ContractError> {
        validate(&config)?;

        info!(
            sink_table_capacity = config.sink_table_capacity,
            spin_rounds = config.retry.spin_rounds,
            blocking_after_rounds = config.retry.blocking_after_rounds,
            "Broadcast context created"
        );

        Ok(Arc::new(Self {
            settings: SettingsRegistry::new(),
            sinks: SinkRegistry::new(config.sink_table_capacity),
            retry: config.retry,
            next_sink_id: AtomicU64::new(1),
        }))
    }

    /// Context with the default configuration.
    pub fn with_defaults() -> Arc<Self> {
        let config = ContextConfig::default();
        Arc::new(Self {
            settings: SettingsRegistry::new(),
            sinks: SinkRegistry::new(config.sink_table_capacity),
            retry: config.retry,
            next_sink_id: AtomicU64::new(1),
        })
    }

    pub fn settings(&self) -> &SettingsRegistry {
        &self.settings
    }

    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Issue a fresh sink id. Ids are never reused within a context.
    pub(crate) fn issue_sink_id(&self) -> SinkId {
        SinkId::from_raw(self.next_sink_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Check that nothing still uses the context.
    ///
    /// # Errors
    /// `ContextInUse` while channels are alive or sinks are attached.
    #[instrument(name = "broadcast_context_teardown", skip(self))]
    pub fn teardown(&self) -> Result<(), ContractError> {
        let channels = self.settings.live_channels();
        let sinks = self.sinks.len();
        if channels > 0 || sinks > 0 {
            return Err(ContractError::ContextInUse { channels, sinks });
        }

        info!(
            sinks_issued = self.next_sink_id.load(Ordering::Relaxed) - 1,
            "Broadcast context torn down"
        );
        Ok(())
    }
}

fn validate(config: &ContextConfig) -> Result<(), ContractError> {
    if config.sink_table_capacity == 0 {
        return Err(ContractError::config_validation(
            "context.sink_table_capacity",
            "must be greater than 0",
        ));
    }

    let backoff = &config.retry.backoff;
    if backoff.max_backoff_us < backoff.first_backoff_us {
        return Err(ContractError::config_validation(
            "context.retry.backoff.max_backoff_us",
            "must be >= first_backoff_us",
        ));
    }
    if backoff.factor.is_nan() || backoff.factor < 1.0 {
        return Err(ContractError::config_validation(
            "context.retry.backoff.factor",
            "must be >= 1.0",
        ));
    }

    Ok(())
}
