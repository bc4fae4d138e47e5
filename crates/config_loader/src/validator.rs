//! Configuration validation
//!
//! Rules:
//! - sink names non-empty and unique, channel names unique
//! - every channel's sink references exist
//! - the sink table has room for every sink
//! - retry backoff never shrinks
//! - file backends name a `path`

use std::collections::HashSet;

use contracts::{BackendKind, ContractError, StreamcastConfig};

/// Return the first rule violation, if any.
pub fn validate(config: &StreamcastConfig) -> Result<(), ContractError> {
    validate_sinks(config)?;
    validate_channels(config)?;
    validate_context(config)?;
    Ok(())
}

fn validate_sinks(config: &StreamcastConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.backend == BackendKind::File && !sink.params.contains_key("path") {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.path", sink.name),
                "file backend requires a path",
            ));
        }
    }
    Ok(())
}

fn validate_channels(config: &StreamcastConfig) -> Result<(), ContractError> {
    let sink_names: HashSet<_> = config.sinks.iter().map(|s| s.name.as_str()).collect();
    let mut seen = HashSet::new();

    for channel in &config.channels {
        if !seen.insert(channel.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("channels[name={}]", channel.name),
                "duplicate channel name",
            ));
        }
        for sink in &channel.sinks {
            if !sink_names.contains(sink.as_str()) {
                return Err(ContractError::config_validation(
                    format!("channels[{}].sinks", channel.name),
                    format!("unknown sink '{sink}'"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_context(config: &StreamcastConfig) -> Result<(), ContractError> {
    let context = &config.context;
    if context.sink_table_capacity == 0 {
        return Err(ContractError::config_validation(
            "context.sink_table_capacity",
            "must be greater than 0",
        ));
    }
    if context.sink_table_capacity <= config.sinks.len() {
        return Err(ContractError::config_validation(
            "context.sink_table_capacity",
            format!(
                "capacity ({}) must exceed the number of sinks ({})",
                context.sink_table_capacity,
                config.sinks.len()
            ),
        ));
    }

    let backoff = &context.retry.backoff;
    if backoff.max_backoff_us < backoff.first_backoff_us {
        return Err(ContractError::config_validation(
            "context.retry.backoff",
            format!(
                "max_backoff_us ({}) must be >= first_backoff_us ({})",
                backoff.max_backoff_us, backoff.first_backoff_us
            ),
        ));
    }
    if backoff.factor.is_nan() || backoff.factor < 1.0 {
        return Err(ContractError::config_validation(
            "context.retry.backoff.factor",
            format!("factor must be >= 1.0, got {}", backoff.factor),
        ));
    }
    Ok(())
}
