//! `validate` command implementation.

use std::collections::HashSet;

use anyhow::{Context, Result};
use contracts::{BackendKind, StreamcastConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    sink_table_capacity: usize,
    sink_count: usize,
    channel_count: usize,
    channel_id_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            let channel_ids: HashSet<_> = config.channels.iter().map(|c| c.id).collect();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    sink_table_capacity: config.context.sink_table_capacity,
                    sink_count: config.sinks.len(),
                    channel_count: config.channels.len(),
                    channel_id_count: channel_ids.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &StreamcastConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - every flush will be dropped".to_string());
    }

    for channel in &config.channels {
        if channel.sinks.is_empty() {
            warnings.push(format!("Channel '{}' has no sinks", channel.name));
        }
        if !channel.settings.enabled {
            warnings.push(format!("Channel '{}' starts disabled", channel.name));
        }
    }

    let used: HashSet<&str> = config
        .channels
        .iter()
        .flat_map(|c| c.sinks.iter().map(String::as_str))
        .collect();
    for sink in &config.sinks {
        if !used.contains(sink.name.as_str()) {
            warnings.push(format!(
                "Sink '{}' is not referenced by any channel (standalone only)",
                sink.name
            ));
        }
        if sink.backend == BackendKind::Memory {
            warnings.push(format!(
                "Sink '{}' uses the memory backend - output is discarded at exit",
                sink.name
            ));
        }
    }

    // Channels sharing an id share settings; differing initial values
    // are silently ignored for all but the first.
    for (idx, channel) in config.channels.iter().enumerate() {
        let conflict = config.channels[..idx]
            .iter()
            .find(|earlier| earlier.id == channel.id && earlier.settings != channel.settings);
        if let Some(earlier) = conflict {
            warnings.push(format!(
                "Channels '{}' and '{}' share id {} but request different settings",
                earlier.name, channel.name, channel.id
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Sink table capacity: {}", summary.sink_table_capacity);
            println!("  Sinks: {}", summary.sink_count);
            println!(
                "  Channels: {} ({} distinct ids)",
                summary.channel_count, summary.channel_id_count
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
