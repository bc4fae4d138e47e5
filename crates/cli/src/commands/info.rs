//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{SettingsSnapshot, StreamcastConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    context: ContextInfo,
    sinks: Vec<SinkInfo>,
    channels: Vec<ChannelInfo>,
}

#[derive(Serialize)]
struct ContextInfo {
    sink_table_capacity: usize,
    spin_rounds: u32,
    blocking_after_rounds: u32,
    lock_wait_ms: u64,
    first_backoff_us: u64,
    max_backoff_us: u64,
    backoff_factor: f64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    backend: String,
    stamp: String,
    settings: SettingsSnapshot,
    /// Channels that broadcast to this sink
    channels: Vec<String>,
}

#[derive(Serialize)]
struct ChannelInfo {
    name: String,
    id: u8,
    mode: String,
    stamp: String,
    settings: SettingsSnapshot,
    sinks: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &StreamcastConfig) -> ConfigInfo {
    let retry = &config.context.retry;

    let sinks = config
        .sinks
        .iter()
        .map(|sink| SinkInfo {
            name: sink.name.clone(),
            backend: format!("{:?}", sink.backend),
            stamp: format!("{:?}", sink.stamp),
            settings: sink.settings,
            channels: config
                .channels
                .iter()
                .filter(|channel| channel.sinks.contains(&sink.name))
                .map(|channel| channel.name.clone())
                .collect(),
        })
        .collect();

    let channels = config
        .channels
        .iter()
        .map(|channel| ChannelInfo {
            name: channel.name.clone(),
            id: channel.id.index() as u8,
            mode: format!("{:?}", channel.mode),
            stamp: format!("{:?}", channel.stamp),
            settings: channel.settings,
            sinks: channel.sinks.clone(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        context: ContextInfo {
            sink_table_capacity: config.context.sink_table_capacity,
            spin_rounds: retry.spin_rounds,
            blocking_after_rounds: retry.blocking_after_rounds,
            lock_wait_ms: retry.lock_wait_ms,
            first_backoff_us: retry.backoff.first_backoff_us,
            max_backoff_us: retry.backoff.max_backoff_us,
            backoff_factor: retry.backoff.factor,
        },
        sinks,
        channels,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Streamcast Configuration ({}) ===\n", info.version);

    let ctx = &info.context;
    println!("Context:");
    println!("  Sink table capacity: {}", ctx.sink_table_capacity);
    println!(
        "  Retry: spin {} rounds, timed waits after {} rounds ({} ms)",
        ctx.spin_rounds, ctx.blocking_after_rounds, ctx.lock_wait_ms
    );
    println!(
        "  Backoff: {}us x{} up to {}us",
        ctx.first_backoff_us, ctx.backoff_factor, ctx.max_backoff_us
    );

    println!("\nSinks ({}):", info.sinks.len());
    for sink in &info.sinks {
        println!("  - {} [{}] stamp={}", sink.name, sink.backend, sink.stamp);
        print_settings(&sink.settings);
        if sink.channels.is_empty() {
            println!("      standalone");
        } else {
            println!("      channels: {}", sink.channels.join(", "));
        }
    }

    println!("\nChannels ({}):", info.channels.len());
    for channel in &info.channels {
        println!(
            "  - {} [id {}] mode={} stamp={}",
            channel.name, channel.id, channel.mode, channel.stamp
        );
        print_settings(&channel.settings);
        println!("      sinks: {}", channel.sinks.join(", "));
    }
    println!();
}

fn print_settings(settings: &SettingsSnapshot) {
    println!(
        "      enabled={} priority={} filter={}",
        settings.enabled, settings.priority, settings.filter
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_sink_lists_its_channels() {
        let config = ConfigLoader::load_from_str(
            r#"
[[sinks]]
name = "out"
backend = "stdout"

[[sinks]]
name = "alone"
backend = "tracing"

[[channels]]
name = "main"
id = 1
sinks = ["out"]
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&config);
        assert_eq!(info.sinks[0].channels, vec!["main".to_string()]);
        assert!(info.sinks[1].channels.is_empty());
        assert_eq!(info.channels[0].id, 1);
        assert!(serde_json::to_string(&info).is_ok());
    }
}
