//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::StreamcastConfig;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::workload::{Workload, WorkloadConfig};

/// Execute the `run` command
pub fn run_workload(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(capacity) = args.sink_table_capacity {
        info!(capacity, "Overriding sink table capacity from CLI");
        config.context.sink_table_capacity = capacity;
        config_loader::ConfigLoader::validate(&config)
            .context("Configuration invalid after CLI overrides")?;
    }

    info!(
        sinks = config.sinks.len(),
        channels = config.channels.len(),
        capacity = config.context.sink_table_capacity,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let workload = Workload::new(WorkloadConfig {
        config,
        threads: args.threads,
        messages: args.messages,
        channels: args.channels.clone(),
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    let stats = workload.run().context("Workload failed")?;
    info!(
        flushes = stats.aggregator.total_flushes,
        writes = stats.aggregator.total_writes,
        duration_secs = stats.duration.as_secs_f64(),
        flush_rate = format!("{:.0}", stats.flush_rate()),
        "Workload completed"
    );
    stats.print_summary();

    Ok(())
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &StreamcastConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Sink table capacity: {}", config.context.sink_table_capacity);

    println!("\nSinks ({}):", config.sinks.len());
    for sink in &config.sinks {
        println!("  - {} ({:?}, stamp {:?})", sink.name, sink.backend, sink.stamp);
    }

    println!("\nChannels ({}):", config.channels.len());
    for channel in &config.channels {
        println!(
            "  - {} (id {}, {:?}) -> {}",
            channel.name,
            channel.id,
            channel.mode,
            channel.sinks.join(", ")
        );
    }
    println!();
}
