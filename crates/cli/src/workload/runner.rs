//! Workload runner - builds the topology and drives worker threads.
//!
//! Each worker owns one instance of every selected channel, so channels
//! with the same id on different threads share settings while all of them
//! contend for the same sinks.

use std::fmt::Write as _;
use std::thread;
use std::time::Instant;

use broadcast::{build_topology, BroadcastContext, BroadcastError, Topology};
use contracts::StreamcastConfig;
use observability::BroadcastStatsAggregator;
use tracing::{debug, info, warn};

use super::RunStats;
use crate::error::{CliError, Result};

/// Workload configuration
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Validated topology
    pub config: StreamcastConfig,

    /// Worker threads
    pub threads: usize,

    /// Messages per channel per thread
    pub messages: u64,

    /// Channel names to open; empty selects all
    pub channels: Vec<String>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Workload {
    config: WorkloadConfig,
}

impl Workload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    /// Run every worker to completion and tear the context down.
    pub fn run(self) -> Result<RunStats> {
        let started = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let names = self.channel_names()?;
        if names.is_empty() {
            warn!("No channels configured - nothing will be broadcast");
        }

        let ctx = BroadcastContext::new(self.config.config.context.clone())
            .map_err(BroadcastError::from)?;
        let topology = build_topology(&ctx, &self.config.config)?;

        let threads = self.config.threads.max(1);
        let messages = self.config.messages;
        info!(
            threads,
            messages,
            channels = names.len(),
            sinks = topology.sinks().len(),
            "Starting workload"
        );

        let aggregator = thread::scope(|scope| -> Result<BroadcastStatsAggregator> {
            let mut handles = Vec::with_capacity(threads);
            for worker in 0..threads {
                let topology = &topology;
                let names = &names;
                let handle = thread::Builder::new()
                    .name(format!("worker-{worker}"))
                    .spawn_scoped(scope, move || run_worker(worker, topology, names, messages))?;
                handles.push(handle);
            }

            let mut total = BroadcastStatsAggregator::new();
            for (worker, handle) in handles.into_iter().enumerate() {
                let stats = handle
                    .join()
                    .map_err(|_| CliError::WorkerPanicked { thread: worker })??;
                total.merge(&stats);
            }
            Ok(total)
        })?;

        let sinks = topology
            .sinks()
            .iter()
            .map(|sink| (sink.name().to_string(), sink.metrics().snapshot()))
            .collect();

        drop(topology);
        ctx.teardown().map_err(BroadcastError::from)?;

        Ok(RunStats {
            duration: started.elapsed(),
            threads,
            messages_per_channel: messages,
            channels: names,
            aggregator,
            sinks,
        })
    }

    fn channel_names(&self) -> Result<Vec<String>> {
        let configured: Vec<String> = self
            .config
            .config
            .channels
            .iter()
            .map(|channel| channel.name.clone())
            .collect();

        if self.config.channels.is_empty() {
            return Ok(configured);
        }

        let unknown: Vec<String> = self
            .config
            .channels
            .iter()
            .filter(|name| !configured.contains(name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(CliError::unknown_channels(&unknown));
        }
        Ok(self.config.channels.clone())
    }
}

fn run_worker(
    worker: usize,
    topology: &Topology,
    names: &[String],
    messages: u64,
) -> std::result::Result<BroadcastStatsAggregator, BroadcastError> {
    let mut channels = names
        .iter()
        .map(|name| topology.channel(name))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stats = BroadcastStatsAggregator::new();
    for seq in 0..messages {
        for (channel, name) in channels.iter_mut().zip(names) {
            // Channel formatting never fails.
            let _ = writeln!(channel, "worker {worker} {name} message {seq}");
            stats.update(&channel.flush());
        }
    }

    debug!(
        worker,
        flushes = stats.total_flushes,
        retries = stats.total_retries,
        "Worker finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BackendKind, BroadcastMode, ChannelConfig, ChannelId, SettingsSnapshot, SinkConfig,
        StampKind,
    };
    use std::collections::HashMap;

    fn memory_sink(name: &str) -> SinkConfig {
        SinkConfig {
            name: name.into(),
            backend: BackendKind::Memory,
            stamp: StampKind::None,
            settings: SettingsSnapshot::default(),
            params: HashMap::new(),
        }
    }

    fn channel(name: &str, id: usize, sinks: &[&str]) -> ChannelConfig {
        ChannelConfig {
            name: name.into(),
            id: ChannelId::from_const(id),
            sinks: sinks.iter().map(|s| s.to_string()).collect(),
            mode: BroadcastMode::Concurrent,
            stamp: StampKind::Line,
            settings: SettingsSnapshot::default(),
        }
    }

    fn workload(threads: usize, messages: u64, channels: Vec<String>) -> WorkloadConfig {
        WorkloadConfig {
            config: StreamcastConfig {
                sinks: vec![memory_sink("a"), memory_sink("b")],
                channels: vec![channel("main", 0, &["a", "b"]), channel("side", 1, &["b"])],
                ..StreamcastConfig::default()
            },
            threads,
            messages,
            channels,
            metrics_port: None,
        }
    }

    #[test]
    fn test_run_counts_every_write() {
        let stats = Workload::new(workload(3, 10, Vec::new())).run().unwrap();

        assert_eq!(stats.aggregator.total_flushes, 60);
        assert_eq!(stats.aggregator.total_writes, 90);
        assert_eq!(stats.aggregator.total_vanished, 0);

        let writes: HashMap<_, _> = stats
            .sinks
            .iter()
            .map(|(name, snapshot)| (name.as_str(), snapshot.write_count))
            .collect();
        assert_eq!(writes["a"], 30);
        assert_eq!(writes["b"], 60);
    }

    #[test]
    fn test_channel_filter() {
        let stats = Workload::new(workload(2, 5, vec!["side".into()])).run().unwrap();
        assert_eq!(stats.aggregator.total_flushes, 10);
        assert_eq!(stats.channels, vec!["side".to_string()]);
    }

    #[test]
    fn test_unknown_channel_filter() {
        let err = Workload::new(workload(1, 1, vec!["ghost".into()]))
            .run()
            .unwrap_err();
        assert!(matches!(err, CliError::UnknownChannels { .. }));
    }
}
