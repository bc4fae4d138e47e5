//! Workload statistics.

use std::time::Duration;

use broadcast::MetricsSnapshot;
use observability::BroadcastStatsAggregator;

/// Statistics from a workload run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub duration: Duration,

    /// Worker threads that ran
    pub threads: usize,

    /// Messages per channel per thread
    pub messages_per_channel: u64,

    /// Channels each worker opened
    pub channels: Vec<String>,

    /// Merged flush reports of every worker
    pub aggregator: BroadcastStatsAggregator,

    /// Final per-sink counters, in configuration order
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl RunStats {
    /// Flushes per second across all workers
    pub fn flush_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.aggregator.total_flushes as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Workload ===");
        println!("Duration: {:.3}s", self.duration.as_secs_f64());
        println!("Threads: {}", self.threads);
        println!("Messages per channel: {}", self.messages_per_channel);
        println!("Channels: {}", self.channels.join(", "));
        println!("Flush rate: {:.0}/s", self.flush_rate());

        println!("\n{}", self.aggregator.summary());

        if !self.sinks.is_empty() {
            println!("\n=== Sinks ===");
            for (name, snapshot) in &self.sinks {
                println!(
                    "{name}: writes={} failures={} filtered={} contended={}",
                    snapshot.write_count,
                    snapshot.failure_count,
                    snapshot.filtered_count,
                    snapshot.contended_count
                );
            }
        }
        println!();
    }
}
