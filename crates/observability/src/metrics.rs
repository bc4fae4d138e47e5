//! Broadcast metrics
//!
//! Records per-flush and per-sink counters through the `metrics` facade and
//! aggregates `FlushReport`s in memory for end-of-run summaries.

use std::collections::HashMap;

use contracts::{ChannelId, FlushReport};
use metrics::{counter, gauge, histogram};

/// Record the facade metrics of one flush.
///
/// Called by the broadcast engine after every flush.
///
/// # Example
///
/// ```ignore
/// let report = channel.flush();
/// observability::metrics::record_flush(&report);
/// ```
pub fn record_flush(report: &FlushReport) {
    let channel = report.channel.to_string();

    counter!(
        "streamcast_flushes_total",
        "channel" => channel.clone(),
        "outcome" => report.outcome.as_str()
    )
    .increment(1);

    if report.is_filtered() {
        return;
    }

    histogram!("streamcast_broadcast_rounds").record(report.rounds as f64);
    histogram!("streamcast_message_bytes").record((report.stamp_len + report.payload_len) as f64);

    if report.retries > 0 {
        counter!("streamcast_contention_retries_total", "channel" => channel.clone())
            .increment(report.retries);
    }

    if report.vanished > 0 {
        counter!("streamcast_vanished_sinks_total", "channel" => channel)
            .increment(report.vanished as u64);
    }
}

/// Record one backend write.
pub fn record_sink_write(sink_name: &str, success: bool) {
    if success {
        counter!("streamcast_sink_writes_total", "sink" => sink_name.to_string()).increment(1);
    } else {
        counter!("streamcast_sink_write_failures_total", "sink" => sink_name.to_string())
            .increment(1);
    }
}

/// Record the number of sinks currently attached to a context.
pub fn record_attached_sinks(count: usize) {
    gauge!("streamcast_attached_sinks").set(count as f64);
}

/// Record the number of live channels using an id.
pub fn record_channel_refcount(channel: ChannelId, refcount: u32) {
    gauge!("streamcast_channel_refcount", "channel" => channel.to_string()).set(refcount as f64);
}

/// In-memory flush aggregator
///
/// Folds `FlushReport`s into totals and running statistics for summaries.
#[derive(Debug, Clone, Default)]
pub struct BroadcastStatsAggregator {
    /// Total flushes
    pub total_flushes: u64,

    /// Flushes rejected by channel settings
    pub filtered_flushes: u64,

    /// Flushes that met at least one busy sink
    pub contended_flushes: u64,

    /// Backend deliveries
    pub total_writes: u64,

    /// Sinks skipped by their own settings
    pub sink_filtered: u64,

    /// Sinks found dropped while attached
    pub total_vanished: u64,

    /// Backend failures
    pub total_failures: u64,

    /// Busy try_lock attempts
    pub total_retries: u64,

    /// Payload bytes broadcast
    pub payload_bytes: u64,

    /// Rounds per broadcast flush
    pub round_stats: RunningStats,

    /// Flushes per channel id
    pub per_channel: HashMap<ChannelId, u64>,
}

impl BroadcastStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one report into the totals.
    pub fn update(&mut self, report: &FlushReport) {
        self.total_flushes += 1;
        *self.per_channel.entry(report.channel).or_insert(0) += 1;

        if report.is_filtered() {
            self.filtered_flushes += 1;
            return;
        }

        if report.was_contended() {
            self.contended_flushes += 1;
        }
        self.total_writes += report.written as u64;
        self.sink_filtered += report.filtered as u64;
        self.total_vanished += report.vanished as u64;
        self.total_failures += report.failed as u64;
        self.total_retries += report.retries;
        self.payload_bytes += report.payload_len as u64;
        self.round_stats.push(report.rounds as f64);
    }

    /// Merge another aggregator, e.g. one per worker thread.
    pub fn merge(&mut self, other: &BroadcastStatsAggregator) {
        self.total_flushes += other.total_flushes;
        self.filtered_flushes += other.filtered_flushes;
        self.contended_flushes += other.contended_flushes;
        self.total_writes += other.total_writes;
        self.sink_filtered += other.sink_filtered;
        self.total_vanished += other.total_vanished;
        self.total_failures += other.total_failures;
        self.total_retries += other.total_retries;
        self.payload_bytes += other.payload_bytes;
        self.round_stats.merge(&other.round_stats);
        for (channel, count) in &other.per_channel {
            *self.per_channel.entry(*channel).or_insert(0) += count;
        }
    }

    pub fn summary(&self) -> BroadcastSummary {
        BroadcastSummary {
            total_flushes: self.total_flushes,
            filtered_flushes: self.filtered_flushes,
            contended_flushes: self.contended_flushes,
            total_writes: self.total_writes,
            sink_filtered: self.sink_filtered,
            total_vanished: self.total_vanished,
            total_failures: self.total_failures,
            total_retries: self.total_retries,
            payload_bytes: self.payload_bytes,
            filter_rate: percent(self.filtered_flushes, self.total_flushes),
            contention_rate: percent(self.contended_flushes, self.total_flushes),
            rounds: StatsSummary::from(&self.round_stats),
            per_channel: self.per_channel.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Broadcast summary
#[derive(Debug, Clone, Default)]
pub struct BroadcastSummary {
    pub total_flushes: u64,
    pub filtered_flushes: u64,
    pub contended_flushes: u64,
    pub total_writes: u64,
    pub sink_filtered: u64,
    pub total_vanished: u64,
    pub total_failures: u64,
    pub total_retries: u64,
    pub payload_bytes: u64,
    pub filter_rate: f64,
    pub contention_rate: f64,
    pub rounds: StatsSummary,
    pub per_channel: HashMap<ChannelId, u64>,
}

impl std::fmt::Display for BroadcastSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Broadcast Summary ===")?;
        writeln!(f, "Total flushes: {}", self.total_flushes)?;
        writeln!(
            f,
            "Filtered flushes: {} ({:.2}%)",
            self.filtered_flushes, self.filter_rate
        )?;
        writeln!(
            f,
            "Contended flushes: {} ({:.2}%)",
            self.contended_flushes, self.contention_rate
        )?;
        writeln!(f, "Sink writes: {}", self.total_writes)?;
        writeln!(f, "Sink-filtered: {}", self.sink_filtered)?;
        writeln!(f, "Vanished sinks: {}", self.total_vanished)?;
        writeln!(f, "Backend failures: {}", self.total_failures)?;
        writeln!(f, "Lock retries: {}", self.total_retries)?;
        writeln!(f, "Payload bytes: {}", self.payload_bytes)?;
        writeln!(f, "Rounds per broadcast: {}", self.rounds)?;

        if !self.per_channel.is_empty() {
            let mut channels: Vec<_> = self.per_channel.iter().collect();
            channels.sort();
            writeln!(f, "Flushes per channel:")?;
            for (channel, count) in channels {
                writeln!(f, "  {}: {}", channel, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Combine two partial results (Chan et al. parallel variance).
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * (self.count * other.count) as f64 / count as f64;
        self.mean += delta * other.count as f64 / count as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast_report(channel: usize, written: usize, retries: u64, rounds: u32) -> FlushReport {
        FlushReport {
            written,
            retries,
            rounds,
            ..FlushReport::broadcast(ChannelId::from_const(channel), 10, 0)
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_running_stats_merge_matches_sequential() {
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        let mut all = RunningStats::default();

        for value in [1.0, 2.0, 3.0] {
            left.push(value);
            all.push(value);
        }
        for value in [4.0, 5.0] {
            right.push(value);
            all.push(value);
        }

        left.merge(&right);
        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).abs() < 1e-10);
        assert!((left.variance() - all.variance()).abs() < 1e-10);
        assert!((left.max() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = BroadcastStatsAggregator::new();

        aggregator.update(&broadcast_report(0, 2, 0, 1));
        aggregator.update(&broadcast_report(0, 2, 3, 4));
        aggregator.update(&FlushReport::filtered(ChannelId::from_const(1), 4));

        assert_eq!(aggregator.total_flushes, 3);
        assert_eq!(aggregator.filtered_flushes, 1);
        assert_eq!(aggregator.contended_flushes, 1);
        assert_eq!(aggregator.total_writes, 4);
        assert_eq!(aggregator.total_retries, 3);
        assert_eq!(aggregator.payload_bytes, 20);
        assert_eq!(aggregator.round_stats.count(), 2);
        assert_eq!(
            aggregator.per_channel.get(&ChannelId::from_const(0)),
            Some(&2)
        );
    }

    #[test]
    fn test_aggregator_merge() {
        let mut first = BroadcastStatsAggregator::new();
        first.update(&broadcast_report(0, 1, 0, 1));

        let mut second = BroadcastStatsAggregator::new();
        second.update(&broadcast_report(0, 1, 0, 1));
        second.update(&broadcast_report(2, 1, 0, 1));

        first.merge(&second);
        assert_eq!(first.total_flushes, 3);
        assert_eq!(first.per_channel.get(&ChannelId::from_const(0)), Some(&2));
        assert_eq!(first.per_channel.get(&ChannelId::from_const(2)), Some(&1));
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = BroadcastStatsAggregator::new();
        for _ in 0..3 {
            aggregator.update(&broadcast_report(0, 2, 0, 1));
        }
        aggregator.update(&FlushReport::filtered(ChannelId::from_const(0), 1));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total flushes: 4"));
        assert!(output.contains("25.00%"));
        assert!(output.contains("Sink writes: 6"));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_flush(&broadcast_report(0, 1, 2, 3));
        record_sink_write("mem", true);
        record_sink_write("mem", false);
    }
}
