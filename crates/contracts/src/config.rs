//! StreamcastConfig - Config Loader output
//!
//! Describes a complete broadcast topology: context tuning, the shared sinks
//! and the channels that fan out to them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{ChannelId, SettingsSnapshot};

/// Default sink table capacity, a prime above the expected 32 shared sinks.
pub const DEFAULT_SINK_TABLE_CAPACITY: usize = 37;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete broadcast topology
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamcastConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Context tuning
    #[serde(default)]
    pub context: ContextConfig,

    /// Shared sinks
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,

    /// Channels, each referencing sinks by name
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl StreamcastConfig {
    pub fn sink(&self, name: &str) -> Option<&SinkConfig> {
        self.sinks.iter().find(|sink| sink.name == name)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|channel| channel.name == name)
    }
}

/// Broadcast context configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Slots in the shared sink table; bounds the number of attached sinks
    #[serde(default = "default_sink_table_capacity")]
    pub sink_table_capacity: usize,

    /// Contention handling during a concurrent broadcast
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_sink_table_capacity() -> usize {
    DEFAULT_SINK_TABLE_CAPACITY
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sink_table_capacity: DEFAULT_SINK_TABLE_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// How a concurrent broadcast waits on busy sinks.
///
/// Rounds `0..spin_rounds` retry immediately. Later rounds yield and sleep
/// per `backoff`. From `blocking_after_rounds` on, the engine waits up to
/// `lock_wait_ms` on a single pending sink instead of polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_spin_rounds")]
    pub spin_rounds: u32,

    #[serde(default = "default_blocking_after_rounds")]
    pub blocking_after_rounds: u32,

    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,

    #[serde(default)]
    pub backoff: BackoffPolicy,
}

fn default_spin_rounds() -> u32 {
    64
}

fn default_blocking_after_rounds() -> u32 {
    256
}

fn default_lock_wait_ms() -> u64 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            spin_rounds: default_spin_rounds(),
            blocking_after_rounds: default_blocking_after_rounds(),
            lock_wait_ms: default_lock_wait_ms(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

/// Sleep growth between contended rounds.
///
/// The delay for attempt `n` is `first × factor^n`, clamped to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Initial sleep in microseconds
    #[serde(default = "default_first_backoff_us")]
    pub first_backoff_us: u64,

    /// Sleep cap in microseconds
    #[serde(default = "default_max_backoff_us")]
    pub max_backoff_us: u64,

    /// Multiplicative growth factor (`>= 1.0`)
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
}

fn default_first_backoff_us() -> u64 {
    10
}

fn default_max_backoff_us() -> u64 {
    1_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first_backoff_us: default_first_backoff_us(),
            max_backoff_us: default_max_backoff_us(),
            factor: default_backoff_factor(),
        }
    }
}

impl BackoffPolicy {
    pub fn first(&self) -> Duration {
        Duration::from_micros(self.first_backoff_us)
    }

    pub fn max(&self) -> Duration {
        Duration::from_micros(self.max_backoff_us)
    }

    /// Delay for the given attempt (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let max = self.max();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first().as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name, referenced by channels
    pub name: String,

    /// Backend type
    pub backend: BackendKind,

    /// Prefix used for standalone writes
    #[serde(default)]
    pub stamp: StampKind,

    /// Initial sink-level settings
    #[serde(default)]
    pub settings: SettingsSnapshot,

    /// Backend specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-memory buffer
    Memory,
    /// File output (`path` param)
    File,
    /// Process stdout
    Stdout,
    /// `tracing` events
    Tracing,
}

/// Message prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampKind {
    #[default]
    None,
    /// Local wall clock, `YYYY-MM-DD HH:MM:SS:mmm `
    SystemTime,
    /// Incrementing message counter
    Line,
    /// Constant label
    Text(String),
}

/// Concurrency model of a channel's broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Round-robin try-lock over shared sinks
    #[default]
    Concurrent,
    /// Sequential writes, for programs with a single writer thread
    SingleThreaded,
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name
    pub name: String,

    /// Settings slot shared by all channels with this id
    pub id: ChannelId,

    /// Sink names to fan out to
    #[serde(default)]
    pub sinks: Vec<String>,

    #[serde(default)]
    pub mode: BroadcastMode,

    #[serde(default)]
    pub stamp: StampKind,

    /// Requested settings; only the first channel of an id applies them
    #[serde(default)]
    pub settings: SettingsSnapshot,
}
