//! # Broadcast
//!
//! In-process diagnostic output fan-out.
//!
//! - [`Channel`]: per-thread writer; flush broadcasts the staged message
//! - [`Sink`]: shared destination with its own lock, backend and stamp
//! - [`BroadcastContext`]: settings per channel id plus the sink table
//! - Concurrent flushes never hold more than one sink lock at a time

pub mod backends;
pub mod channel;
pub mod context;
mod engine;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod null;
pub mod registry;
pub mod settings;
pub mod sink;
pub mod stamps;
pub mod transcode;

pub use contracts::{
    BroadcastMode, ChannelId, FlushOutcome, FlushReport, Setting, SettingsSnapshot,
    SettingsTarget, SinkId,
};
pub use channel::{Channel, ChannelBuilder};
pub use context::BroadcastContext;
pub use error::BroadcastError;
pub use factory::{build_topology, create_sink, Topology};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use null::NullChannel;
pub use registry::SinkRegistry;
pub use settings::SettingsRegistry;
pub use sink::{Sink, SinkBuilder, SinkHold};
