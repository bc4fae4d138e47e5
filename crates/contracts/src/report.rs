//! FlushReport - outcome of one channel flush

use serde::{Deserialize, Serialize};

use crate::ChannelId;

/// What a flush did with the staged message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushOutcome {
    /// Channel settings rejected the message; no sink was touched
    Filtered,
    /// Message was offered to every attached sink
    Broadcast,
}

impl FlushOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushOutcome::Filtered => "filtered",
            FlushOutcome::Broadcast => "broadcast",
        }
    }
}

/// Per-flush accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub channel: ChannelId,
    pub outcome: FlushOutcome,

    /// Payload bytes, excluding the stamp
    pub payload_len: usize,

    /// Stamp bytes prefixed to the payload
    pub stamp_len: usize,

    /// Sinks the message was handed to
    pub written: usize,

    /// Sinks whose own settings rejected the message
    pub filtered: usize,

    /// Sinks dropped while still attached
    pub vanished: usize,

    /// Backend calls that returned an error
    pub failed: usize,

    /// try_lock attempts that found the sink busy
    pub retries: u64,

    /// Passes over the pending sinks
    pub rounds: u32,
}

impl FlushReport {
    /// Report for a flush that never reached the sinks.
    pub fn filtered(channel: ChannelId, payload_len: usize) -> Self {
        Self {
            channel,
            outcome: FlushOutcome::Filtered,
            payload_len,
            stamp_len: 0,
            written: 0,
            filtered: 0,
            vanished: 0,
            failed: 0,
            retries: 0,
            rounds: 0,
        }
    }

    /// Empty broadcast report, filled in by the engine.
    pub fn broadcast(channel: ChannelId, payload_len: usize, stamp_len: usize) -> Self {
        Self {
            outcome: FlushOutcome::Broadcast,
            stamp_len,
            ..Self::filtered(channel, payload_len)
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.outcome == FlushOutcome::Filtered
    }

    /// Whether any sink lock was contended during the flush.
    pub fn was_contended(&self) -> bool {
        self.retries > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let id = ChannelId::from_const(2);
        let filtered = FlushReport::filtered(id, 5);
        assert!(filtered.is_filtered());
        assert_eq!(filtered.outcome.as_str(), "filtered");

        let broadcast = FlushReport::broadcast(id, 5, 3);
        assert!(!broadcast.is_filtered());
        assert_eq!(broadcast.stamp_len, 3);
        assert_eq!(broadcast.payload_len, 5);
        assert!(!broadcast.was_contended());
    }
}
