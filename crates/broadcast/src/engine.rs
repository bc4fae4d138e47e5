//! Broadcast engine - fans one finished message out to shared sinks
//!
//! Concurrent mode walks the pending sinks in rounds and only ever
//! try-locks, so two channels sharing two sinks in opposite order cannot
//! deadlock. At most one sink lock is held at a time.

use std::sync::{Arc, Weak};
use std::thread;

use tracing::{trace, warn};

use contracts::{ChannelId, FlushReport, RetryPolicy, SinkId};

use crate::sink::{SinkInner, SinkState};

/// A channel's weak reference to an attached sink
#[derive(Debug, Clone)]
pub(crate) struct SinkRef {
    pub(crate) id: SinkId,
    pub(crate) handle: Weak<SinkInner>,
}

impl SinkRef {
    pub(crate) fn new(sink: &Arc<SinkInner>) -> Self {
        Self {
            id: sink.id(),
            handle: Arc::downgrade(sink),
        }
    }
}

/// Result of offering the message to one sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    Done,
    Busy,
}

/// How to acquire the sink lock for one offer
#[derive(Debug, Clone, Copy)]
enum Acquire {
    Try,
    Wait(std::time::Duration),
    Block,
}

/// One message on its way to a list of sinks
pub(crate) struct Broadcast<'a> {
    pub(crate) channel: ChannelId,
    pub(crate) sinks: &'a [SinkRef],
    pub(crate) message: &'a [u8],
}

impl Broadcast<'_> {
    /// Round-robin try-lock until every sink is written, filtered or gone.
    pub(crate) fn run_concurrent(&self, policy: &RetryPolicy, report: &mut FlushReport) {
        let mut pending: Vec<usize> = (0..self.sinks.len()).collect();
        let mut round: u32 = 0;
        let mut warned = false;

        while !pending.is_empty() {
            report.rounds += 1;

            let blocking = round >= policy.blocking_after_rounds;
            // Rotate which pending sink gets the bounded wait.
            let waiter = if blocking {
                Some(round as usize % pending.len())
            } else {
                None
            };

            let mut position = 0;
            pending.retain(|&index| {
                let acquire = match waiter {
                    Some(w) if w == position => Acquire::Wait(policy.lock_wait()),
                    _ => Acquire::Try,
                };
                position += 1;
                self.offer(&self.sinks[index], acquire, report) == Offer::Busy
            });

            if pending.is_empty() {
                break;
            }

            if blocking {
                if !warned {
                    warned = true;
                    warn!(
                        channel = %self.channel,
                        pending = pending.len(),
                        rounds = report.rounds,
                        "Sinks still busy, falling back to timed waits"
                    );
                }
            } else {
                pause(round, policy);
            }
            round = round.saturating_add(1);
        }
    }

    /// Write every sink in order with a blocking lock.
    pub(crate) fn run_sequential(&self, report: &mut FlushReport) {
        report.rounds = 1;
        for sink in self.sinks {
            self.offer(sink, Acquire::Block, report);
        }
    }

    fn offer(&self, sink_ref: &SinkRef, acquire: Acquire, report: &mut FlushReport) -> Offer {
        let Some(sink) = sink_ref.handle.upgrade() else {
            report.vanished += 1;
            warn!(channel = %self.channel, sink = %sink_ref.id, "Attached sink no longer exists");
            return Offer::Done;
        };

        if !sink.settings().can_be_output() {
            report.filtered += 1;
            sink.metrics().inc_filtered_count();
            trace!(channel = %self.channel, sink = %sink.name(), "Sink filtered message");
            return Offer::Done;
        }

        let state = match acquire {
            Acquire::Try => sink.try_lock_state(),
            Acquire::Wait(wait) => sink.try_lock_state_for(wait),
            Acquire::Block => Some(sink.lock_state()),
        };

        match state {
            Some(mut state) => {
                self.write(&sink, &mut state, report);
                Offer::Done
            }
            None => {
                report.retries += 1;
                sink.metrics().inc_contended_count();
                Offer::Busy
            }
        }
    }

    /// A sink's priority override covers one delivered message.
    fn write(&self, sink: &SinkInner, state: &mut SinkState, report: &mut FlushReport) {
        if sink.deliver(state, self.message) {
            report.written += 1;
            sink.settings().reset_priority();
        } else {
            report.failed += 1;
        }
    }
}

/// Spin for the first rounds, then yield and sleep with growing delays.
fn pause(round: u32, policy: &RetryPolicy) {
    if round < policy.spin_rounds {
        std::hint::spin_loop();
        return;
    }
    thread::yield_now();
    thread::sleep(policy.backoff.next(round - policy.spin_rounds));
}
