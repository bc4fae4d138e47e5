//! Sink - an addressable, lockable destination
//!
//! A sink owns a backend behind its own lock. It can be used directly
//! (standalone writes, prefixed by the sink's stamp) or shared by channels
//! as a broadcast target, in which case channel messages arrive already
//! stamped and direct writes bypass the sink's stamp.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, instrument, trace, warn};

use contracts::{
    Backend, ChannelSettings, ContractError, SettingsSnapshot, SettingsTarget, SinkId, Stamp,
};

use crate::context::BroadcastContext;
use crate::metrics::SinkMetrics;
use crate::stamps::NullStamp;

/// Filler for the reserved stamp region; never reaches a backend.
pub(crate) const PLACEHOLDER: u8 = b' ';

/// State guarded by the sink lock
pub(crate) struct SinkState {
    backend: Box<dyn Backend>,
    staging: Vec<u8>,
    /// Width of the stamp reservation at the head of `staging`
    reserved: usize,
    /// Last attach/detach transition this state was reset for
    epoch: u64,
}

impl SinkState {
    fn reset(&mut self, reserved: usize) {
        self.staging.clear();
        self.staging.resize(reserved, PLACEHOLDER);
        self.reserved = reserved;
    }

    fn payload_len(&self) -> usize {
        self.staging.len() - self.reserved
    }
}

pub(crate) struct SinkInner {
    id: SinkId,
    name: String,
    settings: ChannelSettings,
    state: Mutex<SinkState>,
    is_broadcast_target: AtomicBool,
    /// Bumped on every attach 0→1 / detach 1→0
    mode_epoch: AtomicU64,
    stamp: Arc<dyn Stamp>,
    metrics: Arc<SinkMetrics>,
    ctx: Arc<BroadcastContext>,
}

impl SinkInner {
    pub(crate) fn id(&self) -> SinkId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    pub(crate) fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    pub(crate) fn is_broadcast_target(&self) -> bool {
        self.is_broadcast_target.load(Ordering::Acquire)
    }

    /// Flip the shared flag. Called by the registry under its lock; the
    /// staging buffer catches up the next time the sink lock is taken.
    pub(crate) fn set_broadcast_target(&self, target: bool) {
        self.is_broadcast_target.store(target, Ordering::Release);
        self.mode_epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn try_lock_state(&self) -> Option<MutexGuard<'_, SinkState>> {
        self.state.try_lock()
    }

    pub(crate) fn try_lock_state_for(&self, wait: Duration) -> Option<MutexGuard<'_, SinkState>> {
        self.state.try_lock_for(wait)
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock()
    }

    /// Lock the sink for a standalone write, bringing the staging buffer
    /// in line with the current attach state.
    fn lock_staging(&self) -> MutexGuard<'_, SinkState> {
        let mut state = self.state.lock();
        let epoch = self.mode_epoch.load(Ordering::Acquire);
        if state.epoch != epoch {
            state.epoch = epoch;
            let reserved = if self.is_broadcast_target() {
                0
            } else {
                self.stamp.max_len()
            };
            if state.payload_len() > 0 {
                debug!(
                    sink = %self.name,
                    dropped = state.payload_len(),
                    "Discarding staged bytes on attach change"
                );
            }
            state.reset(reserved);
        }
        state
    }

    /// Hand one finished message to the backend. Failures are logged and
    /// counted, never returned.
    pub(crate) fn deliver(&self, state: &mut SinkState, message: &[u8]) -> bool {
        match output(state.backend.as_mut(), message) {
            Ok(()) => {
                self.metrics.inc_write_count();
                observability::record_sink_write(&self.name, true);
                true
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                observability::record_sink_write(&self.name, false);
                error!(sink = %self.name, id = %self.id, error = %e, "Backend write failed");
                false
            }
        }
    }
}

fn output(backend: &mut dyn Backend, message: &[u8]) -> Result<(), ContractError> {
    backend.output(message, char_count(message))?;
    backend.flush()
}

/// UTF-8 characters in `bytes`, counting every non-continuation byte.
fn char_count(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| (**b & 0xC0) != 0x80).count()
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        if let Some(channels) = self.ctx.sinks().evict(self.id) {
            warn!(
                sink = %self.name,
                id = %self.id,
                channels,
                "Sink dropped while still attached; channels will skip it"
            );
        }
    }
}

/// Owner handle of a sink
///
/// Clones share the same sink. The sink is destroyed when the last handle
/// is dropped; channels only hold weak references.
#[derive(Clone)]
pub struct Sink {
    inner: Arc<SinkInner>,
}

impl Sink {
    /// Sink with no stamp and default settings.
    pub fn new(
        ctx: &Arc<BroadcastContext>,
        name: impl Into<String>,
        backend: Box<dyn Backend>,
    ) -> Self {
        Self::builder(ctx, name, backend).build()
    }

    pub fn builder(
        ctx: &Arc<BroadcastContext>,
        name: impl Into<String>,
        backend: Box<dyn Backend>,
    ) -> SinkBuilder {
        SinkBuilder {
            ctx: Arc::clone(ctx),
            name: name.into(),
            backend,
            stamp: Arc::new(NullStamp),
            settings: SettingsSnapshot::default(),
        }
    }

    pub fn id(&self) -> SinkId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True while at least one channel is attached.
    pub fn is_broadcast_target(&self) -> bool {
        self.inner.is_broadcast_target()
    }

    /// Number of channels attached to this sink.
    pub fn refcount(&self) -> u32 {
        self.inner.ctx.sinks().refcount(self.inner.id)
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.inner.metrics
    }

    pub fn stamp(&self) -> &Arc<dyn Stamp> {
        &self.inner.stamp
    }

    /// Whether the sink belongs to `ctx`.
    pub fn belongs_to(&self, ctx: &Arc<BroadcastContext>) -> bool {
        Arc::ptr_eq(&self.inner.ctx, ctx)
    }

    pub(crate) fn inner(&self) -> &Arc<SinkInner> {
        &self.inner
    }

    /// Stage bytes for the next standalone flush.
    pub fn write(&self, bytes: &[u8]) {
        self.inner.lock_staging().staging.extend_from_slice(bytes);
    }

    /// Send staged bytes to the backend.
    ///
    /// Standalone, the message is prefixed by the sink's stamp. While the
    /// sink is a broadcast target the staged bytes go out unstamped. The
    /// sink's current priority is reset to its default afterwards.
    #[instrument(name = "sink_flush", level = "trace", skip(self), fields(sink = %self.inner.name))]
    pub fn flush(&self) -> Result<(), ContractError> {
        let inner = &*self.inner;
        let mut state = inner.lock_staging();
        let reserved = state.reserved;

        let result = if inner.settings.can_be_output() {
            let stamp_len = if reserved > 0 {
                inner.stamp.render_tail(&mut state.staging[..reserved])
            } else {
                0
            };
            let state = &mut *state;
            let message = &state.staging[reserved - stamp_len..];
            match output(state.backend.as_mut(), message) {
                Ok(()) => {
                    inner.metrics.inc_write_count();
                    observability::record_sink_write(&inner.name, true);
                    Ok(())
                }
                Err(e) => {
                    inner.metrics.inc_failure_count();
                    observability::record_sink_write(&inner.name, false);
                    Err(e)
                }
            }
        } else {
            trace!(sink = %inner.name, "Standalone message filtered");
            inner.metrics.inc_filtered_count();
            Ok(())
        };

        state.staging.truncate(reserved);
        inner.settings.reset_priority();
        result
    }

    /// Run `f` with exclusive access to the backend, holding the sink lock.
    ///
    /// Concurrent broadcasts wait (retrying) until `f` returns.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut dyn Backend) -> R) -> R {
        let mut state = self.inner.lock_state();
        f(state.backend.as_mut())
    }

    /// Hold the sink lock until the guard is dropped.
    pub fn hold(&self) -> SinkHold<'_> {
        SinkHold {
            _state: self.inner.lock_state(),
        }
    }
}

impl SettingsTarget for Sink {
    fn settings(&self) -> &ChannelSettings {
        &self.inner.settings
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("is_broadcast_target", &self.is_broadcast_target())
            .finish()
    }
}

impl io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Sink::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Sink::flush(self).map_err(io::Error::other)
    }
}

impl fmt::Write for Sink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Sink::write(self, s.as_bytes());
        Ok(())
    }
}

/// Guard returned by [`Sink::hold`]
#[must_use = "the sink is released as soon as the guard is dropped"]
pub struct SinkHold<'a> {
    _state: MutexGuard<'a, SinkState>,
}

/// Builder for [`Sink`]
pub struct SinkBuilder {
    ctx: Arc<BroadcastContext>,
    name: String,
    backend: Box<dyn Backend>,
    stamp: Arc<dyn Stamp>,
    settings: SettingsSnapshot,
}

impl SinkBuilder {
    pub fn stamp(mut self, stamp: Arc<dyn Stamp>) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn settings(mut self, settings: SettingsSnapshot) -> Self {
        self.settings = settings;
        self
    }

    #[instrument(
        name = "sink_build",
        skip(self),
        fields(sink = %self.name, backend = %self.backend.name())
    )]
    pub fn build(self) -> Sink {
        let id = self.ctx.issue_sink_id();
        let reserved = self.stamp.max_len();
        let mut staging = Vec::with_capacity(reserved + 128);
        staging.resize(reserved, PLACEHOLDER);

        debug!(%id, stamp_max_len = reserved, "Sink created");

        Sink {
            inner: Arc::new(SinkInner {
                id,
                name: self.name,
                settings: ChannelSettings::from_snapshot(self.settings),
                state: Mutex::new(SinkState {
                    backend: self.backend,
                    staging,
                    reserved,
                    epoch: 0,
                }),
                is_broadcast_target: AtomicBool::new(false),
                mode_epoch: AtomicU64::new(0),
                stamp: self.stamp,
                metrics: Arc::new(SinkMetrics::new()),
                ctx: self.ctx,
            }),
        }
    }
}
