//! Channel - a writer that fans messages out to shared sinks
//!
//! Bytes are staged in a private buffer that starts with a region reserved
//! for the stamp. `flush` checks the channel id's settings, renders the
//! stamp into the tail of the reservation and broadcasts the finished
//! message.

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use contracts::{
    BroadcastMode, ChannelId, ChannelSettings, ContractError, FlushReport, SettingsSnapshot,
    SettingsTarget, Stamp, Transcoder, WideText,
};

use crate::context::BroadcastContext;
use crate::engine::{Broadcast, SinkRef};
use crate::sink::{Sink, PLACEHOLDER};
use crate::stamps::NullStamp;

/// A per-thread writer attached to a fixed set of sinks
///
/// All channels with the same [`ChannelId`] share one settings slot.
pub struct Channel {
    id: ChannelId,
    name: String,
    ctx: Arc<BroadcastContext>,
    sinks: Vec<SinkRef>,
    staging: Vec<u8>,
    /// Stamp reservation width at the head of `staging`
    reserved: usize,
    mode: BroadcastMode,
    stamp: Arc<dyn Stamp>,
}

impl Channel {
    /// Create a channel attached to `sinks`.
    ///
    /// Only the first live channel of `id` applies `initial`; later ones
    /// inherit the current settings.
    pub fn new<'a>(
        ctx: &Arc<BroadcastContext>,
        id: ChannelId,
        sinks: impl IntoIterator<Item = &'a Sink>,
        mode: BroadcastMode,
        stamp: Arc<dyn Stamp>,
        initial: SettingsSnapshot,
    ) -> Result<Self, ContractError> {
        Self::builder(ctx, id)
            .sinks(sinks)
            .mode(mode)
            .stamp(stamp)
            .settings(initial)
            .build()
    }

    pub fn builder(ctx: &Arc<BroadcastContext>, id: ChannelId) -> ChannelBuilder {
        ChannelBuilder {
            ctx: Arc::clone(ctx),
            id,
            name: None,
            sinks: Vec::new(),
            mode: BroadcastMode::default(),
            stamp: Arc::new(NullStamp),
            settings: SettingsSnapshot::default(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> BroadcastMode {
        self.mode
    }

    /// Switch the concurrency model for subsequent flushes.
    pub fn set_mode(&mut self, mode: BroadcastMode) {
        self.mode = mode;
    }

    /// Number of sinks this channel was attached to.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn context(&self) -> &Arc<BroadcastContext> {
        &self.ctx
    }

    /// Staged payload length, excluding the stamp reservation.
    pub fn pending_len(&self) -> usize {
        self.staging.len() - self.reserved
    }

    /// Stage bytes; touches no shared state.
    pub fn write(&mut self, bytes: &[u8]) {
        self.staging.extend_from_slice(bytes);
    }

    /// Stage wide text through `transcoder`, returning the bytes staged.
    pub fn write_wide(&mut self, transcoder: &dyn Transcoder, text: WideText<'_>) -> usize {
        transcoder.convert(text, &mut self.staging)
    }

    /// Broadcast the staged message and start a new one.
    ///
    /// Blocks until every attached sink is written, filtered or gone.
    /// The channel id's current priority is reset to its default.
    #[instrument(
        name = "channel_flush",
        level = "trace",
        skip(self),
        fields(channel = %self.id, mode = ?self.mode)
    )]
    pub fn flush(&mut self) -> FlushReport {
        let settings = self.ctx.settings().get(self.id);
        let payload_len = self.staging.len() - self.reserved;

        let report = if settings.can_be_output() {
            let stamp_len = self.stamp.render_tail(&mut self.staging[..self.reserved]);
            let mut report = FlushReport::broadcast(self.id, payload_len, stamp_len);

            let broadcast = Broadcast {
                channel: self.id,
                sinks: &self.sinks,
                message: &self.staging[self.reserved - stamp_len..],
            };
            match self.mode {
                BroadcastMode::Concurrent => {
                    broadcast.run_concurrent(self.ctx.retry_policy(), &mut report)
                }
                BroadcastMode::SingleThreaded => broadcast.run_sequential(&mut report),
            }

            trace!(
                channel = %self.id,
                written = report.written,
                filtered = report.filtered,
                vanished = report.vanished,
                rounds = report.rounds,
                "Message broadcast"
            );
            report
        } else {
            trace!(channel = %self.id, payload_len, "Message filtered");
            FlushReport::filtered(self.id, payload_len)
        };

        self.staging.truncate(self.reserved);
        settings.reset_priority();
        observability::record_flush(&report);
        report
    }
}

impl SettingsTarget for Channel {
    fn settings(&self) -> &ChannelSettings {
        self.ctx.settings().get(self.id)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        for sink in &self.sinks {
            self.ctx.sinks().detach(sink.id);
        }
        let remaining = self.ctx.settings().release(self.id);
        observability::record_channel_refcount(self.id, remaining);
        debug!(channel = %self.id, name = %self.name, remaining, "Channel closed");
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("sinks", &self.sinks.len())
            .field("mode", &self.mode)
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl io::Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Channel::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Channel::flush(self);
        Ok(())
    }
}

impl fmt::Write for Channel {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Channel::write(self, s.as_bytes());
        Ok(())
    }
}

/// Builder for [`Channel`]
pub struct ChannelBuilder {
    ctx: Arc<BroadcastContext>,
    id: ChannelId,
    name: Option<String>,
    sinks: Vec<Sink>,
    mode: BroadcastMode,
    stamp: Arc<dyn Stamp>,
    settings: SettingsSnapshot,
}

impl ChannelBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sink(mut self, sink: &Sink) -> Self {
        self.sinks.push(sink.clone());
        self
    }

    pub fn sinks<'a>(mut self, sinks: impl IntoIterator<Item = &'a Sink>) -> Self {
        self.sinks.extend(sinks.into_iter().cloned());
        self
    }

    pub fn mode(mut self, mode: BroadcastMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn stamp(mut self, stamp: Arc<dyn Stamp>) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn settings(mut self, settings: SettingsSnapshot) -> Self {
        self.settings = settings;
        self
    }

    /// Register with both registries.
    ///
    /// # Errors
    /// `UnknownSink` for a sink from another context, `SinkTableFull` when
    /// the sink table has no room. Nothing stays registered on error.
    #[instrument(
        name = "channel_build",
        skip(self),
        fields(channel = %self.id, sinks = self.sinks.len(), mode = ?self.mode)
    )]
    pub fn build(self) -> Result<Channel, ContractError> {
        let ctx = self.ctx;
        let id = self.id;

        if let Some(foreign) = self.sinks.iter().find(|sink| !sink.belongs_to(&ctx)) {
            return Err(ContractError::UnknownSink(format!(
                "{} ({}) belongs to another context",
                foreign.name(),
                foreign.id()
            )));
        }

        let refcount = ctx.settings().acquire(id, self.settings);

        let mut attached: Vec<SinkRef> = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            if attached.iter().any(|existing| existing.id == sink.id()) {
                continue;
            }
            if let Err(e) = ctx.sinks().attach(sink.inner()) {
                for done in &attached {
                    ctx.sinks().detach(done.id);
                }
                ctx.settings().release(id);
                return Err(e);
            }
            attached.push(SinkRef::new(sink.inner()));
        }

        let reserved = self.stamp.max_len();
        let mut staging = Vec::with_capacity(reserved + 256);
        staging.resize(reserved, PLACEHOLDER);

        let name = self.name.unwrap_or_else(|| format!("channel-{id}"));
        observability::record_channel_refcount(id, refcount);
        debug!(channel = %id, %name, refcount, sinks = attached.len(), "Channel opened");

        Ok(Channel {
            id,
            name,
            ctx,
            sinks: attached,
            staging,
            reserved,
            mode: self.mode,
            stamp: self.stamp,
        })
    }
}
