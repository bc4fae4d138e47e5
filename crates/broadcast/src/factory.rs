//! Build sinks and channels from configuration

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use contracts::{Backend, BackendKind, ChannelConfig, SinkConfig, StreamcastConfig};

use crate::backends::{FileBackend, MemoryBackend, MemoryBuffer, StdoutBackend, TracingBackend};
use crate::channel::Channel;
use crate::context::BroadcastContext;
use crate::error::BroadcastError;
use crate::sink::Sink;
use crate::stamps;

/// Create a sink from its configuration.
pub fn create_sink(
    ctx: &Arc<BroadcastContext>,
    config: &SinkConfig,
) -> Result<Sink, BroadcastError> {
    create_sink_with_buffer(ctx, config).map(|(sink, _)| sink)
}

#[instrument(
    name = "factory_create_sink",
    skip(ctx, config),
    fields(sink = %config.name, backend = ?config.backend)
)]
fn create_sink_with_buffer(
    ctx: &Arc<BroadcastContext>,
    config: &SinkConfig,
) -> Result<(Sink, Option<MemoryBuffer>), BroadcastError> {
    let mut buffer = None;
    let backend: Box<dyn Backend> = match config.backend {
        BackendKind::Memory => {
            let memory = MemoryBackend::new(&config.name);
            buffer = Some(memory.buffer());
            Box::new(memory)
        }
        BackendKind::File => Box::new(
            FileBackend::from_params(&config.name, &config.params)
                .map_err(|e| BroadcastError::sink_creation(&config.name, e.to_string()))?,
        ),
        BackendKind::Stdout => Box::new(StdoutBackend::new(&config.name)),
        BackendKind::Tracing => Box::new(TracingBackend::new(&config.name)),
    };

    let sink = Sink::builder(ctx, &config.name, backend)
        .stamp(stamps::from_kind(&config.stamp))
        .settings(config.settings)
        .build();
    Ok((sink, buffer))
}

/// Every configured sink, plus the channel recipes that use them
///
/// Channels are per thread: each thread calls [`Topology::channel`] for
/// its own instance.
#[derive(Debug)]
pub struct Topology {
    ctx: Arc<BroadcastContext>,
    sinks: Vec<Sink>,
    buffers: HashMap<String, MemoryBuffer>,
    channels: Vec<ChannelConfig>,
}

impl Topology {
    pub fn context(&self) -> &Arc<BroadcastContext> {
        &self.ctx
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    pub fn sink(&self, name: &str) -> Option<&Sink> {
        self.sinks.iter().find(|sink| sink.name() == name)
    }

    /// Inspection handle of a memory sink.
    pub fn memory_buffer(&self, name: &str) -> Option<&MemoryBuffer> {
        self.buffers.get(name)
    }

    pub fn channel_configs(&self) -> &[ChannelConfig] {
        &self.channels
    }

    /// Open a new channel instance for the named recipe.
    pub fn channel(&self, name: &str) -> Result<Channel, BroadcastError> {
        let config = self
            .channels
            .iter()
            .find(|channel| channel.name == name)
            .ok_or_else(|| BroadcastError::UnknownChannel(name.to_string()))?;

        let mut sinks = Vec::with_capacity(config.sinks.len());
        for sink_name in &config.sinks {
            let sink = self
                .sink(sink_name)
                .ok_or_else(|| BroadcastError::UnknownSinkReference {
                    channel: config.name.clone(),
                    sink: sink_name.clone(),
                })?;
            sinks.push(sink);
        }

        let channel = Channel::builder(&self.ctx, config.id)
            .name(&config.name)
            .sinks(sinks)
            .mode(config.mode)
            .stamp(stamps::from_kind(&config.stamp))
            .settings(config.settings)
            .build()?;
        Ok(channel)
    }
}

/// Create every configured sink and check channel references.
#[instrument(
    name = "factory_build_topology",
    skip(ctx, config),
    fields(sinks = config.sinks.len(), channels = config.channels.len())
)]
pub fn build_topology(
    ctx: &Arc<BroadcastContext>,
    config: &StreamcastConfig,
) -> Result<Topology, BroadcastError> {
    for channel in &config.channels {
        if let Some(missing) = channel.sinks.iter().find(|s| config.sink(s).is_none()) {
            return Err(BroadcastError::UnknownSinkReference {
                channel: channel.name.clone(),
                sink: missing.clone(),
            });
        }
    }

    let mut sinks = Vec::with_capacity(config.sinks.len());
    let mut buffers = HashMap::new();
    for sink_config in &config.sinks {
        let (sink, buffer) = create_sink_with_buffer(ctx, sink_config)?;
        if let Some(buffer) = buffer {
            buffers.insert(sink_config.name.clone(), buffer);
        }
        sinks.push(sink);
    }

    info!(
        sinks = sinks.len(),
        channels = config.channels.len(),
        "Topology built"
    );

    Ok(Topology {
        ctx: Arc::clone(ctx),
        sinks,
        buffers,
        channels: config.channels.clone(),
    })
}
