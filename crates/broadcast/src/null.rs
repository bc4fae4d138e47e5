//! NullChannel - a channel that swallows everything
//!
//! Drop-in replacement for [`Channel`](crate::Channel) in builds that turn
//! diagnostics off. Settings still work so callers can keep their
//! configuration code unchanged.

use std::fmt;
use std::io;

use contracts::{
    ChannelId, ChannelSettings, FlushReport, SettingsSnapshot, SettingsTarget, Transcoder,
    WideText,
};

/// Channel with no sinks and no registry footprint
#[derive(Debug)]
pub struct NullChannel {
    id: ChannelId,
    settings: ChannelSettings,
}

impl NullChannel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            settings: ChannelSettings::from_snapshot(SettingsSnapshot::default()),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn write(&mut self, _bytes: &[u8]) {}

    pub fn write_wide(&mut self, _transcoder: &dyn Transcoder, _text: WideText<'_>) -> usize {
        0
    }

    /// Always reports a filtered, empty message.
    pub fn flush(&mut self) -> FlushReport {
        self.settings.reset_priority();
        FlushReport::filtered(self.id, 0)
    }
}

impl SettingsTarget for NullChannel {
    fn settings(&self) -> &ChannelSettings {
        &self.settings
    }
}

impl io::Write for NullChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for NullChannel {
    fn write_str(&mut self, _s: &str) -> fmt::Result {
        Ok(())
    }
}
