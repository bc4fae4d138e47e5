//! Output settings shared by channels and sinks
//!
//! Priority is inverted: `0` is the most severe message. A message passes
//! when the target is enabled and `current_priority <= filter`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Most severe priority.
pub const PRIORITY_MAX: u8 = 0;
/// Priority of a message that did not ask for one.
pub const PRIORITY_DEFAULT: u8 = 1;
/// Filter that lets every priority through.
pub const FILTER_DEFAULT: u8 = u8::MAX;

/// Requested initial settings for a channel or sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// Output enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Default (and initial current) priority
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Least severe priority let through
    #[serde(default = "default_filter")]
    pub filter: u8,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u8 {
    PRIORITY_DEFAULT
}

fn default_filter() -> u8 {
    FILTER_DEFAULT
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: PRIORITY_DEFAULT,
            filter: FILTER_DEFAULT,
        }
    }
}

/// Live settings with individually atomic fields.
///
/// No cross-field consistency is promised: a reader racing a writer may
/// observe a new filter with an old priority.
#[derive(Debug)]
pub struct ChannelSettings {
    enabled: AtomicBool,
    current_priority: AtomicU8,
    default_priority: AtomicU8,
    filter: AtomicU8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::from_snapshot(SettingsSnapshot::default())
    }
}

impl ChannelSettings {
    pub fn from_snapshot(snapshot: SettingsSnapshot) -> Self {
        Self {
            enabled: AtomicBool::new(snapshot.enabled),
            current_priority: AtomicU8::new(snapshot.priority),
            default_priority: AtomicU8::new(snapshot.priority),
            filter: AtomicU8::new(snapshot.filter),
        }
    }

    /// Overwrite every field from `snapshot`.
    pub fn seed(&self, snapshot: SettingsSnapshot) {
        self.enable(snapshot.enabled);
        self.set_default_priority(snapshot.priority);
        self.set_filter(snapshot.filter);
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            enabled: self.get_enable(),
            priority: self.get_default_priority(),
            filter: self.get_filter(),
        }
    }

    pub fn enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn get_enable(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_priority(&self, priority: u8) {
        self.current_priority.store(priority, Ordering::Relaxed);
    }

    pub fn get_priority(&self) -> u8 {
        self.current_priority.load(Ordering::Relaxed)
    }

    /// Set the default priority; the current priority follows it.
    pub fn set_default_priority(&self, priority: u8) {
        self.default_priority.store(priority, Ordering::Relaxed);
        self.current_priority.store(priority, Ordering::Relaxed);
    }

    pub fn get_default_priority(&self) -> u8 {
        self.default_priority.load(Ordering::Relaxed)
    }

    pub fn set_filter(&self, filter: u8) {
        self.filter.store(filter, Ordering::Relaxed);
    }

    pub fn get_filter(&self) -> u8 {
        self.filter.load(Ordering::Relaxed)
    }

    /// Drop any single-message priority override.
    pub fn reset_priority(&self) {
        self.set_priority(self.get_default_priority());
    }

    /// Whether a message at the current priority passes.
    pub fn can_be_output(&self) -> bool {
        self.get_enable() && self.get_priority() <= self.get_filter()
    }
}

/// A single settings change, applied with [`SettingsTarget::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Enable(bool),
    Priority(u8),
    DefaultPriority(u8),
    Filter(u8),
}

impl Setting {
    /// Apply this change to raw settings storage.
    pub fn apply_to(self, settings: &ChannelSettings) {
        match self {
            Setting::Enable(enabled) => settings.enable(enabled),
            Setting::Priority(priority) => settings.set_priority(priority),
            Setting::DefaultPriority(priority) => settings.set_default_priority(priority),
            Setting::Filter(filter) => settings.set_filter(filter),
        }
    }
}

/// Anything that exposes output settings: channels and standalone sinks.
///
/// ```ignore
/// channel
///     .apply(Setting::DefaultPriority(3))
///     .apply(Setting::Filter(4));
/// ```
pub trait SettingsTarget {
    /// Settings storage the changes land in.
    fn settings(&self) -> &ChannelSettings;

    /// Apply one change and return `self` for chaining.
    fn apply(&self, setting: Setting) -> &Self
    where
        Self: Sized,
    {
        setting.apply_to(self.settings());
        self
    }

    fn enable(&self, enabled: bool) -> &Self
    where
        Self: Sized,
    {
        self.apply(Setting::Enable(enabled))
    }

    fn set_priority(&self, priority: u8) -> &Self
    where
        Self: Sized,
    {
        self.apply(Setting::Priority(priority))
    }

    fn set_default_priority(&self, priority: u8) -> &Self
    where
        Self: Sized,
    {
        self.apply(Setting::DefaultPriority(priority))
    }

    fn set_filter(&self, filter: u8) -> &Self
    where
        Self: Sized,
    {
        self.apply(Setting::Filter(filter))
    }

    fn get_enable(&self) -> bool {
        self.settings().get_enable()
    }

    fn get_priority(&self) -> u8 {
        self.settings().get_priority()
    }

    fn get_default_priority(&self) -> u8 {
        self.settings().get_default_priority()
    }

    fn get_filter(&self) -> u8 {
        self.settings().get_filter()
    }

    fn can_be_output(&self) -> bool {
        self.settings().can_be_output()
    }
}

impl SettingsTarget for ChannelSettings {
    fn settings(&self) -> &ChannelSettings {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ChannelSettings::default();
        assert!(settings.get_enable());
        assert_eq!(settings.get_priority(), PRIORITY_DEFAULT);
        assert_eq!(settings.get_default_priority(), PRIORITY_DEFAULT);
        assert_eq!(settings.get_filter(), FILTER_DEFAULT);
        assert!(settings.can_be_output());
    }

    #[test]
    fn test_filter_boundary() {
        let settings = ChannelSettings::default();
        settings.set_filter(5);

        settings.set_priority(5);
        assert!(settings.can_be_output());

        settings.set_priority(6);
        assert!(!settings.can_be_output());
    }

    #[test]
    fn test_filter_zero_does_not_wrap() {
        let settings = ChannelSettings::default();
        settings.set_filter(0);

        settings.set_priority(PRIORITY_MAX);
        assert!(settings.can_be_output());

        settings.set_priority(1);
        assert!(!settings.can_be_output());

        settings.set_priority(u8::MAX);
        assert!(!settings.can_be_output());
    }

    #[test]
    fn test_disabled_blocks_everything() {
        let settings = ChannelSettings::default();
        settings.enable(false);
        settings.set_priority(PRIORITY_MAX);
        assert!(!settings.can_be_output());
    }

    #[test]
    fn test_default_priority_resets_current() {
        let settings = ChannelSettings::default();
        settings.set_priority(9);
        settings.set_default_priority(4);
        assert_eq!(settings.get_priority(), 4);

        settings.set_priority(0);
        settings.reset_priority();
        assert_eq!(settings.get_priority(), 4);
    }

    #[test]
    fn test_chained_apply() {
        let settings = ChannelSettings::default();
        settings
            .apply(Setting::Enable(false))
            .apply(Setting::DefaultPriority(6))
            .apply(Setting::Filter(5));

        assert_eq!(
            settings.snapshot(),
            SettingsSnapshot {
                enabled: false,
                priority: 6,
                filter: 5,
            }
        );
    }

    #[test]
    fn test_snapshot_serde_defaults() {
        let parsed: SettingsSnapshot = serde_json::from_str(r#"{"filter": 3}"#).unwrap();
        assert!(parsed.enabled);
        assert_eq!(parsed.priority, PRIORITY_DEFAULT);
        assert_eq!(parsed.filter, 3);
    }
}
