//! ChannelId / SinkId - small copyable identifiers
//!
//! `ChannelId` indexes the per-channel settings table, so it can only be
//! constructed for values below [`MAX_CHANNELS`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::ContractError;

/// Number of distinct channel ids (size of the settings table).
pub const MAX_CHANNELS: usize = 64;

/// Channel identifier, guaranteed `< MAX_CHANNELS`.
///
/// # Examples
/// ```
/// use contracts::ChannelId;
///
/// let id = ChannelId::new(3).unwrap();
/// assert_eq!(id.index(), 3);
/// assert!(ChannelId::new(64).is_err());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a channel id, rejecting values outside the settings table.
    #[inline]
    pub fn new(id: usize) -> Result<Self, ContractError> {
        if id < MAX_CHANNELS {
            Ok(Self(id as u8))
        } else {
            Err(ContractError::ChannelIdOutOfRange {
                id,
                max: MAX_CHANNELS - 1,
            })
        }
    }

    /// Create a channel id from a value known at compile time.
    ///
    /// # Panics
    /// Panics if `id >= MAX_CHANNELS`. An out-of-range id is a fatal
    /// configuration error, not a recoverable one.
    pub const fn from_const(id: usize) -> Self {
        assert!(id < MAX_CHANNELS, "channel id out of range");
        Self(id as u8)
    }

    /// Index into the settings table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<usize> for ChannelId {
    type Error = ContractError;

    fn try_from(id: usize) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ChannelId> for usize {
    #[inline]
    fn from(id: ChannelId) -> Self {
        id.index()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl Serialize for ChannelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = usize::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Stable sink identity issued by a broadcast context.
///
/// Ids are handed out from a monotonic counter and never reused within
/// one context, so a stale id can never alias a newer sink.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl SinkId {
    /// Wrap a raw id. Only contexts should mint these.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

impl fmt::Debug for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SinkId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_channel_id_bounds() {
        assert!(ChannelId::new(0).is_ok());
        assert_eq!(ChannelId::new(63).unwrap().index(), 63);

        let err = ChannelId::new(MAX_CHANNELS).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    #[should_panic(expected = "channel id out of range")]
    fn test_from_const_panics_out_of_range() {
        let _ = ChannelId::from_const(MAX_CHANNELS);
    }

    #[test]
    fn test_serde() {
        let id = ChannelId::new(7).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");

        let parsed: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        let rejected: Result<ChannelId, _> = serde_json::from_str("64");
        assert!(rejected.is_err());
    }

    #[test]
    fn test_sink_id_hash_key() {
        let mut set = HashSet::new();
        set.insert(SinkId::from_raw(1));
        set.insert(SinkId::from_raw(1));
        set.insert(SinkId::from_raw(2));
        assert_eq!(set.len(), 2);
        assert_eq!(SinkId::from_raw(9).to_string(), "sink#9");
    }
}
