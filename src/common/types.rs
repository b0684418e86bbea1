//! Core types shared by the bridge and the transports.

use std::fmt;

/// One of the two chat networks taking part in a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Irc,
    Discord,
}

impl Side {
    /// The opposite side of the bridge.
    pub fn peer(self) -> Side {
        match self {
            Side::Irc => Side::Discord,
            Side::Discord => Side::Irc,
        }
    }

    /// Slot index used by fixed-size per-side tables.
    pub fn index(self) -> usize {
        match self {
            Side::Irc => 0,
            Side::Discord => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Irc => write!(f, "irc"),
            Side::Discord => write!(f, "discord"),
        }
    }
}

/// A channel identifier on one network.
///
/// IRC channels are names like `#general`, Discord channels are numeric IDs
/// rendered as strings. Comparison ignores ASCII case since IRC servers are
/// free to echo a channel name back with different casing.
#[derive(Debug, Clone, Eq)]
pub struct ChannelRef(String);

impl ChannelRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ChannelRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifies a configured channel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(pub usize);

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair#{}", self.0)
    }
}
