//! Static channel pairing between the two networks.

use tracing::info;

use crate::common::error::ConfigError;
use crate::common::types::{ChannelRef, PairId, Side};
use crate::config::types::Config;

/// One channel on each network whose topics are kept in sync.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPair {
    pub irc: ChannelRef,
    pub discord: ChannelRef,
}

impl ChannelPair {
    pub fn new(irc: impl Into<String>, discord: impl Into<String>) -> Self {
        Self {
            irc: ChannelRef::new(irc),
            discord: ChannelRef::new(discord),
        }
    }

    /// The channel of this pair on the given side.
    pub fn channel(&self, side: Side) -> &ChannelRef {
        match side {
            Side::Irc => &self.irc,
            Side::Discord => &self.discord,
        }
    }
}

/// Bidirectional `channel -> peer channel` lookup. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ChannelPairing {
    pairs: Vec<ChannelPair>,
}

impl ChannelPairing {
    /// Build a pairing, rejecting anything that is not a bijection.
    pub fn new(pairs: Vec<ChannelPair>) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();

        if pairs.is_empty() {
            errors.push("no channel pair configured".to_string());
        }

        for (i, pair) in pairs.iter().enumerate() {
            for side in [Side::Irc, Side::Discord] {
                let channel = pair.channel(side);
                if channel.as_str().is_empty() {
                    errors.push(format!("pair {} has an empty {} channel", i, side));
                }
                if pairs[..i].iter().any(|other| other.channel(side) == channel) {
                    errors.push(format!(
                        "{} channel '{}' is paired more than once",
                        side, channel
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(Self { pairs })
        } else {
            Err(ConfigError::ValidationError {
                message: errors.join("\n"),
            })
        }
    }

    /// Build the single configured IRC <-> Discord pair.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let pair = ChannelPair::new(
            config.irc.channel.clone(),
            config.discord.channel_id.to_string(),
        );
        info!(
            irc = %pair.irc,
            discord = %pair.discord,
            "Pairing IRC channel with Discord channel"
        );
        Self::new(vec![pair])
    }

    /// Resolve the peer of a channel seen on `side`.
    ///
    /// Returns `None` for channels that are not tracked.
    pub fn resolve_peer(&self, side: Side, channel: &ChannelRef) -> Option<(PairId, &ChannelRef)> {
        self.pairs
            .iter()
            .position(|pair| pair.channel(side) == channel)
            .map(|i| (PairId(i), self.pairs[i].channel(side.peer())))
    }

    pub fn pair_ids(&self) -> impl Iterator<Item = PairId> {
        (0..self.pairs.len()).map(PairId)
    }
}
