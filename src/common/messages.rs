//! Event types flowing from the transports into the bridge.

use crate::common::types::{ChannelRef, Side};

/// An event emitted by one transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The tracked channel is joined and events are flowing.
    Ready,
    /// The topic of a channel changed.
    TopicChanged {
        channel: ChannelRef,
        text: String,
        /// Who changed it, when the network reports it.
        actor: Option<String>,
    },
    /// The session ended.
    Disconnected { reason: String },
}

/// A transport event tagged with the side it came from.
///
/// This is the item type of the single serialized bridge queue.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeEvent {
    pub side: Side,
    pub event: TransportEvent,
}

impl BridgeEvent {
    pub fn new(side: Side, event: TransportEvent) -> Self {
        Self { side, event }
    }
}
