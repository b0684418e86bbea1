//! The capability interface every chat network adapter implements.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::common::error::{CommandError, ConnectError};
use crate::common::messages::TransportEvent;
use crate::common::types::{ChannelRef, Side};

/// Sender handed to a transport on every connect attempt.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A persistent connection to one chat network.
///
/// `connect` returns once the handshake has succeeded. Everything after that
/// (`Ready`, topic changes, the eventual `Disconnected`) arrives on `events`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which side of the bridge this transport serves.
    fn side(&self) -> Side;

    async fn connect(&self, events: EventSender) -> Result<(), ConnectError>;

    /// Longest topic, in bytes, the network keeps for `channel`.
    fn topic_limit(&self, _channel: &ChannelRef) -> Option<usize> {
        None
    }

    async fn set_topic(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError>;

    async fn send_notice(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError>;

    /// Tear down the current session, if any.
    async fn close(&self);
}
