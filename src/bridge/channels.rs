//! Bridge channel management.
//!
//! Groups the queue feeding the bridge core and the shutdown signal shared
//! by every task.

use tokio::sync::{mpsc, watch};

use crate::common::messages::BridgeEvent;

/// The single serialized event queue.
pub struct BridgeChannels {
    /// Cloned into every connection supervisor.
    pub events_tx: mpsc::UnboundedSender<BridgeEvent>,
    /// Consumed by the bridge core task.
    pub events_rx: mpsc::UnboundedReceiver<BridgeEvent>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
    /// Receiver cloned into each supervisor.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Bundle of all channels created for the bridge.
pub struct ChannelBundle {
    pub bridge: BridgeChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            bridge: BridgeChannels {
                events_tx,
                events_rx,
            },
            control: ControlChannels {
                shutdown_tx,
                shutdown_rx,
            },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
