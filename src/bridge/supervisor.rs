//! Connection supervisor.
//!
//! Drives one transport through `Disconnected -> Connecting -> Connected ->
//! Ready` and back, retrying forever with a fixed backoff. Every event the
//! transport emits is tagged with its side and forwarded to the bridge queue.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::common::messages::{BridgeEvent, TransportEvent};
use crate::common::reconnect::ReconnectConfig;
use crate::common::transport::Transport;
use crate::common::types::Side;

/// Connection state of one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Handshake done, channel not joined yet.
    Connected,
    /// Channel joined, events flowing.
    Ready,
}

/// How a live session ended.
enum SessionEnd {
    Disconnected,
    Shutdown,
}

pub struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    reconnect: ReconnectConfig,
    bridge_tx: mpsc::UnboundedSender<BridgeEvent>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        reconnect: ReconnectConfig,
        bridge_tx: mpsc::UnboundedSender<BridgeEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            reconnect,
            bridge_tx,
            state_tx,
            shutdown_rx,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Run the connect loop until shutdown.
    pub async fn run(mut self) {
        let side = self.transport.side();
        let mut backoff = self.reconnect.backoff();

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            info!(%side, "Connecting...");
            self.set_state(ConnectionState::Connecting);

            let (events_tx, mut events_rx) = mpsc::unbounded_channel();
            let result = tokio::select! {
                result = self.transport.connect(events_tx) => result,
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!(%side, "Shutdown signal received while connecting");
                    break;
                }
            };

            match result {
                Ok(()) => {
                    info!(%side, "Connected");
                    self.set_state(ConnectionState::Connected);
                    // Reset backoff on successful connection
                    backoff = self.reconnect.backoff();

                    match self.pump_session(side, &mut events_rx).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Disconnected => {}
                    }
                }
                Err(e) => {
                    error!(%side, "Connection failed: {}", e);
                }
            }

            self.set_state(ConnectionState::Disconnected);

            let delay = backoff.next().unwrap_or(self.reconnect.delay);
            info!(%side, "Reconnecting in {:.1} seconds...", delay.as_secs_f64());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!(%side, "Shutdown signal received during backoff");
                    break;
                }
            }
        }

        self.transport.close().await;
        self.set_state(ConnectionState::Disconnected);
        info!(%side, "Supervisor stopped");
    }

    /// Forward session events to the bridge until the session ends.
    async fn pump_session(
        &mut self,
        side: Side,
        events_rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> SessionEnd {
        loop {
            let event = tokio::select! {
                event = events_rx.recv() => event,
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!(%side, "Shutdown signal received, closing session");
                    return SessionEnd::Shutdown;
                }
            };

            let event = event.unwrap_or_else(|| TransportEvent::Disconnected {
                reason: "event stream closed".to_string(),
            });

            let ended = match &event {
                TransportEvent::Ready => {
                    self.set_state(ConnectionState::Ready);
                    false
                }
                TransportEvent::TopicChanged { .. } => false,
                TransportEvent::Disconnected { reason } => {
                    warn!(%side, %reason, "Disconnected");
                    true
                }
            };

            if let Err(e) = self.bridge_tx.send(BridgeEvent::new(side, event)) {
                debug!(%side, "Bridge queue closed: {}", e);
            }

            if ended {
                return SessionEnd::Disconnected;
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

/// Log every state change of one side. Returns the last state seen once
/// the supervisor is gone.
pub async fn log_state_changes(
    side: Side,
    mut state_rx: watch::Receiver<ConnectionState>,
) -> ConnectionState {
    while state_rx.changed().await.is_ok() {
        let state = *state_rx.borrow_and_update();
        match state {
            ConnectionState::Disconnected => warn!(%side, ?state, "Connection state changed"),
            _ => info!(%side, ?state, "Connection state changed"),
        }
    }
    let last = *state_rx.borrow();
    last
}

/// Resolve once the shutdown flag is set or its sender is gone.
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::bridge::channels::ChannelBundle;
    use crate::bridge::orchestrator::{TopicBridge, Transports};
    use crate::bridge::pairing::{ChannelPair, ChannelPairing};
    use crate::bridge::testing::MockTransport;
    use crate::common::types::ChannelRef;

    const BACKOFF: Duration = Duration::from_secs(30);

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("condition not reached");
    }

    fn discord_topic(text: &str) -> TransportEvent {
        TransportEvent::TopicChanged {
            channel: ChannelRef::from("4242"),
            text: text.to_string(),
            actor: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_two_failed_connects() {
        let transport = Arc::new(
            MockTransport::new(Side::Irc)
                .fail_connects(2)
                .emit_on_connect(vec![TransportEvent::Ready]),
        );
        let (bridge_tx, mut bridge_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = ConnectionSupervisor::new(
            transport.clone(),
            ReconnectConfig::new(BACKOFF),
            bridge_tx,
            shutdown_rx,
        );
        let state_rx = supervisor.subscribe();

        let start = Instant::now();
        let handle = tokio::spawn(supervisor.run());

        let event = bridge_rx.recv().await.unwrap();
        assert_eq!(event, BridgeEvent::new(Side::Irc, TransportEvent::Ready));
        assert_eq!(transport.connect_attempts(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= BACKOFF * 2 && elapsed < BACKOFF * 3);
        assert_eq!(*state_rx.borrow(), ConnectionState::Ready);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(*state_rx.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_forwarded_and_retried() {
        let transport = Arc::new(
            MockTransport::new(Side::Discord).emit_on_connect(vec![TransportEvent::Ready]),
        );
        let (bridge_tx, mut bridge_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = ConnectionSupervisor::new(
            transport.clone(),
            ReconnectConfig::new(BACKOFF),
            bridge_tx,
            shutdown_rx,
        );
        let handle = tokio::spawn(supervisor.run());

        assert_eq!(bridge_rx.recv().await.unwrap().event, TransportEvent::Ready);

        transport.drop_connection("gateway closed");
        assert_eq!(
            bridge_rx.recv().await.unwrap().event,
            TransportEvent::Disconnected {
                reason: "gateway closed".to_string()
            }
        );

        // Reconnects after the backoff and reports ready again
        assert_eq!(bridge_rx.recv().await.unwrap().event, TransportEvent::Ready);
        assert_eq!(transport.connect_attempts(), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff_stops_retrying() {
        let transport = Arc::new(MockTransport::new(Side::Irc).fail_connects(usize::MAX));
        let (bridge_tx, _bridge_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = ConnectionSupervisor::new(
            transport.clone(),
            ReconnectConfig::new(BACKOFF),
            bridge_tx,
            shutdown_rx,
        );
        let handle = tokio::spawn(supervisor.run());

        wait_until(|| transport.connect_attempts() >= 2).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let attempts = transport.connect_attempts();
        tokio::time::sleep(BACKOFF * 3).await;
        assert_eq!(transport.connect_attempts(), attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_keeps_peer_events() {
        let irc = Arc::new(
            MockTransport::new(Side::Irc)
                .fail_connects(2)
                .emit_on_connect(vec![TransportEvent::Ready]),
        );
        let discord = Arc::new(
            MockTransport::new(Side::Discord)
                .emit_on_connect(vec![TransportEvent::Ready, discord_topic("Welcome")]),
        );

        let bundle = ChannelBundle::new();
        let pairing = ChannelPairing::new(vec![ChannelPair::new("#general", "4242")]).unwrap();
        let bridge = TopicBridge::new(
            pairing,
            Transports {
                irc: irc.clone(),
                discord: discord.clone(),
            },
            None,
        );

        let irc_supervisor = ConnectionSupervisor::new(
            irc.clone(),
            ReconnectConfig::new(BACKOFF),
            bundle.bridge.events_tx.clone(),
            bundle.control.shutdown_rx.clone(),
        );
        let discord_supervisor = ConnectionSupervisor::new(
            discord.clone(),
            ReconnectConfig::new(BACKOFF),
            bundle.bridge.events_tx.clone(),
            bundle.control.shutdown_rx.clone(),
        );
        let irc_state = irc_supervisor.subscribe();

        let bridge_task = tokio::spawn(bridge.run(bundle.bridge.events_rx));
        let irc_task = tokio::spawn(irc_supervisor.run());
        let discord_task = tokio::spawn(discord_supervisor.run());
        drop(bundle.bridge.events_tx);

        // The early Discord topic waits for IRC and is then forwarded once
        wait_until(|| irc.set_topics().len() == 1).await;
        assert_eq!(irc.connect_attempts(), 3);
        assert_eq!(*irc_state.borrow(), ConnectionState::Ready);

        // IRC drops, Discord changes the topic during the outage
        irc.drop_connection("ping timeout");
        assert!(discord.emit(discord_topic("Meeting")));

        wait_until(|| irc.connect_attempts() == 4 && irc.set_topics().len() == 2).await;
        tokio::time::sleep(BACKOFF).await;

        assert_eq!(
            irc.set_topics(),
            vec![
                ("#general".to_string(), "Welcome".to_string()),
                ("#general".to_string(), "Meeting".to_string()),
            ]
        );
        assert!(discord.set_topics().is_empty());
        assert_eq!(discord.connect_attempts(), 1);

        bundle.control.shutdown_tx.send(true).unwrap();
        irc_task.await.unwrap();
        discord_task.await.unwrap();
        bridge_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_log_follows_supervisor() {
        let transport = Arc::new(
            MockTransport::new(Side::Discord).emit_on_connect(vec![TransportEvent::Ready]),
        );
        let (bridge_tx, mut bridge_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = ConnectionSupervisor::new(
            transport.clone(),
            ReconnectConfig::new(BACKOFF),
            bridge_tx,
            shutdown_rx,
        );
        let logger = tokio::spawn(log_state_changes(Side::Discord, supervisor.subscribe()));
        let handle = tokio::spawn(supervisor.run());

        assert_eq!(
            bridge_rx.recv().await.unwrap(),
            BridgeEvent::new(Side::Discord, TransportEvent::Ready)
        );
        assert!(!logger.is_finished());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(logger.await.unwrap(), ConnectionState::Disconnected);
    }
}
