//! Bridge core: the single serialized decision point for topic changes.
//!
//! All transport events arrive on one queue and are handled one at a time by
//! [`TopicBridge::run`]. That single consumer owns the topic store, which is
//! what makes the duplicate check race-free across both networks.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::common::messages::{BridgeEvent, TransportEvent};
use crate::common::transport::Transport;
use crate::common::types::{ChannelRef, Side};

use super::alert::AlertFormatter;
use super::barrier::ReadinessBarrier;
use super::pairing::ChannelPairing;
use super::state::{cap_topic, normalize_topic, TopicStore, UpdateOutcome};

/// The transports for both sides.
#[derive(Clone)]
pub struct Transports {
    pub irc: Arc<dyn Transport>,
    pub discord: Arc<dyn Transport>,
}

impl Transports {
    pub fn get(&self, side: Side) -> &Arc<dyn Transport> {
        match side {
            Side::Irc => &self.irc,
            Side::Discord => &self.discord,
        }
    }
}

/// What the bridge did with a topic change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicDecision {
    /// The channel has no configured peer.
    Untracked,
    /// New topic stored and forwarded to the peer.
    Applied,
    /// Same as the stored topic; not forwarded.
    Duplicate,
}

/// A topic change held back until the bridge goes live.
#[derive(Debug)]
struct PendingTopic {
    side: Side,
    channel: ChannelRef,
    text: String,
    actor: Option<String>,
}

/// The bridge core.
pub struct TopicBridge {
    pairing: ChannelPairing,
    store: TopicStore,
    barrier: ReadinessBarrier,
    pending: VecDeque<PendingTopic>,
    transports: Transports,
    alert: Option<AlertFormatter>,
}

impl TopicBridge {
    pub fn new(pairing: ChannelPairing, transports: Transports, alert: Option<AlertFormatter>) -> Self {
        let store = TopicStore::new(pairing.pair_ids());
        Self {
            pairing,
            store,
            barrier: ReadinessBarrier::new(),
            pending: VecDeque::new(),
            transports,
            alert,
        }
    }

    /// Consume the event queue until every sender is gone.
    pub async fn run(mut self, mut events_rx: mpsc::UnboundedReceiver<BridgeEvent>) {
        info!("Bridge waiting for both sides to become ready");
        while let Some(event) = events_rx.recv().await {
            self.handle_event(event).await;
        }
        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "Bridge stopped with topic changes still waiting for readiness"
            );
        }
        info!("Bridge event loop ended");
    }

    /// Process one queued event.
    pub async fn handle_event(&mut self, event: BridgeEvent) {
        let BridgeEvent { side, event } = event;
        match event {
            TransportEvent::Ready => {
                info!(%side, "Side is ready");
                if self.barrier.notify_ready(side) {
                    info!(queued = self.pending.len(), "Both sides ready, bridge is live");
                    self.drain_pending().await;
                }
            }
            TransportEvent::TopicChanged {
                channel,
                text,
                actor,
            } => {
                if self.barrier.is_live() {
                    self.on_topic_changed(side, &channel, &text, actor.as_deref())
                        .await;
                } else {
                    debug!(
                        %side,
                        %channel,
                        waiting_on = self.barrier.remaining(),
                        "Bridge not live yet, queueing topic change"
                    );
                    self.pending.push_back(PendingTopic {
                        side,
                        channel,
                        text,
                        actor,
                    });
                }
            }
            TransportEvent::Disconnected { reason } => {
                warn!(%side, %reason, "Side disconnected");
                if self.barrier.notify_disconnected(side) {
                    info!(%side, "Bridge paused until the side is ready again");
                }
            }
        }
    }

    async fn drain_pending(&mut self) {
        while self.barrier.is_live() {
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            self.on_topic_changed(
                pending.side,
                &pending.channel,
                &pending.text,
                pending.actor.as_deref(),
            )
            .await;
        }
    }

    /// Decide what to do with a topic change and carry it out.
    pub async fn on_topic_changed(
        &mut self,
        origin: Side,
        channel: &ChannelRef,
        raw_text: &str,
        actor: Option<&str>,
    ) -> TopicDecision {
        let Some((pair, peer_channel)) = self.pairing.resolve_peer(origin, channel) else {
            debug!(%origin, %channel, "Channel not tracked, ignoring topic event");
            return TopicDecision::Untracked;
        };
        let peer_channel = peer_channel.clone();
        let mut text = normalize_topic(raw_text);

        // Store what the peer will actually keep, so its echo is a duplicate
        let peer = origin.peer();
        if let Some(limit) = self.transports.get(peer).topic_limit(&peer_channel) {
            if text.len() > limit {
                warn!(
                    %peer,
                    channel = %peer_channel,
                    limit,
                    "Topic too long for peer, truncating"
                );
                text = cap_topic(text, limit);
            }
        }

        info!(
            %origin,
            %channel,
            %pair,
            actor = actor.unwrap_or("unknown"),
            "Topic changed: {}",
            text
        );

        match self.store.try_update(pair, text, origin) {
            UpdateOutcome::Applied => {
                info!(%peer, channel = %peer_channel, "Forwarding topic");
                if let Err(e) = self
                    .transports
                    .get(peer)
                    .set_topic(&peer_channel, text)
                    .await
                {
                    error!(%peer, channel = %peer_channel, "Failed to set topic: {}", e);
                }
                TopicDecision::Applied
            }
            UpdateOutcome::Duplicate => {
                info!(%origin, %pair, "Duplicate topic, ignoring");
                if let Some(alert) = &self.alert {
                    let notice = alert.format(text);
                    debug!(%origin, %channel, "Posting topic alert");
                    if let Err(e) = self
                        .transports
                        .get(origin)
                        .send_notice(channel, &notice)
                        .await
                    {
                        error!(%origin, %channel, "Failed to post topic alert: {}", e);
                    }
                }
                TopicDecision::Duplicate
            }
        }
    }

    #[allow(dead_code)]
    pub fn store(&self) -> &TopicStore {
        &self.store
    }

    #[allow(dead_code)]
    pub fn is_live(&self) -> bool {
        self.barrier.is_live()
    }
}
