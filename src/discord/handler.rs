//! Discord gateway event handling.
//!
//! Translates serenity callbacks into transport events for the supervisor.

use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::model::channel::GuildChannel;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use tracing::{debug, info, warn};

use crate::common::messages::TransportEvent;
use crate::common::transport::EventSender;
use crate::common::types::ChannelRef;

/// Event handler registered with the serenity client.
pub struct TopicEvents {
    events: EventSender,
    channel_id: ChannelId,
}

impl TopicEvents {
    pub fn new(events: EventSender, channel_id: ChannelId) -> Self {
        Self { events, channel_id }
    }

    fn emit(&self, event: TransportEvent) {
        if let Err(e) = self.events.send(event) {
            warn!("Failed to process discord event: {}", e);
        }
    }
}

#[async_trait]
impl EventHandler for TopicEvents {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        match ctx.http.get_channel(self.channel_id).await {
            Ok(channel) => debug!("Tracked Discord channel resolved: {}", channel),
            Err(e) => warn!(
                channel_id = %self.channel_id,
                "Tracked Discord channel is not accessible: {}",
                e
            ),
        }

        info!("Discord is connected and ready to go!");
        self.emit(TransportEvent::Ready);
    }

    async fn channel_update(&self, _ctx: Context, _old: Option<GuildChannel>, new: GuildChannel) {
        debug!(
            "Discord ChannelUpdate in {} ({}): {:?}",
            new.name, new.id, new.topic
        );
        self.emit(topic_changed(new.id, new.topic.as_deref()));
    }
}

/// Discord does not say who edited a channel, and a cleared topic is `None`.
pub fn topic_changed(channel_id: ChannelId, topic: Option<&str>) -> TransportEvent {
    TransportEvent::TopicChanged {
        channel: ChannelRef::new(channel_id.get().to_string()),
        text: topic.unwrap_or_default().to_string(),
        actor: None,
    }
}
