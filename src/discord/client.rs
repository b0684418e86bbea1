//! Discord transport.
//!
//! Wraps a serenity client: the gateway delivers `ready` and `channel_update`
//! events, topic edits and notices go through the REST API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serenity::builder::EditChannel;
use serenity::gateway::ShardManager;
use serenity::client::ClientBuilder;
use serenity::http::{Http, HttpBuilder};
use serenity::model::id::ChannelId;
use serenity::prelude::GatewayIntents;
use tracing::{error, info};

use crate::common::error::{CommandError, ConnectError};
use crate::common::messages::TransportEvent;
use crate::common::transport::{EventSender, Transport};
use crate::common::types::{ChannelRef, Side};
use crate::config::types::DiscordConfig;

use super::handler::TopicEvents;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DiscordTransport {
    token: String,
    channel_id: ChannelId,
    http: Arc<Http>,
    shard_manager: Mutex<Option<Arc<ShardManager>>>,
}

impl DiscordTransport {
    pub fn new(config: &DiscordConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            token: config.token.clone(),
            channel_id: ChannelId::new(config.channel_id),
            http: Arc::new(build_http(&config.token)?),
            shard_manager: Mutex::new(None),
        })
    }
}

/// REST client with bounded request times, so a stalled call cannot
/// block the bridge.
fn http_client(
    timeout: Duration,
    connect_timeout: Duration,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
}

fn build_http(token: &str) -> reqwest::Result<Http> {
    let client = http_client(REQUEST_TIMEOUT, CONNECT_TIMEOUT)?;
    Ok(HttpBuilder::new(token).client(client).build())
}

#[async_trait]
impl Transport for DiscordTransport {
    fn side(&self) -> Side {
        Side::Discord
    }

    async fn connect(&self, events: EventSender) -> Result<(), ConnectError> {
        info!("Connecting to Discord...");

        // Validates the token before the gateway is started
        let user = self
            .http
            .get_current_user()
            .await
            .map_err(connect_error)?;
        info!("Discord token accepted for {}", user.name);

        let handler = TopicEvents::new(events.clone(), self.channel_id);
        let http = build_http(&self.token).map_err(|e| ConnectError::Protocol {
            message: e.to_string(),
        })?;
        let mut client = ClientBuilder::new_with_http(http, GatewayIntents::GUILDS)
            .event_handler(handler)
            .await
            .map_err(connect_error)?;

        if let Ok(mut shard_manager) = self.shard_manager.lock() {
            *shard_manager = Some(client.shard_manager.clone());
        }

        tokio::spawn(async move {
            let reason = match client.start().await {
                Ok(()) => "gateway closed".to_string(),
                Err(e) => {
                    error!("Discord client error: {}", e);
                    e.to_string()
                }
            };
            let _ = events.send(TransportEvent::Disconnected { reason });
        });

        Ok(())
    }

    async fn set_topic(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError> {
        let channel_id = parse_channel_id(channel)?;
        channel_id
            .edit(&self.http, EditChannel::new().topic(text))
            .await
            .map(|_| ())
            .map_err(|e| command_error(channel, e))
    }

    async fn send_notice(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError> {
        let channel_id = parse_channel_id(channel)?;
        channel_id
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| command_error(channel, e))
    }

    async fn close(&self) {
        let shard_manager = self
            .shard_manager
            .lock()
            .ok()
            .and_then(|mut manager| manager.take());
        if let Some(manager) = shard_manager {
            info!("Initiating graceful Discord shutdown...");
            manager.shutdown_all().await;
        }
    }
}

fn parse_channel_id(channel: &ChannelRef) -> Result<ChannelId, CommandError> {
    channel
        .as_str()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
        .ok_or_else(|| CommandError::InvalidChannel {
            channel: channel.to_string(),
        })
}

fn http_status(error: &serenity::Error) -> Option<u16> {
    match error {
        serenity::Error::Http(http) => http.status_code().map(|status| status.as_u16()),
        _ => None,
    }
}

fn connect_error(error: serenity::Error) -> ConnectError {
    match http_status(&error) {
        Some(401) => ConnectError::AuthFailed {
            reason: "Discord rejected the bot token".to_string(),
        },
        _ => ConnectError::Protocol {
            message: error.to_string(),
        },
    }
}

fn command_error(channel: &ChannelRef, error: serenity::Error) -> CommandError {
    match http_status(&error) {
        Some(403) => CommandError::PermissionDenied {
            message: error.to_string(),
        },
        Some(404) => CommandError::InvalidChannel {
            channel: channel.to_string(),
        },
        _ => CommandError::Failed {
            message: error.to_string(),
        },
    }
}
