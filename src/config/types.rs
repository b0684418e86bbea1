//! Configuration type definitions.

use std::time::Duration;

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub irc: IrcConfig,
    pub discord: DiscordConfig,
    /// Seconds to wait between connection attempts.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    pub alert: Option<AlertConfig>,
}

/// IRC server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    #[serde(default = "default_nick")]
    pub nick: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_realname")]
    pub name: String,
    /// Server password sent with `PASS`.
    pub password: Option<String>,
    /// The tracked channel, e.g. `#general`.
    pub channel: String,
    /// User modes to set after registration, e.g. `+B`.
    pub usermode: Option<String>,
    pub auth: Option<IrcAuthConfig>,
}

/// Message sent to a services bot after registration.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcAuthConfig {
    /// Nick of the services bot, e.g. `NickServ`.
    pub bot: String,
    /// Command text, e.g. `IDENTIFY hunter2`.
    pub command: String,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    /// The tracked channel ID.
    pub channel_id: u64,
}

/// Notice posted when a topic settles on both sides.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Template with `%emoji` and `%topic` placeholders.
    pub format: String,
    #[serde(default = "default_emojis")]
    pub emojis: Vec<String>,
}

fn default_reconnect_delay_secs() -> u64 {
    30
}

fn default_irc_port() -> u16 {
    6667
}

fn default_nick() -> String {
    "TopicBot".to_string()
}

fn default_user() -> String {
    "TopicBot".to_string()
}

fn default_realname() -> String {
    "A Topic Sync Bot".to_string()
}

fn default_emojis() -> Vec<String> {
    vec!["🔔".to_string()]
}

impl Config {
    /// Delay between reconnection attempts.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// IRC server address as `host:port`.
    pub fn irc_address(&self) -> String {
        format!("{}:{}", self.irc.server, self.irc.port)
    }
}
