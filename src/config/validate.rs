//! Configuration validation.
//!
//! Validates configuration values and reports every problem at once.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Discord
    if config.discord.token.is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }
    if config.discord.channel_id == 0 {
        errors.push("discord.channel_id must be non-zero".to_string());
    }

    // IRC
    if config.irc.server.is_empty() {
        errors.push("irc.server is required".to_string());
    }
    if config.irc.port == 0 {
        errors.push("irc.port must be non-zero".to_string());
    }
    if config.irc.nick.is_empty() || config.irc.nick.contains(' ') {
        errors.push(format!("irc.nick '{}' is not a valid nickname", config.irc.nick));
    }
    if config.irc.user.is_empty() {
        errors.push("irc.user is required".to_string());
    }
    if !(config.irc.channel.starts_with('#') || config.irc.channel.starts_with('&')) {
        errors.push(format!(
            "irc.channel '{}' must start with '#' or '&'",
            config.irc.channel
        ));
    }
    if let Some(ref auth) = config.irc.auth {
        if auth.bot.is_empty() || auth.command.is_empty() {
            errors.push("irc.auth requires both bot and command".to_string());
        }
    }

    if config.reconnect_delay_secs == 0 {
        errors.push("reconnect_delay_secs must be non-zero".to_string());
    }

    // Alert
    if let Some(ref alert) = config.alert {
        if alert.format.is_empty() {
            errors.push("alert.format must not be empty".to_string());
        }
        if alert.emojis.is_empty() {
            errors.push("alert.emojis has no items to choose from".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
