//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `TOPICSYNC_DISCORD_TOKEN` - Discord bot token
//! - `TOPICSYNC_IRC_PASSWORD` - IRC server password
//! - `TOPICSYNC_IRC_SERVER` - IRC server host
//! - `TOPICSYNC_IRC_PORT` - IRC server port
//! - `TOPICSYNC_IRC_NICK` - IRC nickname

use std::env;
use std::path::PathBuf;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "TOPICSYNC";

/// Config file name looked up in each search directory.
const CONFIG_FILE_NAME: &str = "topicsync.conf";

/// Apply environment variable overrides to a config.
///
/// This allows secrets like the bot token to be provided via
/// environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }

    if let Ok(password) = env::var(format!("{}_IRC_PASSWORD", ENV_PREFIX)) {
        config.irc.password = Some(password);
    }
    if let Ok(server) = env::var(format!("{}_IRC_SERVER", ENV_PREFIX)) {
        config.irc.server = server;
    }
    if let Ok(port) = env::var(format!("{}_IRC_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.irc.port = port;
        }
    }
    if let Ok(nick) = env::var(format!("{}_IRC_NICK", ENV_PREFIX)) {
        config.irc.nick = nick;
    }

    config
}

/// Candidate config file locations, in lookup order.
///
/// `TOPICSYNC_CONFIG` wins outright. Otherwise the working directory,
/// `$HOME/.topicsync` and `/etc/topicsync` are searched.
pub fn config_search_paths() -> Vec<PathBuf> {
    if let Ok(path) = env::var(format!("{}_CONFIG", ENV_PREFIX)) {
        return vec![PathBuf::from(path)];
    }

    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Ok(home) = env::var("HOME") {
        paths.push(PathBuf::from(home).join(".topicsync").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/topicsync").join(CONFIG_FILE_NAME));
    paths
}
