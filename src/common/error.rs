//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("No config file found (searched: {searched})")]
    NotFound { searched: String },
}

/// Failure while establishing a transport session.
///
/// Absorbed by the connection supervisor and retried after a backoff.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to connect to {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("Connection closed during handshake")]
    ConnectionClosed,

    #[error("Handshake timed out")]
    Timeout,

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An outbound command (set topic, send notice) was rejected.
///
/// Logged by the bridge and never retried.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Not connected")]
    NotConnected,

    #[error("Invalid channel: {channel}")]
    InvalidChannel { channel: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Command failed: {message}")]
    Failed { message: String },
}
