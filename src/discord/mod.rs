//! Discord side of the bridge.

pub mod client;
pub mod handler;

pub use client::DiscordTransport;
