//! IRC side of the bridge.

pub mod client;
pub mod codec;

pub use client::IrcTransport;
