//! Topic bridge between IRC and Discord.
//!
//! ## Module Structure
//!
//! - `alert`: Notice formatting for settled topics
//! - `barrier`: Readiness gate over both sides
//! - `channels`: Event queue and shutdown channels
//! - `orchestrator`: Bridge core (`TopicBridge`)
//! - `pairing`: Channel pairing
//! - `state`: Topic state store
//! - `supervisor`: Per-transport connect/retry loop

pub mod alert;
pub mod barrier;
pub mod channels;
pub mod orchestrator;
pub mod pairing;
pub mod state;
pub mod supervisor;

#[cfg(test)]
pub mod testing;

pub use alert::AlertFormatter;
pub use channels::ChannelBundle;
pub use orchestrator::{TopicBridge, Transports};
pub use pairing::ChannelPairing;
pub use supervisor::{log_state_changes, ConnectionSupervisor};
