//! Topic alert notices.
//!
//! Supports placeholders: %emoji, %topic

use rand::seq::SliceRandom;

use crate::config::types::AlertConfig;

/// Formats the notice posted when a topic settles on both sides.
#[derive(Debug, Clone)]
pub struct AlertFormatter {
    format: String,
    emojis: Vec<String>,
}

impl AlertFormatter {
    pub fn new(format: impl Into<String>, emojis: Vec<String>) -> Self {
        Self {
            format: format.into(),
            emojis: emojis.iter().map(|e| resolve_shortcode(e)).collect(),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.format.clone(), config.emojis.clone())
    }

    /// Format an alert with a randomly chosen icon.
    pub fn format(&self, topic: &str) -> String {
        let emoji = self
            .emojis
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or_default();
        self.format_with(emoji, topic)
    }

    /// Format an alert with a specific icon.
    pub fn format_with(&self, emoji: &str, topic: &str) -> String {
        self.format
            .replace("%emoji", emoji)
            .replace("%topic", topic)
    }

    #[allow(dead_code)]
    pub fn emojis(&self) -> &[String] {
        &self.emojis
    }
}

/// Turn `:bell:` into 🔔. Anything else, including unknown shortcodes, is kept as is.
fn resolve_shortcode(icon: &str) -> String {
    icon.strip_prefix(':')
        .and_then(|s| s.strip_suffix(':'))
        .and_then(|code| emojis::get_by_shortcode(&code.to_lowercase()))
        .map(|emoji| emoji.as_str().to_string())
        .unwrap_or_else(|| icon.to_string())
}
