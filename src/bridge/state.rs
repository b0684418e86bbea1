//! Topic state store.
//!
//! Holds the last synced topic per pair. The equality check in
//! [`TopicStore::try_update`] is what stops an update echoing back and forth
//! between the two networks. The store has a single owner (the bridge task),
//! so it carries no locking of its own.

use std::collections::BTreeMap;

use crate::common::types::{PairId, Side};

/// Last known synced topic of one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicRecord {
    pub pair: PairId,
    pub current_text: String,
    /// Side that supplied `current_text`; `None` until the first update.
    pub last_source: Option<Side>,
}

impl TopicRecord {
    fn new(pair: PairId) -> Self {
        Self {
            pair,
            current_text: String::new(),
            last_source: None,
        }
    }
}

/// Result of a write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The topic changed and the record was updated.
    Applied,
    /// The topic equals the stored one; nothing changed.
    Duplicate,
}

/// Normalize a topic the way the networks display it.
pub fn normalize_topic(text: &str) -> &str {
    text.trim()
}

/// Cut a topic to at most `max` bytes without splitting a character.
pub fn cap_topic(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].trim_end()
}

/// In-memory store of synced topics, one record per pair.
#[derive(Debug, Default)]
pub struct TopicStore {
    records: BTreeMap<PairId, TopicRecord>,
}

impl TopicStore {
    /// Create a store with an empty record for every pair.
    pub fn new(pairs: impl IntoIterator<Item = PairId>) -> Self {
        Self {
            records: pairs
                .into_iter()
                .map(|pair| (pair, TopicRecord::new(pair)))
                .collect(),
        }
    }

    /// Snapshot of a pair's record.
    pub fn read(&self, pair: PairId) -> Option<&TopicRecord> {
        self.records.get(&pair)
    }

    /// The single write path.
    pub fn try_update(&mut self, pair: PairId, text: &str, source: Side) -> UpdateOutcome {
        let text = normalize_topic(text);
        let record = self
            .records
            .entry(pair)
            .or_insert_with(|| TopicRecord::new(pair));

        if record.current_text == text {
            return UpdateOutcome::Duplicate;
        }

        record.current_text = text.to_string();
        record.last_source = Some(source);
        UpdateOutcome::Applied
    }
}
