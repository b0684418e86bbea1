//! Readiness barrier gating the bridge until both sides are ready.

use crate::common::types::Side;

/// Countdown over both sides. The bridge is live once every side has
/// reported ready; a disconnect re-arms the side it came from.
#[derive(Debug, Default)]
pub struct ReadinessBarrier {
    ready: [bool; 2],
    live: bool,
}

impl ReadinessBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `side` is ready. Returns `true` on the call that makes the bridge live.
    pub fn notify_ready(&mut self, side: Side) -> bool {
        self.ready[side.index()] = true;
        if !self.live && self.ready.iter().all(|r| *r) {
            self.live = true;
            return true;
        }
        false
    }

    /// Re-arm `side` after it dropped. Returns `true` if the bridge was live.
    pub fn notify_disconnected(&mut self, side: Side) -> bool {
        self.ready[side.index()] = false;
        std::mem::replace(&mut self.live, false)
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Number of sides still missing.
    pub fn remaining(&self) -> usize {
        self.ready.iter().filter(|r| !**r).count()
    }
}
