//! Scroll-depth milestones, each reported at most once per page activation.

use std::collections::BTreeSet;

use footprint_protocol::{EventEnvelope, SCROLL_DEPTH};

use crate::environment::ScrollMetrics;

#[derive(Debug, Clone)]
pub struct ScrollDepthTracker {
    thresholds: Vec<u8>,
    fired: BTreeSet<u8>,
}

impl ScrollDepthTracker {
    pub fn new(thresholds: &[u8]) -> Self {
        let mut thresholds = thresholds.to_vec();
        thresholds.sort_unstable();
        thresholds.dedup();
        Self {
            thresholds,
            fired: BTreeSet::new(),
        }
    }

    /// Returns one `scroll_depth` event per newly crossed threshold, ascending.
    pub fn observe(&mut self, metrics: &ScrollMetrics) -> Vec<EventEnvelope> {
        let depth = match metrics.depth_percent() {
            Some(depth) => depth,
            None => return Vec::new(),
        };

        let mut events = Vec::new();
        for threshold in &self.thresholds {
            if depth >= f64::from(*threshold) && self.fired.insert(*threshold) {
                events.push(EventEnvelope::new(SCROLL_DEPTH).field("percent", *threshold));
            }
        }
        events
    }

    pub fn fired(&self) -> impl Iterator<Item = u8> + '_ {
        self.fired.iter().copied()
    }
}
