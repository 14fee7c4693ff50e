use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::trading::Side;

/// Snapshot of currently-armed emergency blocks, read by the brain once per
/// scan (spec §4.9). Each block clears itself once wall time passes
/// `until`; nothing decrements a counter, there is nothing to decrement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmergencyBlocks {
    pub bottom_reversal_until: Option<DateTime<Utc>>,
    pub top_reversal_until: Option<DateTime<Utc>>,
    pub aggregate_loss_until: Option<DateTime<Utc>>,
    pub stop_loss_circuit_until: Option<DateTime<Utc>>,
}

impl EmergencyBlocks {
    /// True if `side` is currently blocked from opening new positions.
    pub fn blocks_side(&self, side: Side, now: DateTime<Utc>) -> bool {
        let side_specific = match side {
            Side::Short => self.bottom_reversal_until,
            Side::Long => self.top_reversal_until,
        };
        Self::armed(side_specific, now)
            || Self::armed(self.aggregate_loss_until, now)
            || Self::armed(self.stop_loss_circuit_until, now)
    }

    fn armed(until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        until.is_some_and(|t| t > now)
    }
}

/// Inputs to the three independent predicates run on every main tick (spec
/// §4.9). `EmergencyLayerState` itself holds no policy, just the rolling
/// inputs the predicates are computed from; the thresholds live in
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct EmergencyLayerState {
    /// `note`-derived stop-loss flag for the most recent N close orders,
    /// newest first.
    pub recent_close_is_stop_loss: Vec<bool>,
}

impl EmergencyLayerState {
    pub fn consecutive_stop_loss_count(&self, window: usize) -> usize {
        self.recent_close_is_stop_loss
            .iter()
            .take(window)
            .filter(|&&is_sl| is_sl)
            .count()
    }

    pub fn record_close(&mut self, is_stop_loss: bool, window: usize) {
        self.recent_close_is_stop_loss.insert(0, is_stop_loss);
        self.recent_close_is_stop_loss.truncate(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_side_respects_expiry() {
        let now = Utc::now();
        let blocks = EmergencyBlocks {
            bottom_reversal_until: Some(now + chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(blocks.blocks_side(Side::Short, now));
        assert!(!blocks.blocks_side(Side::Long, now));
        assert!(!blocks.blocks_side(Side::Short, now + chrono::Duration::hours(2)));
    }

    #[test]
    fn aggregate_loss_blocks_both_sides() {
        let now = Utc::now();
        let blocks = EmergencyBlocks {
            aggregate_loss_until: Some(now + chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(blocks.blocks_side(Side::Long, now));
        assert!(blocks.blocks_side(Side::Short, now));
    }

    #[test]
    fn consecutive_stop_loss_counts_within_window() {
        let mut state = EmergencyLayerState::default();
        for is_sl in [true, true, false, true, true, true, false, false, false, false] {
            state.record_close(is_sl, 10);
        }
        assert_eq!(state.consecutive_stop_loss_count(10), 5);
    }
}
