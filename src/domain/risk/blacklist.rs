use serde::{Deserialize, Serialize};

use crate::domain::trading::Side;

/// `signal_blacklist`: a (signal_type, position_side) pair currently
/// disabled. Honored at decision time (spec §3, §4.6 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBlacklistEntry {
    pub signal_type: String,
    pub position_side: Side,
    pub is_active: bool,
}

impl SignalBlacklistEntry {
    pub fn matches(&self, fingerprint: &str, side: Side) -> bool {
        self.is_active && self.signal_type == fingerprint && self.position_side == side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_entries_never_match() {
        let entry = SignalBlacklistEntry {
            signal_type: "trend_1h_bear".into(),
            position_side: Side::Short,
            is_active: false,
        };
        assert!(!entry.matches("trend_1h_bear", Side::Short));
    }

    #[test]
    fn active_entries_match_fingerprint_and_side() {
        let entry = SignalBlacklistEntry {
            signal_type: "trend_1h_bear".into(),
            position_side: Side::Short,
            is_active: true,
        };
        assert!(entry.matches("trend_1h_bear", Side::Short));
        assert!(!entry.matches("trend_1h_bear", Side::Long));
    }
}
