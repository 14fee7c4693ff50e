use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::trading::Side;

/// Per-(signal_fingerprint, side) realized performance, consulted as a
/// quality filter that may only *raise* the base entry threshold (spec §3,
/// GLOSSARY "Quality filter").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalQualityStats {
    pub signal_fingerprint: String,
    pub side: Side,
    pub sample_count: u32,
    pub win_rate: Decimal,
    pub avg_pnl: Decimal,
    pub threshold_adjustment: Decimal,
}

impl SignalQualityStats {
    /// Applies the adjustment to a base threshold, never lowering it.
    pub fn adjusted_threshold(&self, base_threshold: Decimal) -> Decimal {
        base_threshold + self.threshold_adjustment.max(Decimal::ZERO)
    }

    pub fn record_outcome(&mut self, win: bool, pnl: Decimal) {
        let total_pnl = self.avg_pnl * Decimal::from(self.sample_count) + pnl;
        let total_wins = (self.win_rate * Decimal::from(self.sample_count) / Decimal::from(100))
            .round()
            + if win { Decimal::ONE } else { Decimal::ZERO };
        self.sample_count += 1;
        self.avg_pnl = total_pnl / Decimal::from(self.sample_count);
        self.win_rate = total_wins / Decimal::from(self.sample_count) * Decimal::from(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn adjustment_never_lowers_threshold() {
        let stats = SignalQualityStats {
            signal_fingerprint: "breakout_strong".into(),
            side: Side::Long,
            sample_count: 10,
            win_rate: dec!(30),
            avg_pnl: dec!(-5),
            threshold_adjustment: dec!(-10),
        };
        assert_eq!(stats.adjusted_threshold(dec!(35)), dec!(35));
    }

    #[test]
    fn adjustment_raises_threshold() {
        let stats = SignalQualityStats {
            signal_fingerprint: "breakout_strong".into(),
            side: Side::Long,
            sample_count: 10,
            win_rate: dec!(30),
            avg_pnl: dec!(-5),
            threshold_adjustment: dec!(10),
        };
        assert_eq!(stats.adjusted_threshold(dec!(35)), dec!(45));
    }

    #[test]
    fn record_outcome_updates_rate_and_avg() {
        let mut stats = SignalQualityStats {
            signal_fingerprint: "x".into(),
            side: Side::Long,
            sample_count: 1,
            win_rate: dec!(100),
            avg_pnl: dec!(10),
            threshold_adjustment: Decimal::ZERO,
        };
        stats.record_outcome(false, dec!(-10));
        assert_eq!(stats.sample_count, 2);
        assert_eq!(stats.win_rate, dec!(50));
        assert_eq!(stats.avg_pnl, Decimal::ZERO);
    }
}
