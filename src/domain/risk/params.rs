use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `adaptive_params`: long/short stop-loss %, take-profit %, minimum
/// holding minutes, position-size multiplier. Hot-reloadable (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveParams {
    pub long_stop_loss_pct: Decimal,
    pub long_take_profit_pct: Decimal,
    pub short_stop_loss_pct: Decimal,
    pub short_take_profit_pct: Decimal,
    pub min_holding_minutes: i64,
    pub position_size_multiplier: Decimal,
}

impl AdaptiveParams {
    pub fn stop_loss_pct(&self, side: crate::domain::trading::Side) -> Decimal {
        match side {
            crate::domain::trading::Side::Long => self.long_stop_loss_pct,
            crate::domain::trading::Side::Short => self.short_stop_loss_pct,
        }
    }

    pub fn take_profit_pct(&self, side: crate::domain::trading::Side) -> Decimal {
        match side {
            crate::domain::trading::Side::Long => self.long_take_profit_pct,
            crate::domain::trading::Side::Short => self.short_take_profit_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn picks_matching_side() {
        let params = AdaptiveParams {
            long_stop_loss_pct: dec!(2.0),
            long_take_profit_pct: dec!(4.0),
            short_stop_loss_pct: dec!(1.5),
            short_take_profit_pct: dec!(3.5),
            min_holding_minutes: 10,
            position_size_multiplier: dec!(1.0),
        };
        assert_eq!(params.stop_loss_pct(Side::Short), dec!(1.5));
        assert_eq!(params.take_profit_pct(Side::Long), dec!(4.0));
    }
}
