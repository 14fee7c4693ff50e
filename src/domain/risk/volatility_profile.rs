use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::trading::Side;

/// `symbol_volatility_profile`: per-symbol fixed take-profit %, long and
/// short, derived from recent 15m candle statistics by the adaptive
/// optimizer. Preferred over the adaptive default when present (spec §3,
/// §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityProfile {
    pub symbol: String,
    pub long_fixed_tp_pct: Decimal,
    pub short_fixed_tp_pct: Decimal,
}

impl VolatilityProfile {
    pub fn take_profit_pct(&self, side: Side) -> Decimal {
        match side {
            Side::Long => self.long_fixed_tp_pct,
            Side::Short => self.short_fixed_tp_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn returns_side_specific_tp() {
        let profile = VolatilityProfile {
            symbol: "SOL/USDT".into(),
            long_fixed_tp_pct: dec!(3.2),
            short_fixed_tp_pct: dec!(2.8),
        };
        assert_eq!(profile.take_profit_pct(Side::Long), dec!(3.2));
        assert_eq!(profile.take_profit_pct(Side::Short), dec!(2.8));
    }
}
