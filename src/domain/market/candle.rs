use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timeframes the engine consumes. Spec §4.6 reads 1d/1h/15m; the gateway
/// (§4.1) additionally falls back to 5m closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    FiveMin,
    FifteenMin,
    OneHour,
    OneDay,
}

impl Timeframe {
    pub fn to_minutes(self) -> i64 {
        match self {
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::OneDay => 1440,
        }
    }

    pub fn to_millis(self) -> i64 {
        self.to_minutes() * 60_000
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV candle. `open_time` is the period start, UTC milliseconds
/// (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Fraction of [low, high] that `close` sits at, in `[0, 1]`. Used by
    /// the "position in N-hour range" scoring component and by anti-FOMO.
    /// Degenerate (zero-width) ranges report the midpoint, `0.5`.
    pub fn position_in_range(&self, lowest: Decimal, highest: Decimal) -> Decimal {
        let span = highest - lowest;
        if span <= Decimal::ZERO {
            return Decimal::new(5, 1);
        }
        ((self.close - lowest) / span).clamp(Decimal::ZERO, Decimal::ONE)
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body_pct(&self) -> Decimal {
        if self.open.is_zero() {
            return Decimal::ZERO;
        }
        ((self.close - self.open) / self.open).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume: dec!(100),
        }
    }

    #[test]
    fn position_in_range_clamps_and_handles_degenerate() {
        let c = candle(dec!(100), dec!(110), dec!(90), dec!(108));
        assert_eq!(c.position_in_range(dec!(90), dec!(110)), dec!(0.9));

        let flat = candle(dec!(100), dec!(100), dec!(100), dec!(100));
        assert_eq!(flat.position_in_range(dec!(100), dec!(100)), dec!(0.5));
    }

    #[test]
    fn bullish_bearish() {
        let up = candle(dec!(100), dec!(105), dec!(99), dec!(103));
        assert!(up.is_bullish());
        assert!(!up.is_bearish());
    }
}
