//! The scoring components enumerated in spec §4.6. Each function is pure:
//! candles in, zero or more `(component name, side, raw points)` tuples out.
//! `decision_brain` multiplies raw points by the (component, side) weight
//! from the scan's `ScoringWeights` snapshot.

use rust_decimal::Decimal;

use crate::domain::market::{indicators, Candle};
use crate::domain::signal::BreakoutInfo;
use crate::domain::trading::Side;

pub struct CandleWindows<'a> {
    pub d1: &'a [Candle],
    pub h1: &'a [Candle],
    pub m15: &'a [Candle],
}

fn to_f64(d: Decimal) -> f64 {
    d.to_string().parse().unwrap_or(0.0)
}

/// Exclusive: last 15m candle breaks the 24h high/low by >= 0.5%, 15m move
/// >= 0.5%, volume ratio > 2x the 20-bar average. When this fires, the
/// caller skips every other component (spec §4.6).
pub fn strong_breakout(windows: &CandleWindows) -> Option<(Side, BreakoutInfo)> {
    if windows.m15.len() < 21 || windows.d1.len() < 1 {
        return None;
    }
    let last = windows.m15.last()?;
    let prev = windows.m15[windows.m15.len() - 2];
    let move_pct = if !prev.close.is_zero() {
        to_f64((last.close - prev.close) / prev.close) * 100.0
    } else {
        0.0
    };
    let volume_ratio = indicators::volume_ratio(windows.m15, 20);

    let high_24h = windows.d1.iter().map(|c| c.high).max()?;
    let low_24h = windows.d1.iter().map(|c| c.low).min()?;

    if volume_ratio <= 2.0 || move_pct.abs() < 0.5 {
        return None;
    }

    if !high_24h.is_zero() && to_f64((last.close - high_24h) / high_24h) * 100.0 >= 0.5 && move_pct > 0.0 {
        return Some((Side::Long, BreakoutInfo { broken_level: high_24h }));
    }
    if !low_24h.is_zero() && to_f64((low_24h - last.close) / low_24h) * 100.0 >= 0.5 && move_pct < 0.0 {
        return Some((Side::Short, BreakoutInfo { broken_level: low_24h }));
    }
    None
}

/// Position within the 72h (h1, 72 candles) range: <30% tilts LONG, >70%
/// tilts SHORT, the middle contributes a small neutral nudge to whichever
/// side the close leans toward.
pub fn position_in_72h_range(windows: &CandleWindows) -> Vec<(&'static str, Side, f64)> {
    if windows.h1.len() < 72 {
        return Vec::new();
    }
    let window = &windows.h1[windows.h1.len() - 72..];
    let high = window.iter().map(|c| c.high).max().unwrap_or_default();
    let low = window.iter().map(|c| c.low).min().unwrap_or_default();
    let last = window.last().unwrap();
    let pos = to_f64(last.position_in_range(low, high));

    if pos < 0.30 {
        vec![("position_in_72h_range", Side::Long, 15.0)]
    } else if pos > 0.70 {
        vec![("position_in_72h_range", Side::Short, 15.0)]
    } else if pos < 0.5 {
        vec![("position_in_72h_range", Side::Long, 4.0)]
    } else {
        vec![("position_in_72h_range", Side::Short, 4.0)]
    }
}

/// 24h momentum: |change| > 3% tilts the corresponding side.
pub fn momentum_24h(windows: &CandleWindows) -> Vec<(&'static str, Side, f64)> {
    if windows.d1.is_empty() {
        return Vec::new();
    }
    let day = windows.d1.last().unwrap();
    if day.open.is_zero() {
        return Vec::new();
    }
    let change_pct = to_f64((day.close - day.open) / day.open) * 100.0;
    if change_pct > 3.0 {
        vec![("momentum_24h", Side::Long, 12.0)]
    } else if change_pct < -3.0 {
        vec![("momentum_24h", Side::Short, 12.0)]
    } else {
        Vec::new()
    }
}

/// 1h trend: bullish/bearish count over the last 48 candles; a strong
/// majority (>= 65%) tilts the matching side.
pub fn trend_1h(windows: &CandleWindows) -> Vec<(&'static str, Side, f64)> {
    if windows.h1.len() < 48 {
        return Vec::new();
    }
    let window = &windows.h1[windows.h1.len() - 48..];
    let bullish = window.iter().filter(|c| c.is_bullish()).count();
    let bearish = window.iter().filter(|c| c.is_bearish()).count();
    let total = window.len() as f64;

    if bullish as f64 / total >= 0.65 {
        vec![("trend_1h_bull", Side::Long, 10.0)]
    } else if bearish as f64 / total >= 0.65 {
        vec![("trend_1h_bear", Side::Short, 10.0)]
    } else {
        Vec::new()
    }
}

/// Volatility: 24h (high-low)/price > 5% gives an equal bonus to both
/// sides — a wide range means either direction has room to run.
pub fn volatility_24h(windows: &CandleWindows) -> Vec<(&'static str, Side, f64)> {
    let Some(day) = windows.d1.last() else {
        return Vec::new();
    };
    if day.close.is_zero() {
        return Vec::new();
    }
    let range_pct = to_f64((day.high - day.low) / day.close) * 100.0;
    if range_pct > 5.0 {
        vec![
            ("volatility_high", Side::Long, 5.0),
            ("volatility_high", Side::Short, 5.0),
        ]
    } else {
        Vec::new()
    }
}

/// Consecutive 10h bias: >= 7 of the last 10 h1 candles share a direction,
/// with moderate cumulative move and a non-extreme close position.
pub fn consecutive_10h_bias(windows: &CandleWindows) -> Vec<(&'static str, Side, f64)> {
    if windows.h1.len() < 10 {
        return Vec::new();
    }
    let window = &windows.h1[windows.h1.len() - 10..];
    let bullish = window.iter().filter(|c| c.is_bullish()).count();
    let bearish = window.iter().filter(|c| c.is_bearish()).count();

    let first = window.first().unwrap();
    let last = window.last().unwrap();
    if first.open.is_zero() {
        return Vec::new();
    }
    let cumulative_pct = to_f64((last.close - first.open) / first.open).abs() * 100.0;
    if !(0.5..8.0).contains(&cumulative_pct) {
        return Vec::new();
    }

    let high = window.iter().map(|c| c.high).max().unwrap_or_default();
    let low = window.iter().map(|c| c.low).min().unwrap_or_default();
    let pos = to_f64(last.position_in_range(low, high));
    if !(0.15..0.85).contains(&pos) {
        return Vec::new();
    }

    if bullish >= 7 {
        vec![("consecutive_10h_bias", Side::Long, 8.0)]
    } else if bearish >= 7 {
        vec![("consecutive_10h_bias", Side::Short, 8.0)]
    } else {
        Vec::new()
    }
}

fn strong_candle_counts(window: &[Candle], avg_volume_period: usize) -> (i64, i64) {
    if window.len() <= avg_volume_period {
        return (0, 0);
    }
    let mut strong_bull = 0i64;
    let mut strong_bear = 0i64;
    for i in avg_volume_period..window.len() {
        let history = &window[i - avg_volume_period..i];
        let avg_volume: f64 = history
            .iter()
            .map(|c| to_f64(c.volume))
            .sum::<f64>()
            / avg_volume_period as f64;
        if avg_volume <= f64::EPSILON {
            continue;
        }
        let candle = window[i];
        let ratio = to_f64(candle.volume) / avg_volume;
        if ratio > 1.2 && candle.is_bullish() {
            strong_bull += 1;
        } else if ratio > 1.2 && candle.is_bearish() {
            strong_bear += 1;
        }
    }
    (strong_bull, strong_bear)
}

/// Volume-weighted power: counts "strong bull" minus "strong bear" candles
/// on the 1h and 15m windows separately; simultaneous strong majority on
/// both windows is a premium, higher-weighted component (spec §4.6).
pub fn volume_weighted_power(windows: &CandleWindows) -> Vec<(&'static str, Side, f64)> {
    let (h1_bull, h1_bear) = strong_candle_counts(windows.h1, 20);
    let (m15_bull, m15_bear) = strong_candle_counts(windows.m15, 20);

    let h1_side = if h1_bull - h1_bear >= 3 {
        Some(Side::Long)
    } else if h1_bear - h1_bull >= 3 {
        Some(Side::Short)
    } else {
        None
    };
    let m15_side = if m15_bull - m15_bear >= 3 {
        Some(Side::Long)
    } else if m15_bear - m15_bull >= 3 {
        Some(Side::Short)
    } else {
        None
    };

    match (h1_side, m15_side) {
        (Some(a), Some(b)) if a == b => vec![("volume_weighted_power_dual", a, 18.0)],
        (Some(a), None) => vec![("volume_weighted_power_1h", a, 7.0)],
        (None, Some(b)) => vec![("volume_weighted_power_15m", b, 7.0)],
        _ => Vec::new(),
    }
}

/// Breakout-through-high (LONG) / breakdown-through-low (SHORT) on the 1h
/// window with volume confirmation (ratio > 1.5x), distinct from the
/// exclusive strong-breakout component, which requires a stricter 24h-range
/// break plus 15m acceleration.
pub fn breakout_through_level(windows: &CandleWindows) -> Vec<(&'static str, Side, f64)> {
    if windows.h1.len() < 21 {
        return Vec::new();
    }
    let window = &windows.h1[windows.h1.len() - 21..];
    let (prior, last) = window.split_at(20);
    let last = last[0];
    let prior_high = prior.iter().map(|c| c.high).max().unwrap_or_default();
    let prior_low = prior.iter().map(|c| c.low).min().unwrap_or_default();
    let volume_ratio = indicators::volume_ratio(window, 20);

    if volume_ratio <= 1.5 {
        return Vec::new();
    }
    if last.close > prior_high {
        vec![("breakout_through_high", Side::Long, 10.0)]
    } else if last.close < prior_low {
        vec![("breakdown_through_low", Side::Short, 10.0)]
    } else {
        Vec::new()
    }
}

/// Where the last close sits in the trailing 24h (h1, 24 candles) range, as
/// a fraction in [0, 1], for the anti-FOMO filter. Falls back to the
/// midpoint when there isn't a full day of h1 history yet, which keeps the
/// filter a no-op rather than a false reject.
pub fn position_in_24h_range(windows: &CandleWindows) -> f64 {
    if windows.h1.len() < 24 {
        return 0.5;
    }
    let window = &windows.h1[windows.h1.len() - 24..];
    let high = window.iter().map(|c| c.high).max().unwrap_or_default();
    let low = window.iter().map(|c| c.low).min().unwrap_or_default();
    to_f64(window.last().unwrap().position_in_range(low, high))
}

/// Evidence for the position-high validation filter (spec §4.6 step 5):
/// where the last h1 close sits in the recent range, whether volume has
/// been declining over the last 3 candles, and how often the 15m window
/// shows long upper shadows (rejection candles), as a fraction in [0, 1].
pub fn position_high_evidence(windows: &CandleWindows) -> (f64, bool, f64) {
    let pos_pct = if windows.h1.len() >= 72 {
        let window = &windows.h1[windows.h1.len() - 72..];
        let high = window.iter().map(|c| c.high).max().unwrap_or_default();
        let low = window.iter().map(|c| c.low).min().unwrap_or_default();
        to_f64(window.last().unwrap().position_in_range(low, high))
    } else {
        0.5
    };

    let volume_declining = if windows.h1.len() >= 3 {
        let last3 = &windows.h1[windows.h1.len() - 3..];
        to_f64(last3[2].volume) < to_f64(last3[1].volume) && to_f64(last3[1].volume) < to_f64(last3[0].volume)
    } else {
        false
    };

    let upper_shadow_freq = if windows.m15.len() >= 20 {
        let window = &windows.m15[windows.m15.len() - 20..];
        let count = window
            .iter()
            .filter(|c| {
                let body_top = c.open.max(c.close);
                let upper_shadow = c.high - body_top;
                let range = c.high - c.low;
                !range.is_zero() && to_f64(upper_shadow / range) > 0.3
            })
            .count();
        count as f64 / window.len() as f64
    } else {
        0.0
    };

    (pos_pct, volume_declining, upper_shadow_freq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flat_candles(n: usize, price: Decimal, volume: Decimal) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                open_time: i as i64 * 60_000,
                open: price,
                high: price + dec!(1),
                low: price - dec!(1),
                close: price,
                volume,
            })
            .collect()
    }

    #[test]
    fn momentum_24h_requires_three_percent() {
        let d1 = vec![Candle {
            open_time: 0,
            open: dec!(100),
            high: dec!(105),
            low: dec!(99),
            close: dec!(104),
            volume: dec!(1000),
        }];
        let h1 = flat_candles(1, dec!(100), dec!(100));
        let m15 = flat_candles(1, dec!(100), dec!(100));
        let windows = CandleWindows { d1: &d1, h1: &h1, m15: &m15 };
        assert_eq!(momentum_24h(&windows), vec![("momentum_24h", Side::Long, 12.0)]);
    }

    #[test]
    fn position_in_72h_range_needs_full_window() {
        let d1 = flat_candles(1, dec!(100), dec!(100));
        let h1 = flat_candles(10, dec!(100), dec!(100));
        let m15 = flat_candles(1, dec!(100), dec!(100));
        let windows = CandleWindows { d1: &d1, h1: &h1, m15: &m15 };
        assert!(position_in_72h_range(&windows).is_empty());
    }

    #[test]
    fn volatility_component_grants_both_sides() {
        let d1 = vec![Candle {
            open_time: 0,
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            close: dec!(100),
            volume: dec!(1000),
        }];
        let h1 = flat_candles(1, dec!(100), dec!(100));
        let m15 = flat_candles(1, dec!(100), dec!(100));
        let windows = CandleWindows { d1: &d1, h1: &h1, m15: &m15 };
        let out = volatility_24h(&windows);
        assert_eq!(out.len(), 2);
    }
}
