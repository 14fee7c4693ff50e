use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::market::Candle;

/// Market-wide directional bias derived from the four benchmark symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Big4Signal {
    Bullish,
    Bearish,
    Neutral,
}

/// Per-symbol bias and strength feeding the aggregate (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerSymbolSignal {
    pub symbol: String,
    pub signal: Big4Signal,
    pub strength: f64,
}

/// Result of one Big4 detection pass. The TTL cache wrapping this lives in
/// `application::regime::big4_service` — this type is just the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Big4Result {
    pub overall_signal: Big4Signal,
    pub signal_strength: f64,
    pub details_per_symbol: Vec<PerSymbolSignal>,
    pub detected_at: DateTime<Utc>,
}

impl Big4Result {
    pub fn neutral(detected_at: DateTime<Utc>) -> Self {
        Self {
            overall_signal: Big4Signal::Neutral,
            signal_strength: 0.0,
            details_per_symbol: Vec::new(),
            detected_at,
        }
    }
}

/// Directional bias + momentum from the last ~4h of 15m candles for one
/// benchmark symbol. Needs at least 16 candles (spec §4.4's "≥16").
pub fn symbol_signal(symbol: &str, candles: &[Candle]) -> Option<PerSymbolSignal> {
    if candles.len() < 16 {
        return None;
    }
    let window = &candles[candles.len() - 16..];
    let first_close: f64 = window.first()?.close.to_string().parse().ok()?;
    let last_close: f64 = window.last()?.close.to_string().parse().ok()?;
    if first_close <= 0.0 {
        return None;
    }
    let momentum_pct = (last_close - first_close) / first_close * 100.0;

    let bullish_count = window.iter().filter(|c| c.is_bullish()).count();
    let bearish_count = window.iter().filter(|c| c.is_bearish()).count();
    let directional_bias = bullish_count as f64 - bearish_count as f64;

    let signal = if momentum_pct > 0.5 && directional_bias > 0.0 {
        Big4Signal::Bullish
    } else if momentum_pct < -0.5 && directional_bias < 0.0 {
        Big4Signal::Bearish
    } else {
        Big4Signal::Neutral
    };

    let strength = (momentum_pct.abs() * 10.0 + directional_bias.abs() * 2.0).min(100.0);

    Some(PerSymbolSignal {
        symbol: symbol.to_string(),
        signal,
        strength,
    })
}

/// Majority-vote aggregate across the four benchmarks, strength weighted by
/// how consistent the majority is. Fewer than 3 non-neutral votes among the
/// four is "no quorum" → `Neutral`/0 (spec §4.4).
pub fn aggregate(details: &[PerSymbolSignal]) -> (Big4Signal, f64) {
    let bullish = details
        .iter()
        .filter(|d| d.signal == Big4Signal::Bullish)
        .count();
    let bearish = details
        .iter()
        .filter(|d| d.signal == Big4Signal::Bearish)
        .count();

    let (winner, count) = if bullish >= bearish {
        (Big4Signal::Bullish, bullish)
    } else {
        (Big4Signal::Bearish, bearish)
    };

    if count < 3 {
        return (Big4Signal::Neutral, 0.0);
    }

    let consistency = count as f64 / details.len().max(1) as f64;
    let avg_strength = details
        .iter()
        .filter(|d| d.signal == winner)
        .map(|d| d.strength)
        .sum::<f64>()
        / count as f64;

    (winner, (avg_strength * consistency).min(100.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReversalSide {
    /// Bottom reversal: blocks new SHORT entries, force-closes open SHORTs.
    Bottom,
    /// Top reversal: blocks new LONG entries, force-closes open LONGs.
    Top,
}

#[derive(Debug, Clone)]
pub struct ReversalEvent {
    pub side: ReversalSide,
    pub index_spread: usize,
    pub bounced_count: usize,
    pub earliest_low_at: DateTime<Utc>,
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

/// Finds a synchronized bottom (or, mirrored, top) across the four
/// benchmark windows. Each `windows` entry is one symbol's last-4h slice of
/// 15m candles, oldest first. See spec §4.4 synchronized-reversal
/// sub-detector and GLOSSARY "Synchronized reversal".
pub fn detect_synchronized_reversal(
    windows: &[Vec<Candle>],
    side: ReversalSide,
    now: DateTime<Utc>,
) -> Option<ReversalEvent> {
    if windows.len() < 4 {
        return None;
    }

    let mut extreme_indices = Vec::with_capacity(windows.len());
    let mut bounce_pcts = Vec::with_capacity(windows.len());

    for window in windows {
        if window.is_empty() {
            return None;
        }
        let (idx, extreme_price) = match side {
            ReversalSide::Bottom => window
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.low)
                .map(|(i, c)| (i, c.low))?,
            ReversalSide::Top => window
                .iter()
                .enumerate()
                .max_by_key(|(_, c)| c.high)
                .map(|(i, c)| (i, c.high))?,
        };
        let extreme: f64 = extreme_price.to_string().parse().ok()?;
        let last_close: f64 = window.last()?.close.to_string().parse().ok()?;
        if extreme <= 0.0 {
            return None;
        }
        let bounce_pct = match side {
            ReversalSide::Bottom => (last_close - extreme) / extreme * 100.0,
            ReversalSide::Top => (extreme - last_close) / extreme * 100.0,
        };
        extreme_indices.push((idx, window[idx].open_time));
        bounce_pcts.push(bounce_pct);
    }

    let min_idx = extreme_indices.iter().map(|(i, _)| *i).min()?;
    let max_idx = extreme_indices.iter().map(|(i, _)| *i).max()?;
    let index_spread = max_idx - min_idx;
    if index_spread > 2 {
        return None;
    }

    let bounced_count = bounce_pcts.iter().filter(|&&p| p >= 3.0).count();
    if bounced_count < 3 {
        return None;
    }

    let earliest_low_millis = extreme_indices.iter().map(|(_, t)| *t).min()?;
    let earliest_low_at = millis_to_utc(earliest_low_millis);
    if now - earliest_low_at > chrono::Duration::hours(2) {
        return None;
    }

    Some(ReversalEvent {
        side,
        index_spread,
        bounced_count,
        earliest_low_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(open_time: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            open_time,
            open,
            high,
            low,
            close,
            volume: dec!(100),
        }
    }

    fn uptrend_window(start_price: i64) -> Vec<Candle> {
        (0..16)
            .map(|i| {
                let p = Decimal::from(start_price + i * 2);
                candle(i as i64 * 900_000, p, p + dec!(1), p - dec!(1), p + dec!(1))
            })
            .collect()
    }

    #[test]
    fn symbol_signal_detects_bullish_momentum() {
        let window = uptrend_window(100);
        let signal = symbol_signal("BTC/USDT", &window).unwrap();
        assert_eq!(signal.signal, Big4Signal::Bullish);
        assert!(signal.strength > 0.0);
    }

    #[test]
    fn aggregate_requires_quorum_of_three() {
        let details = vec![
            PerSymbolSignal { symbol: "A".into(), signal: Big4Signal::Bullish, strength: 50.0 },
            PerSymbolSignal { symbol: "B".into(), signal: Big4Signal::Bullish, strength: 40.0 },
            PerSymbolSignal { symbol: "C".into(), signal: Big4Signal::Bearish, strength: 30.0 },
            PerSymbolSignal { symbol: "D".into(), signal: Big4Signal::Neutral, strength: 0.0 },
        ];
        let (signal, strength) = aggregate(&details);
        assert_eq!(signal, Big4Signal::Neutral);
        assert_eq!(strength, 0.0);
    }

    #[test]
    fn aggregate_passes_with_three_of_four() {
        let details = vec![
            PerSymbolSignal { symbol: "A".into(), signal: Big4Signal::Bullish, strength: 50.0 },
            PerSymbolSignal { symbol: "B".into(), signal: Big4Signal::Bullish, strength: 60.0 },
            PerSymbolSignal { symbol: "C".into(), signal: Big4Signal::Bullish, strength: 40.0 },
            PerSymbolSignal { symbol: "D".into(), signal: Big4Signal::Bearish, strength: 10.0 },
        ];
        let (signal, strength) = aggregate(&details);
        assert_eq!(signal, Big4Signal::Bullish);
        assert!(strength > 0.0);
    }

    fn bottom_window(low_idx: usize, low_time: i64, bounce_pct: f64) -> Vec<Candle> {
        let mut out = Vec::new();
        for i in 0..6usize {
            let time = low_time - (low_idx as i64 - i as i64) * 900_000;
            if i == low_idx {
                out.push(candle(time, dec!(100), dec!(101), dec!(90), dec!(95)));
            } else {
                let close = dec!(90) * (Decimal::from(100) + Decimal::try_from(bounce_pct).unwrap())
                    / Decimal::from(100);
                out.push(candle(time, close, close + dec!(1), close - dec!(1), close));
            }
        }
        out
    }

    #[test]
    fn synchronized_bottom_requires_three_bounces_and_tight_spread() {
        let now = Utc::now();
        let low_time = now.timestamp_millis() - 3_600_000;
        let windows = vec![
            bottom_window(2, low_time, 3.2),
            bottom_window(2, low_time, 3.5),
            bottom_window(3, low_time, 3.1),
            bottom_window(2, low_time, 4.0),
        ];
        let event = detect_synchronized_reversal(&windows, ReversalSide::Bottom, now);
        assert!(event.is_some());
        let event = event.unwrap();
        assert_eq!(event.side, ReversalSide::Bottom);
        assert!(event.index_spread <= 2);
        assert!(event.bounced_count >= 3);
    }

    #[test]
    fn synchronized_bottom_rejects_wide_spread() {
        let now = Utc::now();
        let low_time = now.timestamp_millis() - 3_600_000;
        let windows = vec![
            bottom_window(0, low_time, 3.2),
            bottom_window(2, low_time, 3.5),
            bottom_window(4, low_time, 3.1),
            bottom_window(5, low_time, 4.0),
        ];
        assert!(detect_synchronized_reversal(&windows, ReversalSide::Bottom, now).is_none());
    }
}
