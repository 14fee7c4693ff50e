//! Indicator engine (spec §4.3). Pure functions over a candle slice, oldest
//! first, no internal caching: every call replays its own accumulator from
//! scratch. Callers that want incremental behavior own their own windowing.
//!
//! All outputs are `f64` — these feed scoring and regime heuristics, not
//! ledger math, so `Decimal`'s exactness isn't needed and would just add
//! conversion noise at every call site.

use super::Candle;

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close.to_string().parse().unwrap_or(0.0)).collect()
}

/// Exponential moving average of closes, `None` if `candles.len() < period`.
pub fn ema(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let closes = closes(candles);
    let k = 2.0 / (period as f64 + 1.0);
    let mut value = closes[..period].iter().sum::<f64>() / period as f64;
    for &price in &closes[period..] {
        value = price * k + value * (1.0 - k);
    }
    Some(value)
}

/// Simple moving average of the last `period` closes.
pub fn sma(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let closes = closes(candles);
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Alias kept for the spec's own vocabulary ("MA(10)", "MA(5)").
pub fn ma(candles: &[Candle], period: usize) -> Option<f64> {
    sma(candles, period)
}

/// Wilder's RSI. Needs `period + 1` closes to produce one seed average.
pub fn rsi(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let closes = closes(candles);
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let seed = &deltas[..period];
    let mut avg_gain = seed.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().filter(|d| **d < 0.0).map(|d| -d).sum::<f64>() / period as f64;

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut value = values[..period].iter().sum::<f64>() / period as f64;
    out.push(value);
    for &price in &values[period..] {
        value = price * k + value * (1.0 - k);
        out.push(value);
    }
    out
}

/// MACD(fast, slow, signal). `None` until enough history exists to seed the
/// signal line itself (`slow + signal - 1` closes).
pub fn macd(candles: &[Candle], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if slow <= fast || candles.len() < slow + signal {
        return None;
    }
    let closes = closes(candles);
    let fast_series = ema_series(&closes, fast);
    let slow_series = ema_series(&closes, slow);

    let offset = fast_series.len() - slow_series.len();
    let macd_line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(i, s)| fast_series[i + offset] - s)
        .collect();

    let signal_series = ema_series(&macd_line, signal);
    let latest_macd = *macd_line.last()?;
    let latest_signal = *signal_series.last()?;
    Some(Macd {
        macd: latest_macd,
        signal: latest_signal,
        histogram: latest_macd - latest_signal,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands over the last `period` closes, `std_dev` widths apart.
pub fn bollinger(candles: &[Candle], period: usize, std_dev: f64) -> Option<Bollinger> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let closes = closes(candles);
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64;
    let sd = variance.sqrt();
    Some(Bollinger {
        upper: mean + sd * std_dev,
        middle: mean,
        lower: mean - sd * std_dev,
    })
}

/// Average true range over `period` candles. Needs one extra candle for the
/// first "previous close".
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let mut true_ranges = Vec::with_capacity(candles.len() - 1);
    for w in candles.windows(2) {
        let prev_close = w[0].close.to_string().parse::<f64>().unwrap_or(0.0);
        let high = w[1].high.to_string().parse::<f64>().unwrap_or(0.0);
        let low = w[1].low.to_string().parse::<f64>().unwrap_or(0.0);
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        true_ranges.push(tr);
    }
    let window = &true_ranges[true_ranges.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kdj {
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

/// KDJ(n, m1, m2). Not provided by any indicator crate in the pack; this
/// follows the textbook recursive definition with a neutral 50.0 seed for K
/// and D, same convention most charting libraries use.
pub fn kdj(candles: &[Candle], n: usize, m1: usize, m2: usize) -> Option<Kdj> {
    if n == 0 || m1 == 0 || m2 == 0 || candles.len() < n {
        return None;
    }
    let mut k = 50.0;
    let mut d = 50.0;
    for i in n - 1..candles.len() {
        let window = &candles[i + 1 - n..=i];
        let lowest = window.iter().map(|c| c.low).min().unwrap_or(window[0].low);
        let highest = window.iter().map(|c| c.high).max().unwrap_or(window[0].high);
        let lowest: f64 = lowest.to_string().parse().unwrap_or(0.0);
        let highest: f64 = highest.to_string().parse().unwrap_or(0.0);
        let close: f64 = window.last().unwrap().close.to_string().parse().unwrap_or(0.0);

        let rsv = if highest - lowest <= f64::EPSILON {
            50.0
        } else {
            (close - lowest) / (highest - lowest) * 100.0
        };
        k = (k * (m1 as f64 - 1.0) + rsv) / m1 as f64;
        d = (d * (m2 as f64 - 1.0) + k) / m2 as f64;
    }
    let j = 3.0 * k - 2.0 * d;
    Some(Kdj { k, d, j })
}

/// Current volume divided by the `period`-bar average volume. Division by
/// zero yields the neutral default `1.0`, never `NaN` or `Inf`.
pub fn volume_ratio(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < period + 1 || period == 0 {
        return 1.0;
    }
    let history = &candles[candles.len() - period - 1..candles.len() - 1];
    let avg: f64 = history
        .iter()
        .map(|c| c.volume.to_string().parse::<f64>().unwrap_or(0.0))
        .sum::<f64>()
        / period as f64;
    if avg <= f64::EPSILON {
        return 1.0;
    }
    let current: f64 = candles
        .last()
        .map(|c| c.volume.to_string().parse::<f64>().unwrap_or(0.0))
        .unwrap_or(0.0);
    let ratio = current / avg;
    if ratio.is_finite() {
        ratio
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn series(closes: &[i64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: i as i64 * 60_000,
                open: Decimal::from(c),
                high: Decimal::from(c + 1),
                low: Decimal::from(c - 1),
                close: Decimal::from(c),
                volume: dec!(100),
            })
            .collect()
    }

    use rust_decimal::Decimal;

    #[test]
    fn sma_basic() {
        let candles = series(&[1, 2, 3, 4, 5]);
        assert_eq!(sma(&candles, 5), Some(3.0));
        assert_eq!(sma(&candles, 10), None);
    }

    #[test]
    fn ema_converges_toward_trend() {
        let candles = series(&[10; 30]);
        let value = ema(&candles, 9).unwrap();
        assert!((value - 10.0).abs() < 1e-6);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let closes: Vec<i64> = (1..=20).collect();
        let candles = series(&closes);
        let value = rsi(&candles, 14).unwrap();
        assert!((value - 100.0).abs() < 1e-6);
    }

    #[test]
    fn macd_needs_enough_history() {
        let candles = series(&(1..=10).collect::<Vec<i64>>());
        assert_eq!(macd(&candles, 12, 26, 9), None);
    }

    #[test]
    fn bollinger_flat_series_has_zero_width() {
        let candles = series(&[50; 20]);
        let bands = bollinger(&candles, 20, 2.0).unwrap();
        assert_eq!(bands.upper, bands.middle);
        assert_eq!(bands.lower, bands.middle);
    }

    #[test]
    fn volume_ratio_defaults_to_neutral_on_insufficient_history() {
        let candles = series(&[1, 2]);
        assert_eq!(volume_ratio(&candles, 20), 1.0);
    }

    #[test]
    fn volume_ratio_never_nan() {
        let mut candles = series(&[1; 21]);
        for c in candles.iter_mut().take(20) {
            c.volume = Decimal::ZERO;
        }
        let ratio = volume_ratio(&candles, 20);
        assert_eq!(ratio, 1.0);
        assert!(ratio.is_finite());
    }

    #[test]
    fn kdj_seeds_neutral_and_stays_finite() {
        let candles = series(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 9, 8, 7]);
        let value = kdj(&candles, 9, 3, 3).unwrap();
        assert!(value.k.is_finite());
        assert!(value.d.is_finite());
        assert!(value.j.is_finite());
    }

    #[test]
    fn atr_requires_extra_candle() {
        let candles = series(&[10, 11]);
        assert!(atr(&candles, 1).is_some());
        assert!(atr(&candles, 2).is_none());
    }
}
