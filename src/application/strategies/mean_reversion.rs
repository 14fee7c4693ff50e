//! Range-mode candidate generator (spec §2 "Strategy Modules" row (b),
//! §9 redesign note 2): Bollinger-band mean reversion with an RSI
//! confirmation, producing its own fixed stop-loss/take-profit prices
//! rather than the adaptive-parameters percentages used by trend-mode
//! candidates. The scan loop never calls this while `Mode::Range` is
//! active (spec §4.5 "forbids entries in range mode") — kept fully
//! implemented so the contract survives if that gate is ever lifted.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::market_data::KlineAccessor;
use crate::domain::errors::EngineError;
use crate::domain::market::indicators;
use crate::domain::market::Timeframe;
use crate::domain::signal::SignalCandidate;
use crate::domain::trading::Side;

#[derive(Debug, Clone)]
pub struct MeanReversionConfig {
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Absolute USDT margin, smaller than the trend-mode default (source:
    /// `range_position_size`, typically a fraction of the trend default).
    pub position_size: Decimal,
    pub fixed_stop_loss_pct: Decimal,
    pub max_hold_minutes: i64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            position_size: dec!(30),
            fixed_stop_loss_pct: dec!(2.0),
            max_hold_minutes: 240,
        }
    }
}

pub struct MeanReversionGenerator {
    klines: std::sync::Arc<KlineAccessor>,
    config: MeanReversionConfig,
}

impl MeanReversionGenerator {
    pub fn new(klines: std::sync::Arc<KlineAccessor>, config: MeanReversionConfig) -> Self {
        Self { klines, config }
    }

    /// LONG: close below the lower band and RSI oversold. SHORT: close
    /// above the upper band and RSI overbought. Take-profit targets the
    /// middle band; stop-loss is a fixed percentage beyond entry rather
    /// than volatility-scaled, since a reversion trade that keeps moving
    /// against the band has already falsified the thesis.
    pub async fn generate(&self, symbol: &str) -> Result<Option<SignalCandidate>, EngineError> {
        let candles = self
            .klines
            .require(symbol, Timeframe::FifteenMin, self.config.bollinger_period + 10, self.config.bollinger_period)
            .await?;

        let bands = match indicators::bollinger(&candles, self.config.bollinger_period, self.config.bollinger_std_dev) {
            Some(b) => b,
            None => return Ok(None),
        };
        let rsi = match indicators::rsi(&candles, self.config.rsi_period) {
            Some(r) => r,
            None => return Ok(None),
        };

        let current_price = match candles.last() {
            Some(c) => c.close,
            None => return Ok(None),
        };
        let price_f64 = current_price.to_f64().unwrap_or(0.0);

        let side = if price_f64 < bands.lower && rsi < self.config.rsi_oversold {
            Side::Long
        } else if price_f64 > bands.upper && rsi > self.config.rsi_overbought {
            Side::Short
        } else {
            return Ok(None);
        };

        let middle = Decimal::try_from(bands.middle).unwrap_or(current_price);
        let stop_loss_price = match side {
            Side::Long => current_price * (Decimal::ONE - self.config.fixed_stop_loss_pct / dec!(100)),
            Side::Short => current_price * (Decimal::ONE + self.config.fixed_stop_loss_pct / dec!(100)),
        };

        Ok(Some(SignalCandidate {
            symbol: symbol.to_string(),
            side,
            score: 40.0,
            current_price,
            signal_components: vec!["range_bollinger_reversion".to_string()],
            breakout_info: None,
            fixed_stop_loss_price: Some(stop_loss_price),
            fixed_take_profit_price: Some(middle),
            position_size_override: Some(self.config.position_size),
            allow_batched_entry: false,
            max_hold_minutes_override: Some(self.config.max_hold_minutes),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::domain::market::Candle;
    use crate::domain::repositories::KlineRepository;

    struct FixedKlines(Vec<Candle>);
    #[async_trait]
    impl KlineRepository for FixedKlines {
        async fn candles(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>, EngineError> {
            Ok(self.0.clone())
        }
    }

    fn candle(close: f64, open_time: i64) -> Candle {
        let close = Decimal::try_from(close).unwrap();
        Candle {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(100),
        }
    }

    fn generator(closes: Vec<f64>) -> MeanReversionGenerator {
        let candles: Vec<Candle> = closes
            .into_iter()
            .enumerate()
            .map(|(i, c)| candle(c, i as i64 * 900_000))
            .collect();
        let klines = std::sync::Arc::new(KlineAccessor::new(std::sync::Arc::new(FixedKlines(candles))));
        MeanReversionGenerator::new(klines, MeanReversionConfig::default())
    }

    #[tokio::test]
    async fn no_candidate_when_price_sits_inside_the_bands() {
        let closes: Vec<f64> = (0..30).map(|_| 100.0).collect();
        let gen = generator(closes);
        let candidate = gen.generate("BTC/USDT").await.unwrap();
        assert!(candidate.is_none());
    }

    #[tokio::test]
    async fn long_candidate_on_lower_band_breach_with_low_rsi() {
        let mut closes: Vec<f64> = (0..25).map(|_| 100.0).collect();
        closes.extend([98.0, 96.0, 94.0, 92.0, 85.0]);
        let gen = generator(closes);
        let candidate = gen.generate("BTC/USDT").await.unwrap().expect("expected a candidate");
        assert_eq!(candidate.side, Side::Long);
        assert!(candidate.fixed_stop_loss_price.is_some());
        assert!(candidate.fixed_take_profit_price.is_some());
        assert!(!candidate.allow_batched_entry);
        let _ = Utc::now();
    }
}
