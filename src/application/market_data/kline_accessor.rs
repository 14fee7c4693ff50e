use std::sync::Arc;

use crate::domain::errors::{EngineError, StaleData};
use crate::domain::market::{Candle, Timeframe};
use crate::domain::repositories::KlineRepository;

/// Thin read boundary in front of `KlineRepository` (spec §4.2): callers ask
/// for candles by symbol/timeframe/count and get back oldest-first history,
/// or an explicit `StaleData::InsufficientKlines` once a component's minimum
/// window can't be satisfied, instead of quietly scoring on too little data.
pub struct KlineAccessor {
    repo: Arc<dyn KlineRepository>,
}

impl KlineAccessor {
    pub fn new(repo: Arc<dyn KlineRepository>) -> Self {
        Self { repo }
    }

    pub async fn recent(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        self.repo.candles(symbol, timeframe, limit).await
    }

    /// Same as `recent`, but fails loudly when fewer than `min_required`
    /// candles are available, so a component never silently scores on a
    /// short window.
    pub async fn require(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        min_required: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        let candles = self.recent(symbol, timeframe, limit).await?;
        if candles.len() < min_required {
            return Err(StaleData::InsufficientKlines {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                have: candles.len(),
                need: min_required,
            }
            .into());
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    struct FakeKlines(Mutex<Vec<Candle>>);

    #[async_trait]
    impl KlineRepository for FakeKlines {
        async fn candles(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            limit: usize,
        ) -> Result<Vec<Candle>, EngineError> {
            let all = self.0.lock().unwrap();
            Ok(all.iter().rev().take(limit).rev().cloned().collect())
        }
    }

    fn candle() -> Candle {
        Candle {
            open_time: 0,
            open: Decimal::ONE,
            high: Decimal::ONE,
            low: Decimal::ONE,
            close: Decimal::ONE,
            volume: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn require_errors_when_history_too_short() {
        let accessor = KlineAccessor::new(Arc::new(FakeKlines(Mutex::new(vec![candle()]))));
        let err = accessor
            .require("BTC/USDT", Timeframe::FifteenMin, 16, 16)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn require_succeeds_with_enough_history() {
        let candles: Vec<Candle> = (0..16).map(|_| candle()).collect();
        let accessor = KlineAccessor::new(Arc::new(FakeKlines(Mutex::new(candles))));
        let result = accessor
            .require("BTC/USDT", Timeframe::FifteenMin, 16, 16)
            .await
            .unwrap();
        assert_eq!(result.len(), 16);
    }
}
