use std::sync::Arc;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::application::market_data::KlineAccessor;
use crate::domain::errors::EngineError;
use crate::domain::market::Timeframe;
use crate::domain::regime::{big4, Big4Result};

const DEFAULT_CACHE_TTL_SECS: i64 = 3600;
const LOOKBACK_CANDLES: usize = 16;

/// Caches the four-symbol regime read behind a TTL so every scan doesn't
/// recompute it from scratch (spec §4.4: "recomputed at most once per cache
/// TTL, default 60 minutes").
pub struct Big4Service {
    symbols: [String; 4],
    klines: Arc<KlineAccessor>,
    cache_ttl: Duration,
    cached: RwLock<Option<(Big4Result, DateTime<Utc>)>>,
}

impl Big4Service {
    pub fn new(symbols: [String; 4], klines: Arc<KlineAccessor>, cache_ttl_secs_override: Option<u64>) -> Self {
        let cache_ttl = Duration::seconds(
            cache_ttl_secs_override
                .map(|s| s as i64)
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
        );
        Self {
            symbols,
            klines,
            cache_ttl,
            cached: RwLock::new(None),
        }
    }

    fn cached_if_fresh(&self, now: DateTime<Utc>) -> Option<Big4Result> {
        let guard = match self.cached.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .filter(|(_, computed_at)| now - *computed_at <= self.cache_ttl)
            .map(|(result, _)| result.clone())
    }

    /// Returns the cached regime read if still within TTL, otherwise
    /// recomputes from the latest 15m candles for each of the four symbols.
    /// A symbol with insufficient history simply abstains (spec §4.4.1);
    /// quorum is enforced inside `big4::aggregate`.
    pub async fn current(&self) -> Result<Big4Result, EngineError> {
        let now = Utc::now();
        if let Some(cached) = self.cached_if_fresh(now) {
            return Ok(cached);
        }

        let mut details = Vec::with_capacity(4);
        for symbol in &self.symbols {
            let candles = self
                .klines
                .recent(symbol, Timeframe::FifteenMin, LOOKBACK_CANDLES)
                .await?;
            if let Some(signal) = big4::symbol_signal(symbol, &candles) {
                details.push(signal);
            }
        }

        let (overall_signal, signal_strength) = big4::aggregate(&details);
        let result = Big4Result {
            overall_signal,
            signal_strength,
            details_per_symbol: details,
            detected_at: now,
        };

        let mut guard = match self.cached.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some((result.clone(), now));
        Ok(result)
    }

    /// Forces the next `current()` call to recompute, used by the
    /// synchronized-reversal check which needs a fresher read than the
    /// cache TTL guarantees.
    pub fn invalidate(&self) {
        let mut guard = match self.cached.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Candle;
    use crate::domain::repositories::KlineRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FlatKlines;

    #[async_trait]
    impl KlineRepository for FlatKlines {
        async fn candles(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<Vec<Candle>, EngineError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn empty_history_reports_neutral_not_error() {
        let accessor = Arc::new(KlineAccessor::new(Arc::new(FlatKlines)));
        let symbols = [
            "BTC/USDT".to_string(),
            "ETH/USDT".to_string(),
            "BNB/USDT".to_string(),
            "SOL/USDT".to_string(),
        ];
        let service = Big4Service::new(symbols, accessor, None);
        let result = service.current().await.unwrap();
        assert_eq!(result.details_per_symbol.len(), 0);
    }

    struct CountingKlines(Mutex<u32>);

    #[async_trait]
    impl KlineRepository for CountingKlines {
        async fn candles(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<Vec<Candle>, EngineError> {
            *self.0.lock().unwrap() += 1;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn second_call_within_ttl_uses_cache() {
        let counting = Arc::new(CountingKlines(Mutex::new(0)));
        let accessor = Arc::new(KlineAccessor::new(counting.clone()));
        let symbols = [
            "BTC/USDT".to_string(),
            "ETH/USDT".to_string(),
            "BNB/USDT".to_string(),
            "SOL/USDT".to_string(),
        ];
        let service = Big4Service::new(symbols, accessor, Some(3600));
        service.current().await.unwrap();
        service.current().await.unwrap();
        assert_eq!(*counting.0.lock().unwrap(), 4, "second call must hit cache, not re-fetch");
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let counting = Arc::new(CountingKlines(Mutex::new(0)));
        let accessor = Arc::new(KlineAccessor::new(counting.clone()));
        let symbols = [
            "BTC/USDT".to_string(),
            "ETH/USDT".to_string(),
            "BNB/USDT".to_string(),
            "SOL/USDT".to_string(),
        ];
        let service = Big4Service::new(symbols, accessor, Some(3600));
        service.current().await.unwrap();
        service.invalidate();
        service.current().await.unwrap();
        assert_eq!(*counting.0.lock().unwrap(), 8);
    }
}
