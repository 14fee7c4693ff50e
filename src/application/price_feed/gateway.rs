use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::errors::{EngineError, StaleData};
use crate::domain::market::Timeframe;
use crate::domain::ports::{PriceFeed, PriceQuote, PriceSource};
use crate::domain::repositories::KlineRepository;

/// How long a streamed tick is trusted before the gateway falls back to the
/// most recent closed kline (spec §4.1).
const STREAM_STALE_AFTER: Duration = Duration::seconds(10);
/// How long a kline-derived price is trusted before `get_price` reports
/// `PriceSource::Stale` instead of silently answering with old data. Public
/// so callers that reject a stale quote (`entry_executor`) can report the
/// actual threshold rather than a made-up number.
pub const KLINE_STALE_AFTER: Duration = Duration::seconds(120);

#[derive(Debug, Clone, Copy)]
struct Tick {
    price: Decimal,
    as_of: DateTime<Utc>,
}

/// Caches the latest streamed tick per symbol and falls back to the k-line
/// store when the stream has gone quiet, grounded on the teacher's
/// `RwLock<HashMap<_>>`-per-symbol cache pattern.
pub struct PriceFeedGateway {
    ticks: RwLock<HashMap<String, Tick>>,
    klines: Arc<dyn KlineRepository>,
}

impl std::fmt::Debug for PriceFeedGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeedGateway")
            .field("ticks", &"<RwLock>")
            .finish()
    }
}

impl PriceFeedGateway {
    pub fn new(klines: Arc<dyn KlineRepository>) -> Self {
        Self {
            ticks: RwLock::new(HashMap::new()),
            klines,
        }
    }

    /// Called by the websocket ingestion task on every trade/book tick.
    pub fn record_tick(&self, symbol: &str, price: Decimal, as_of: DateTime<Utc>) {
        let mut guard = match self.ticks.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(symbol.to_string(), Tick { price, as_of });
    }

    fn fresh_tick(&self, symbol: &str, now: DateTime<Utc>) -> Option<Tick> {
        let guard = match self.ticks.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .get(symbol)
            .copied()
            .filter(|t| now - t.as_of <= STREAM_STALE_AFTER)
    }
}

#[async_trait]
impl PriceFeed for PriceFeedGateway {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, EngineError> {
        let now = Utc::now();

        if let Some(tick) = self.fresh_tick(symbol, now) {
            return Ok(PriceQuote {
                price: tick.price,
                source: PriceSource::Stream,
                as_of: tick.as_of,
            });
        }

        let candles = self.klines.candles(symbol, Timeframe::FiveMin, 1).await?;
        let Some(candle) = candles.last() else {
            return Err(StaleData::InsufficientKlines {
                symbol: symbol.to_string(),
                timeframe: Timeframe::FiveMin.to_string(),
                have: 0,
                need: 1,
            }
            .into());
        };

        let close_time = Utc
            .timestamp_millis_opt(candle.open_time + Timeframe::FiveMin.to_millis())
            .single()
            .unwrap_or(now);

        let source = if now - close_time <= KLINE_STALE_AFTER {
            PriceSource::Kline
        } else {
            PriceSource::Stale
        };

        Ok(PriceQuote {
            price: candle.close,
            source,
            as_of: close_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Candle;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct FakeKlines(Mutex<Vec<Candle>>);

    #[async_trait]
    impl KlineRepository for FakeKlines {
        async fn candles(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<Vec<Candle>, EngineError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn candle_at(close: Decimal, open_time_millis: i64) -> Candle {
        Candle {
            open_time: open_time_millis,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn prefers_fresh_stream_tick_over_kline() {
        let now = Utc::now();
        let klines = Arc::new(FakeKlines(Mutex::new(vec![candle_at(
            dec!(100),
            now.timestamp_millis(),
        )])));
        let gw = PriceFeedGateway::new(klines);
        gw.record_tick("BTC/USDT", dec!(123.45), now);

        let quote = gw.get_price("BTC/USDT").await.unwrap();
        assert_eq!(quote.source, PriceSource::Stream);
        assert_eq!(quote.price, dec!(123.45));
    }

    #[tokio::test]
    async fn falls_back_to_kline_when_stream_stale() {
        let now = Utc::now();
        let klines = Arc::new(FakeKlines(Mutex::new(vec![candle_at(
            dec!(200),
            now.timestamp_millis() - Timeframe::FiveMin.to_millis(),
        )])));
        let gw = PriceFeedGateway::new(klines);
        gw.record_tick("BTC/USDT", dec!(1), now - Duration::seconds(30));

        let quote = gw.get_price("BTC/USDT").await.unwrap();
        assert_eq!(quote.source, PriceSource::Kline);
    }

    #[tokio::test]
    async fn reports_stale_when_kline_is_old_too() {
        let now = Utc::now();
        let klines = Arc::new(FakeKlines(Mutex::new(vec![candle_at(
            dec!(200),
            (now - Duration::minutes(10)).timestamp_millis(),
        )])));
        let gw = PriceFeedGateway::new(klines);

        let quote = gw.get_price("BTC/USDT").await.unwrap();
        assert_eq!(quote.source, PriceSource::Stale);
    }

    #[tokio::test]
    async fn errors_when_no_data_at_all() {
        let klines = Arc::new(FakeKlines(Mutex::new(vec![])));
        let gw = PriceFeedGateway::new(klines);

        let err = gw.get_price("BTC/USDT").await.unwrap_err();
        assert!(matches!(err, EngineError::StaleData(_)));
    }
}
