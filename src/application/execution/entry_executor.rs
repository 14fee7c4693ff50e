use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{ContractViolation, EngineError};
use crate::domain::ports::{ExchangeClient, ExchangeOrderRequest, ExchangeFill, PriceFeed};
use crate::domain::regime::{mode, Big4Signal};
use crate::domain::repositories::PositionRepository;
use crate::domain::risk::{AdaptiveParams, SymbolRating, VolatilityProfile};
use crate::domain::signal::SignalCandidate;
use crate::domain::trading::{OrderKind, Position, PositionStatus, Side};

/// Position-sizing and stop/take-profit inputs not themselves persisted;
/// callers assemble these per scan from the hot-reloadable risk tables.
pub struct EntryContext<'a> {
    pub account_id: Uuid,
    pub default_position_size: Decimal,
    pub rating: &'a SymbolRating,
    pub adaptive_params: &'a AdaptiveParams,
    pub volatility_profile: Option<&'a VolatilityProfile>,
    pub big4_signal: Big4Signal,
    pub leverage: u32,
}

/// Widens the stop-loss 1.5x when `volatility_high` fired as a component
/// (spec §4.7 "volatility-aware stop widening").
const VOLATILITY_STOP_WIDEN: Decimal = dec!(1.5);

/// Default max hold duration bucketed by score; higher-conviction signals
/// earn more time before the timeout exit fires (spec §4.7/§4.8).
fn max_hold_minutes_for_score(score: Decimal) -> i64 {
    if score >= dec!(60) {
        240
    } else if score >= dec!(45) {
        180
    } else {
        120
    }
}

pub struct EntryExecutor {
    price_feed: Arc<dyn PriceFeed>,
    exchange: Arc<dyn ExchangeClient>,
    positions: Arc<dyn PositionRepository>,
}

impl EntryExecutor {
    pub fn new(
        price_feed: Arc<dyn PriceFeed>,
        exchange: Arc<dyn ExchangeClient>,
        positions: Arc<dyn PositionRepository>,
    ) -> Self {
        Self {
            price_feed,
            exchange,
            positions,
        }
    }

    fn validate_symbol(symbol: &str) -> Result<(), EngineError> {
        if !symbol.ends_with("/USDT") {
            return Err(ContractViolation::UnsupportedSymbolSuffix {
                symbol: symbol.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Rejects a quote the gateway has already flagged as stale (spec
    /// §4.7a "fetches a non-stale price") instead of sizing/ordering off it.
    fn reject_if_stale(symbol: &str, quote: &crate::domain::ports::PriceQuote) -> Result<(), EngineError> {
        if quote.source == crate::domain::ports::PriceSource::Stale {
            let age_secs = (Utc::now() - quote.as_of).num_seconds().max(0);
            return Err(crate::domain::errors::StaleData::StalePrice {
                symbol: symbol.to_string(),
                age_secs,
                max_age_secs: crate::application::price_feed::gateway::KLINE_STALE_AFTER.num_seconds(),
            }
            .into());
        }
        Ok(())
    }

    fn sizing(
        &self,
        candidate: &SignalCandidate,
        ctx: &EntryContext,
        price: Decimal,
    ) -> (Decimal, Decimal, Decimal) {
        let position_size = candidate
            .position_size_override
            .unwrap_or(ctx.default_position_size);
        let base_margin = position_size * ctx.rating.margin_multiplier;
        // Range-mode candidates carry their own fixed exits and don't share
        // in the trend-regime position-size bonus.
        let regime_multiplier = if candidate.position_size_override.is_some() {
            Decimal::ONE
        } else {
            mode::regime_multiplier(ctx.big4_signal, candidate.side == Side::Long)
        };
        let adjusted_margin = base_margin * regime_multiplier;
        let quantity = adjusted_margin * Decimal::from(ctx.leverage) / price;
        (adjusted_margin, regime_multiplier, quantity)
    }

    fn stop_and_take_profit(
        &self,
        candidate: &SignalCandidate,
        ctx: &EntryContext,
        price: Decimal,
    ) -> (Decimal, Decimal) {
        if let (Some(sl), Some(tp)) = (candidate.fixed_stop_loss_price, candidate.fixed_take_profit_price) {
            return (sl, tp);
        }

        let side = candidate.side;
        let mut stop_pct = ctx.adaptive_params.stop_loss_pct(side);
        if candidate
            .signal_components
            .iter()
            .any(|c| c == "volatility_high")
        {
            stop_pct *= VOLATILITY_STOP_WIDEN;
        }
        let take_profit_pct = ctx
            .volatility_profile
            .map(|p| p.take_profit_pct(side))
            .unwrap_or_else(|| ctx.adaptive_params.take_profit_pct(side));

        match side {
            Side::Long => (
                price * (Decimal::ONE - stop_pct / dec!(100)),
                price * (Decimal::ONE + take_profit_pct / dec!(100)),
            ),
            Side::Short => (
                price * (Decimal::ONE + stop_pct / dec!(100)),
                price * (Decimal::ONE - take_profit_pct / dec!(100)),
            ),
        }
    }

    /// (a) Immediate entry (spec §4.7a): validate, size, fetch a fill,
    /// persist the open position and debit margin in one transaction.
    pub async fn immediate_entry(
        &self,
        candidate: &SignalCandidate,
        ctx: &EntryContext<'_>,
    ) -> Result<Position, EngineError> {
        Self::validate_symbol(&candidate.symbol)?;

        let quote = self.price_feed.get_price(&candidate.symbol).await?;
        Self::reject_if_stale(&candidate.symbol, &quote)?;
        let (adjusted_margin, _regime_multiplier, quantity) = self.sizing(candidate, ctx, quote.price);

        let fill: ExchangeFill = self
            .exchange
            .place_order(ExchangeOrderRequest {
                symbol: candidate.symbol.clone(),
                side: OrderKind::opening(candidate.side),
                quantity,
                leverage: ctx.leverage,
            })
            .await?;

        let (stop_loss_price, take_profit_price) = if let Some(info) = candidate.breakout_info {
            let (_, tp) = self.stop_and_take_profit(candidate, ctx, fill.avg_fill_price);
            (info.broken_level, tp)
        } else {
            self.stop_and_take_profit(candidate, ctx, fill.avg_fill_price)
        };

        let now = Utc::now();
        let max_hold_minutes = candidate
            .max_hold_minutes_override
            .unwrap_or_else(|| max_hold_minutes_for_score(Decimal::try_from(candidate.score).unwrap_or_default()));

        let position = Position {
            id: Uuid::new_v4(),
            account_id: ctx.account_id,
            symbol: candidate.symbol.clone(),
            side: candidate.side,
            quantity: fill.executed_quantity,
            entry_price: fill.avg_fill_price,
            avg_entry_price: fill.avg_fill_price,
            leverage: ctx.leverage,
            notional_value: fill.avg_fill_price * fill.executed_quantity,
            margin: adjusted_margin,
            open_time: now,
            close_time: None,
            stop_loss_price,
            take_profit_price,
            entry_signal_type: candidate.fingerprint(),
            entry_reason: format!("score {:.1}", candidate.score),
            entry_score: Decimal::try_from(candidate.score).unwrap_or_default(),
            signal_components: candidate.signal_components.clone(),
            max_hold_minutes,
            timeout_at: now + Duration::minutes(max_hold_minutes),
            status: PositionStatus::Open,
            realized_pnl: Decimal::ZERO,
            notes: Vec::new(),
            updated_at: now,
        };

        self.positions
            .open_and_debit(position.clone(), adjusted_margin)
            .await?;

        info!(
            symbol = %candidate.symbol,
            side = %candidate.side,
            margin = %adjusted_margin,
            "opened position"
        );

        Ok(position)
    }

    /// (b) Batched entry (spec §4.7b): inserts a `building` position, then
    /// releases `slices` fills over `horizon`, re-validating before each.
    /// `should_continue` is re-evaluated before every slice; a `false`
    /// return cancels the remaining slices without failing the ones
    /// already filled.
    pub async fn batched_entry<F, Fut>(
        &self,
        candidate: &SignalCandidate,
        ctx: &EntryContext<'_>,
        slices: u32,
        horizon: Duration,
        should_continue: F,
    ) -> Result<Position, EngineError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        Self::validate_symbol(&candidate.symbol)?;
        if slices == 0 {
            return Err(ContractViolation::MissingField { field: "slices" }.into());
        }
        if !candidate.allow_batched_entry {
            return Err(ContractViolation::MissingField {
                field: "allow_batched_entry",
            }
            .into());
        }

        let first_quote = self.price_feed.get_price(&candidate.symbol).await?;
        Self::reject_if_stale(&candidate.symbol, &first_quote)?;
        let (adjusted_margin, _, total_quantity) = self.sizing(candidate, ctx, first_quote.price);
        let slice_margin = adjusted_margin / Decimal::from(slices);
        let slice_interval = horizon / slices as i32;

        let now = Utc::now();
        let max_hold_minutes = candidate
            .max_hold_minutes_override
            .unwrap_or_else(|| max_hold_minutes_for_score(Decimal::try_from(candidate.score).unwrap_or_default()));
        let mut position = Position {
            id: Uuid::new_v4(),
            account_id: ctx.account_id,
            symbol: candidate.symbol.clone(),
            side: candidate.side,
            quantity: Decimal::ZERO,
            entry_price: first_quote.price,
            avg_entry_price: first_quote.price,
            leverage: ctx.leverage,
            notional_value: Decimal::ZERO,
            margin: Decimal::ZERO,
            open_time: now,
            close_time: None,
            stop_loss_price: Decimal::ZERO,
            take_profit_price: Decimal::ZERO,
            entry_signal_type: candidate.fingerprint(),
            entry_reason: format!("score {:.1} (batched)", candidate.score),
            entry_score: Decimal::try_from(candidate.score).unwrap_or_default(),
            signal_components: candidate.signal_components.clone(),
            max_hold_minutes,
            timeout_at: now + Duration::minutes(max_hold_minutes),
            status: PositionStatus::Building,
            realized_pnl: Decimal::ZERO,
            notes: Vec::new(),
            updated_at: now,
        };
        self.positions.open_and_debit(position.clone(), Decimal::ZERO).await?;

        let slice_quantity = total_quantity / Decimal::from(slices);
        for i in 0..slices {
            if !should_continue().await {
                warn!(symbol = %candidate.symbol, slice = i, "batched entry canceled mid-build");
                break;
            }
            if i > 0 {
                tokio::time::sleep(slice_interval.to_std().unwrap_or_default()).await;
            }

            let fill = self
                .exchange
                .place_order(ExchangeOrderRequest {
                    symbol: candidate.symbol.clone(),
                    side: OrderKind::opening(candidate.side),
                    quantity: slice_quantity,
                    leverage: ctx.leverage,
                })
                .await?;

            self.positions
                .append_slice_fill(position.id, fill.executed_quantity, slice_margin)
                .await?;
            position.quantity += fill.executed_quantity;
            position.margin += slice_margin;

            if i == 0 {
                let (stop_loss_price, take_profit_price) =
                    self.stop_and_take_profit(candidate, ctx, fill.avg_fill_price);
                position.stop_loss_price = stop_loss_price;
                position.take_profit_price = take_profit_price;
                position.status = PositionStatus::Open;
                self.positions.promote_to_open(position.id).await?;
            }
        }

        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::market::Candle;
    use crate::domain::ports::{PriceQuote, PriceSource};
    use crate::domain::repositories::*;
    use crate::domain::risk::RatingLevel;
    use crate::domain::trading::{Order, Trade};
    use std::sync::Mutex;

    struct FixedPriceFeed(Decimal);
    #[async_trait]
    impl PriceFeed for FixedPriceFeed {
        async fn get_price(&self, _symbol: &str) -> Result<PriceQuote, EngineError> {
            Ok(PriceQuote {
                price: self.0,
                source: PriceSource::Stream,
                as_of: Utc::now(),
            })
        }
    }

    struct FixedExchange;
    #[async_trait]
    impl ExchangeClient for FixedExchange {
        async fn place_order(&self, request: ExchangeOrderRequest) -> Result<ExchangeFill, EngineError> {
            Ok(ExchangeFill {
                avg_fill_price: dec!(50000),
                executed_quantity: request.quantity,
                fee: dec!(0.1),
                fee_rate: dec!(0.0004),
                fill_time: Utc::now(),
            })
        }
    }

    struct RecordingPositions(Mutex<Vec<Position>>);
    #[async_trait]
    impl PositionRepository for RecordingPositions {
        async fn find_active(&self, _: Uuid, _: &str, _: Side) -> Result<Option<Position>, EngineError> {
            Ok(None)
        }
        async fn find_by_id(&self, _: Uuid) -> Result<Option<Position>, EngineError> {
            Ok(None)
        }
        async fn find_all_active(&self, _: Uuid) -> Result<Vec<Position>, EngineError> {
            Ok(Vec::new())
        }
        async fn find_active_by_side(&self, _: Uuid, _: Side) -> Result<Vec<Position>, EngineError> {
            Ok(Vec::new())
        }
        async fn find_closed_since(&self, _: Uuid, _: DateTime<Utc>) -> Result<Vec<Position>, EngineError> {
            Ok(Vec::new())
        }
        async fn open_and_debit(&self, position: Position, _margin: Decimal) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(position);
            Ok(())
        }
        async fn append_slice_fill(&self, _: Uuid, _: Decimal, _: Decimal) -> Result<(), EngineError> {
            Ok(())
        }
        async fn promote_to_open(&self, _: Uuid) -> Result<(), EngineError> {
            Ok(())
        }
        async fn apply_partial_close(&self, _: Uuid, _: Decimal, _: Decimal, _: Decimal) -> Result<(), EngineError> {
            Ok(())
        }
        async fn close_with_fill(
            &self,
            _: Uuid,
            _: Order,
            _: Trade,
            _: Decimal,
            _: Decimal,
            _: DateTime<Utc>,
        ) -> Result<(), EngineError> {
            Ok(())
        }
        async fn push_note(&self, _: Uuid, _: &str) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn rating() -> SymbolRating {
        SymbolRating {
            symbol: "BTC/USDT".into(),
            rating_level: RatingLevel::Whitelist,
            margin_multiplier: Decimal::ONE,
        }
    }

    fn adaptive_params() -> AdaptiveParams {
        AdaptiveParams {
            long_stop_loss_pct: dec!(1.0),
            long_take_profit_pct: dec!(2.0),
            short_stop_loss_pct: dec!(1.0),
            short_take_profit_pct: dec!(2.0),
            min_holding_minutes: 10,
            position_size_multiplier: Decimal::ONE,
        }
    }

    fn candidate() -> SignalCandidate {
        SignalCandidate {
            symbol: "BTC/USDT".into(),
            side: Side::Long,
            score: 50.0,
            current_price: dec!(50000),
            signal_components: vec!["breakout_strong".into()],
            breakout_info: None,
            fixed_stop_loss_price: None,
            fixed_take_profit_price: None,
            position_size_override: None,
            allow_batched_entry: true,
            max_hold_minutes_override: None,
        }
    }

    #[tokio::test]
    async fn immediate_entry_rejects_non_usdt_symbol() {
        let executor = EntryExecutor::new(
            Arc::new(FixedPriceFeed(dec!(50000))),
            Arc::new(FixedExchange),
            Arc::new(RecordingPositions(Mutex::new(Vec::new()))),
        );
        let mut bad_candidate = candidate();
        bad_candidate.symbol = "BTC/USD".into();
        let ctx = EntryContext {
            account_id: Uuid::new_v4(),
            default_position_size: dec!(400),
            rating: &rating(),
            adaptive_params: &adaptive_params(),
            volatility_profile: None,
            big4_signal: Big4Signal::Neutral,
            leverage: 5,
        };
        let err = executor.immediate_entry(&bad_candidate, &ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::ContractViolation(_)));
    }

    #[tokio::test]
    async fn immediate_entry_sizes_margin_with_regime_bonus() {
        let positions = Arc::new(RecordingPositions(Mutex::new(Vec::new())));
        let executor = EntryExecutor::new(
            Arc::new(FixedPriceFeed(dec!(50000))),
            Arc::new(FixedExchange),
            positions.clone(),
        );
        let ctx = EntryContext {
            account_id: Uuid::new_v4(),
            default_position_size: dec!(400),
            rating: &rating(),
            adaptive_params: &adaptive_params(),
            volatility_profile: None,
            big4_signal: Big4Signal::Bullish,
            leverage: 5,
        };
        let position = executor.immediate_entry(&candidate(), &ctx).await.unwrap();
        assert_eq!(position.margin, dec!(480));
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(positions.0.lock().unwrap().len(), 1);
    }

    #[allow(dead_code)]
    fn candle_unused() -> Candle {
        Candle {
            open_time: 0,
            open: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            close: Decimal::ZERO,
            volume: Decimal::ZERO,
        }
    }
}
