//! Daily adaptive optimizer, run once at 02:00 UTC (spec §4.10). Reads the
//! last 24h of closed positions, computes realized performance per
//! (fingerprint, side), and — when `auto_apply` is set — writes adjusted
//! rows to Signal Quality, Signal Blacklist, Adaptive Parameters, Scoring
//! Weights and Symbol Rating. The Brain needs no explicit reload signal:
//! `ScanContext` already re-reads every repository fresh each scan (spec §5),
//! so a write here is visible on the very next tick.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::application::market_data::KlineAccessor;
use crate::domain::errors::EngineError;
use crate::domain::market::Timeframe;
use crate::domain::repositories::{
    AdaptiveParamsRepository, PositionRepository, ScoringWeightsRepository,
    SignalBlacklistRepository, SignalQualityRepository, SymbolRatingRepository,
    VolatilityProfileRepository,
};
use crate::domain::risk::{
    AdaptiveParams, RatingLevel, ScoringWeight, SignalBlacklistEntry, SignalQualityStats,
    SymbolRating, VolatilityProfile,
};
use crate::domain::trading::{Position, Side};

#[derive(Debug, Clone)]
pub struct AdaptiveOptimizerConfig {
    pub lookback: Duration,
    pub problematic_min_samples: u32,
    pub problematic_win_rate_pct: Decimal,
    pub blacklist_win_rate_pct: Decimal,
    pub blacklist_consecutive_losses: u32,
    pub stop_loss_widen_step: Decimal,
    pub holding_time_scale_step: Decimal,
    pub position_size_shrink_step: Decimal,
    pub weight_adjustment_step: Decimal,
    pub auto_apply: bool,
    pub volatility_candles: usize,
}

impl Default for AdaptiveOptimizerConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(24),
            problematic_min_samples: 5,
            problematic_win_rate_pct: dec!(40),
            blacklist_win_rate_pct: dec!(25),
            blacklist_consecutive_losses: 3,
            stop_loss_widen_step: dec!(0.25),
            holding_time_scale_step: dec!(1.1),
            position_size_shrink_step: dec!(0.9),
            weight_adjustment_step: dec!(0.1),
            auto_apply: true,
            volatility_candles: 96,
        }
    }
}

/// Realized performance for one (fingerprint, side) over the lookback
/// window, plus the flags derived from it.
#[derive(Debug, Clone)]
pub struct SignalPerformance {
    pub fingerprint: String,
    pub side: Side,
    pub sample_count: u32,
    pub win_rate: Decimal,
    pub avg_pnl: Decimal,
    pub problematic: bool,
    pub blacklist_candidate: bool,
}

/// What the optimizer decided this run, independent of whether it was
/// actually applied. Useful for dry-run inspection and for tests.
#[derive(Debug, Clone, Default)]
pub struct OptimizationReport {
    pub signal_performance: Vec<SignalPerformance>,
    pub blacklisted: Vec<SignalBlacklistEntry>,
    pub adjusted_params: HashMap<Side, AdaptiveParams>,
    pub adjusted_weights: Vec<ScoringWeight>,
    pub ratings: Vec<SymbolRating>,
    pub volatility_profiles: Vec<VolatilityProfile>,
}

pub struct AdaptiveOptimizer {
    positions: Arc<dyn PositionRepository>,
    klines: Arc<KlineAccessor>,
    quality: Arc<dyn SignalQualityRepository>,
    blacklist: Arc<dyn SignalBlacklistRepository>,
    params: Arc<dyn AdaptiveParamsRepository>,
    weights: Arc<dyn ScoringWeightsRepository>,
    ratings: Arc<dyn SymbolRatingRepository>,
    volatility: Arc<dyn VolatilityProfileRepository>,
    config: AdaptiveOptimizerConfig,
}

impl AdaptiveOptimizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        positions: Arc<dyn PositionRepository>,
        klines: Arc<KlineAccessor>,
        quality: Arc<dyn SignalQualityRepository>,
        blacklist: Arc<dyn SignalBlacklistRepository>,
        params: Arc<dyn AdaptiveParamsRepository>,
        weights: Arc<dyn ScoringWeightsRepository>,
        ratings: Arc<dyn SymbolRatingRepository>,
        volatility: Arc<dyn VolatilityProfileRepository>,
        config: AdaptiveOptimizerConfig,
    ) -> Self {
        Self {
            positions,
            klines,
            quality,
            blacklist,
            params,
            weights,
            ratings,
            volatility,
            config,
        }
    }

    /// Entry point for the daily scheduler tick. `symbols` drives the
    /// volatility-profile refresh, since that needs fresh candles per
    /// symbol rather than per closed position.
    pub async fn run_daily(
        &self,
        account_id: uuid::Uuid,
        symbols: &[String],
        now: DateTime<Utc>,
    ) -> Result<OptimizationReport, EngineError> {
        let since = now - self.config.lookback;
        let closed = self.positions.find_closed_since(account_id, since).await?;
        info!(count = closed.len(), "adaptive optimizer: evaluating closed positions");

        let mut report = OptimizationReport::default();
        report.signal_performance = self.evaluate_signals(&closed);
        report.ratings = self.evaluate_ratings(&closed);
        report.volatility_profiles = self.evaluate_volatility_profiles(symbols).await?;

        let (long_params, short_params) = self.suggest_params(&report.signal_performance);
        report.adjusted_params.insert(Side::Long, long_params);
        report.adjusted_params.insert(Side::Short, short_params);

        report.adjusted_weights = self.suggest_weight_adjustments(&closed);
        report.blacklisted = self.blacklist_candidates(&report.signal_performance);

        if self.config.auto_apply {
            self.apply(&report).await?;
        } else {
            info!("adaptive optimizer: auto_apply disabled, report computed but not written");
        }

        Ok(report)
    }

    fn evaluate_signals(&self, closed: &[Position]) -> Vec<SignalPerformance> {
        let mut groups: HashMap<(String, Side), Vec<&Position>> = HashMap::new();
        for p in closed {
            groups
                .entry((p.entry_signal_type.clone(), p.side))
                .or_default()
                .push(p);
        }

        groups
            .into_iter()
            .map(|((fingerprint, side), positions)| {
                let sample_count = positions.len() as u32;
                let wins = positions.iter().filter(|p| p.realized_pnl > Decimal::ZERO).count();
                let win_rate = Decimal::from(wins) / Decimal::from(sample_count) * Decimal::from(100);
                let total_pnl: Decimal = positions.iter().map(|p| p.realized_pnl).sum();
                let avg_pnl = total_pnl / Decimal::from(sample_count);

                let problematic = sample_count >= self.config.problematic_min_samples
                    && win_rate < self.config.problematic_win_rate_pct
                    && avg_pnl < Decimal::ZERO;

                let consecutive_losses = Self::trailing_consecutive_losses(&positions);
                let blacklist_candidate = win_rate < self.config.blacklist_win_rate_pct
                    && consecutive_losses >= self.config.blacklist_consecutive_losses;

                SignalPerformance {
                    fingerprint,
                    side,
                    sample_count,
                    win_rate,
                    avg_pnl,
                    problematic,
                    blacklist_candidate,
                }
            })
            .collect()
    }

    /// Losing streak at the end of the window, ordered by `close_time`.
    fn trailing_consecutive_losses(positions: &[&Position]) -> u32 {
        let mut ordered: Vec<&&Position> = positions.iter().collect();
        ordered.sort_by_key(|p| p.close_time);
        let mut streak = 0u32;
        for p in ordered.iter().rev() {
            if p.realized_pnl < Decimal::ZERO {
                streak += 1;
            } else {
                break;
            }
        }
        streak
    }

    fn blacklist_candidates(&self, performance: &[SignalPerformance]) -> Vec<SignalBlacklistEntry> {
        performance
            .iter()
            .filter(|p| p.blacklist_candidate)
            .map(|p| SignalBlacklistEntry {
                signal_type: p.fingerprint.clone(),
                position_side: p.side,
                is_active: true,
            })
            .collect()
    }

    /// One adjusted `AdaptiveParams` row per side, widened/narrowed from the
    /// aggregate win rate across every fingerprint on that side this window
    /// (spec §4.10 "stop-loss widening/narrowing, holding-time scaling, size
    /// multiplier").
    fn suggest_params(
        &self,
        performance: &[SignalPerformance],
    ) -> (AdaptiveParams, AdaptiveParams) {
        let base = AdaptiveParams {
            long_stop_loss_pct: dec!(2.0),
            long_take_profit_pct: dec!(4.0),
            short_stop_loss_pct: dec!(2.0),
            short_take_profit_pct: dec!(4.0),
            min_holding_minutes: 60,
            position_size_multiplier: Decimal::ONE,
        };
        let long = self.widen_for_side(&base, Side::Long, performance);
        let short = self.widen_for_side(&base, Side::Short, performance);
        (long, short)
    }

    fn widen_for_side(
        &self,
        base: &AdaptiveParams,
        side: Side,
        performance: &[SignalPerformance],
    ) -> AdaptiveParams {
        let side_rows: Vec<&SignalPerformance> = performance.iter().filter(|p| p.side == side).collect();
        if side_rows.is_empty() {
            return base.clone();
        }
        let total_samples: u32 = side_rows.iter().map(|p| p.sample_count).sum();
        let weighted_win_rate: Decimal = side_rows
            .iter()
            .map(|p| p.win_rate * Decimal::from(p.sample_count))
            .sum::<Decimal>()
            / Decimal::from(total_samples.max(1));

        let mut params = base.clone();
        if weighted_win_rate < self.config.problematic_win_rate_pct {
            match side {
                Side::Long => {
                    params.long_stop_loss_pct += self.config.stop_loss_widen_step;
                }
                Side::Short => {
                    params.short_stop_loss_pct += self.config.stop_loss_widen_step;
                }
            }
            let scale = self.config.holding_time_scale_step.to_f64().unwrap_or(1.0);
            params.min_holding_minutes = ((params.min_holding_minutes as f64) * scale) as i64;
            params.position_size_multiplier *= self.config.position_size_shrink_step;
        }
        params
    }

    /// Components that show up disproportionately on losing closes get
    /// their weight nudged down; components that show up disproportionately
    /// on winners get nudged up, one fixed step per run, never crossing
    /// zero.
    fn suggest_weight_adjustments(&self, closed: &[Position]) -> Vec<ScoringWeight> {
        let mut wins: HashMap<String, u32> = HashMap::new();
        let mut losses: HashMap<String, u32> = HashMap::new();
        for p in closed {
            let bucket = if p.realized_pnl >= Decimal::ZERO { &mut wins } else { &mut losses };
            for component in &p.signal_components {
                *bucket.entry(component.clone()).or_insert(0) += 1;
            }
        }

        let mut components: Vec<String> = wins.keys().chain(losses.keys()).cloned().collect();
        components.sort();
        components.dedup();

        components
            .into_iter()
            .filter_map(|component| {
                let w = *wins.get(&component).unwrap_or(&0) as i64;
                let l = *losses.get(&component).unwrap_or(&0) as i64;
                if w + l == 0 {
                    return None;
                }
                let step = self.config.weight_adjustment_step;
                let delta = if w > l {
                    step
                } else if l > w {
                    -step
                } else {
                    return None;
                };
                let base = Decimal::ONE;
                let adjusted = (base + delta).max(Decimal::ZERO);
                Some(ScoringWeight {
                    component,
                    weight_long: adjusted,
                    weight_short: adjusted,
                    is_active: true,
                })
            })
            .collect()
    }

    /// Three-level rating scheme from cumulative realized P&L and hit rate
    /// per symbol (spec §4.10 "Symbol ratings ... based on cumulative
    /// drawdown and hit rate").
    fn evaluate_ratings(&self, closed: &[Position]) -> Vec<SymbolRating> {
        let mut by_symbol: HashMap<String, Vec<&Position>> = HashMap::new();
        for p in closed {
            by_symbol.entry(p.symbol.clone()).or_default().push(p);
        }

        by_symbol
            .into_iter()
            .map(|(symbol, positions)| {
                let sample_count = positions.len() as u32;
                let wins = positions.iter().filter(|p| p.realized_pnl > Decimal::ZERO).count();
                let win_rate = Decimal::from(wins) / Decimal::from(sample_count.max(1)) * Decimal::from(100);
                let net_pnl: Decimal = positions.iter().map(|p| p.realized_pnl).sum();

                let (rating_level, margin_multiplier) = if win_rate >= dec!(55) && net_pnl >= Decimal::ZERO {
                    (RatingLevel::Whitelist, Decimal::ONE)
                } else if win_rate >= dec!(40) {
                    (RatingLevel::Level1, dec!(0.5))
                } else if win_rate >= dec!(25) {
                    (RatingLevel::Level2, dec!(0.25))
                } else {
                    (RatingLevel::Forbidden, Decimal::ZERO)
                };

                SymbolRating {
                    symbol,
                    rating_level,
                    margin_multiplier,
                }
            })
            .collect()
    }

    /// Fixed per-symbol take-profit percentage derived from recent 15m
    /// candle ranges, long and short computed separately from the average
    /// distance the close travels from the open in each direction (spec
    /// §4.10 "distinct tp% for long vs. short candles").
    async fn evaluate_volatility_profiles(
        &self,
        symbols: &[String],
    ) -> Result<Vec<VolatilityProfile>, EngineError> {
        let mut profiles = Vec::new();
        for symbol in symbols {
            let candles = match self
                .klines
                .recent(symbol, Timeframe::FifteenMin, self.config.volatility_candles)
                .await
            {
                Ok(c) if !c.is_empty() => c,
                Ok(_) => continue,
                Err(err) => {
                    warn!(symbol, %err, "skipping volatility profile, candles unavailable");
                    continue;
                }
            };

            let mut up_moves = Vec::new();
            let mut down_moves = Vec::new();
            for c in &candles {
                if c.open == Decimal::ZERO {
                    continue;
                }
                let pct = (c.close - c.open) / c.open * Decimal::from(100);
                if pct > Decimal::ZERO {
                    up_moves.push(pct);
                } else if pct < Decimal::ZERO {
                    down_moves.push(-pct);
                }
            }

            let avg = |values: &[Decimal]| -> Decimal {
                if values.is_empty() {
                    dec!(2.0)
                } else {
                    values.iter().sum::<Decimal>() / Decimal::from(values.len())
                }
            };

            profiles.push(VolatilityProfile {
                symbol: symbol.clone(),
                long_fixed_tp_pct: avg(&up_moves).max(dec!(0.5)),
                short_fixed_tp_pct: avg(&down_moves).max(dec!(0.5)),
            });
        }
        Ok(profiles)
    }

    async fn apply(&self, report: &OptimizationReport) -> Result<(), EngineError> {
        for perf in &report.signal_performance {
            let existing = self.quality.find(&perf.fingerprint, perf.side).await?;
            let threshold_adjustment = if perf.problematic { dec!(10) } else { Decimal::ZERO };
            let stats = SignalQualityStats {
                signal_fingerprint: perf.fingerprint.clone(),
                side: perf.side,
                sample_count: perf.sample_count,
                win_rate: perf.win_rate,
                avg_pnl: perf.avg_pnl,
                threshold_adjustment: existing
                    .map(|e| e.threshold_adjustment)
                    .unwrap_or(Decimal::ZERO)
                    .max(threshold_adjustment),
            };
            self.quality.upsert(stats).await?;
        }

        for entry in &report.blacklisted {
            warn!(fingerprint = %entry.signal_type, side = ?entry.position_side, "blacklisting signal");
            self.blacklist.upsert(entry.clone()).await?;
        }

        for params in report.adjusted_params.values() {
            self.params.upsert(params.clone()).await?;
        }

        for weight in &report.adjusted_weights {
            self.weights.upsert(weight.clone()).await?;
        }

        for rating in &report.ratings {
            self.ratings.upsert(rating.clone()).await?;
        }

        for profile in &report.volatility_profiles {
            self.volatility.upsert(profile.clone()).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    use crate::domain::market::Candle;
    use crate::domain::repositories::KlineRepository;
    use crate::domain::trading::PositionStatus;

    fn sample_position(fingerprint: &str, side: Side, pnl: Decimal, close_time: DateTime<Utc>) -> Position {
        Position {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            symbol: "BTC/USDT".into(),
            side,
            quantity: Decimal::ZERO,
            entry_price: dec!(50000),
            avg_entry_price: dec!(50000),
            leverage: 5,
            notional_value: dec!(50000),
            margin: Decimal::ZERO,
            open_time: close_time - Duration::hours(1),
            close_time: Some(close_time),
            stop_loss_price: dec!(49000),
            take_profit_price: dec!(52000),
            entry_signal_type: fingerprint.to_string(),
            entry_reason: "test".into(),
            entry_score: dec!(50),
            signal_components: vec![fingerprint.to_string()],
            max_hold_minutes: 120,
            timeout_at: close_time,
            status: PositionStatus::Closed,
            realized_pnl: pnl,
            notes: Vec::new(),
            updated_at: close_time,
        }
    }

    struct FixedPositions(Vec<Position>);
    #[async_trait]
    impl PositionRepository for FixedPositions {
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
            Ok(self.0.clone())
        }
        async fn open_and_debit(&self, _: Position, _: Decimal) -> Result<(), EngineError> {
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
            _: crate::domain::trading::Order,
            _: crate::domain::trading::Trade,
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

    struct EmptyKlines;
    #[async_trait]
    impl KlineRepository for EmptyKlines {
        async fn candles(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>, EngineError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingQuality(Mutex<Vec<SignalQualityStats>>);
    #[async_trait]
    impl SignalQualityRepository for RecordingQuality {
        async fn find(&self, _: &str, _: Side) -> Result<Option<SignalQualityStats>, EngineError> {
            Ok(None)
        }
        async fn upsert(&self, stats: SignalQualityStats) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(stats);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBlacklist(Mutex<Vec<SignalBlacklistEntry>>);
    #[async_trait]
    impl SignalBlacklistRepository for RecordingBlacklist {
        async fn active_entries(&self) -> Result<Vec<SignalBlacklistEntry>, EngineError> {
            Ok(Vec::new())
        }
        async fn upsert(&self, entry: SignalBlacklistEntry) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(entry);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingParams(Mutex<Vec<AdaptiveParams>>);
    #[async_trait]
    impl AdaptiveParamsRepository for RecordingParams {
        async fn find(&self) -> Result<AdaptiveParams, EngineError> {
            Ok(AdaptiveParams {
                long_stop_loss_pct: dec!(2.0),
                long_take_profit_pct: dec!(4.0),
                short_stop_loss_pct: dec!(2.0),
                short_take_profit_pct: dec!(4.0),
                min_holding_minutes: 60,
                position_size_multiplier: Decimal::ONE,
            })
        }
        async fn upsert(&self, params: AdaptiveParams) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(params);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWeights(Mutex<Vec<ScoringWeight>>);
    #[async_trait]
    impl ScoringWeightsRepository for RecordingWeights {
        async fn active_weights(&self) -> Result<Vec<ScoringWeight>, EngineError> {
            Ok(Vec::new())
        }
        async fn upsert(&self, weight: ScoringWeight) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(weight);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRatings(Mutex<Vec<SymbolRating>>);
    #[async_trait]
    impl SymbolRatingRepository for RecordingRatings {
        async fn find(&self, _: &str) -> Result<Option<SymbolRating>, EngineError> {
            Ok(None)
        }
        async fn whitelist(&self) -> Result<Vec<SymbolRating>, EngineError> {
            Ok(Vec::new())
        }
        async fn upsert(&self, rating: SymbolRating) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(rating);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingVolatility(Mutex<Vec<VolatilityProfile>>);
    #[async_trait]
    impl VolatilityProfileRepository for RecordingVolatility {
        async fn find(&self, _: &str) -> Result<Option<VolatilityProfile>, EngineError> {
            Ok(None)
        }
        async fn upsert(&self, profile: VolatilityProfile) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(profile);
            Ok(())
        }
    }

    fn build_optimizer(closed: Vec<Position>) -> AdaptiveOptimizer {
        AdaptiveOptimizer::new(
            Arc::new(FixedPositions(closed)),
            Arc::new(KlineAccessor::new(Arc::new(EmptyKlines))),
            Arc::new(RecordingQuality::default()),
            Arc::new(RecordingBlacklist::default()),
            Arc::new(RecordingParams::default()),
            Arc::new(RecordingWeights::default()),
            Arc::new(RecordingRatings::default()),
            Arc::new(RecordingVolatility::default()),
            AdaptiveOptimizerConfig::default(),
        )
    }

    #[tokio::test]
    async fn flags_problematic_signal_with_enough_losing_samples() {
        let now = Utc::now();
        let closed: Vec<Position> = (0..5)
            .map(|i| sample_position("trend_1h_bear", Side::Short, dec!(-10), now - Duration::hours(i)))
            .collect();
        let optimizer = build_optimizer(closed);
        let report = optimizer
            .run_daily(Uuid::new_v4(), &["BTC/USDT".to_string()], now)
            .await
            .unwrap();

        assert_eq!(report.signal_performance.len(), 1);
        let perf = &report.signal_performance[0];
        assert!(perf.problematic);
        assert_eq!(perf.win_rate, Decimal::ZERO);
    }

    #[tokio::test]
    async fn blacklists_signal_with_losing_streak_and_low_win_rate() {
        let now = Utc::now();
        let mut closed: Vec<Position> = Vec::new();
        for i in 0..4 {
            let pnl = if i == 0 { dec!(5) } else { dec!(-5) };
            closed.push(sample_position(
                "breakout_strong",
                Side::Long,
                pnl,
                now - Duration::hours(3 - i as i64),
            ));
        }
        let optimizer = build_optimizer(closed);
        let report = optimizer
            .run_daily(Uuid::new_v4(), &[], now)
            .await
            .unwrap();

        assert_eq!(report.blacklisted.len(), 1);
        assert_eq!(report.blacklisted[0].signal_type, "breakout_strong");
    }

    #[tokio::test]
    async fn healthy_signals_are_neither_problematic_nor_blacklisted() {
        let now = Utc::now();
        let closed: Vec<Position> = (0..5)
            .map(|i| sample_position("momentum_24h", Side::Long, dec!(10), now - Duration::hours(i)))
            .collect();
        let optimizer = build_optimizer(closed);
        let report = optimizer
            .run_daily(Uuid::new_v4(), &[], now)
            .await
            .unwrap();

        let perf = &report.signal_performance[0];
        assert!(!perf.problematic);
        assert!(!perf.blacklist_candidate);
        assert!(report.blacklisted.is_empty());
    }

    #[tokio::test]
    async fn auto_apply_false_computes_without_writing() {
        let now = Utc::now();
        let closed = vec![sample_position("momentum_24h", Side::Long, dec!(-5), now)];
        let mut optimizer = build_optimizer(closed);
        optimizer.config.auto_apply = false;
        let report = optimizer
            .run_daily(Uuid::new_v4(), &[], now)
            .await
            .unwrap();
        assert_eq!(report.signal_performance.len(), 1);
    }
}
