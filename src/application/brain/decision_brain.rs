use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::application::brain::components::{self, CandleWindows};
use crate::application::brain::filters;
use crate::application::market_data::KlineAccessor;
use crate::domain::errors::EngineError;
use crate::domain::market::Timeframe;
use crate::domain::risk::{EmergencyBlocks, ScoringWeights, SignalBlacklistEntry, SignalQualityStats};
use crate::domain::signal::{BreakoutInfo, SignalCandidate};
use crate::domain::trading::Side;

/// Everything the brain needs that's read once per scan as a consistent
/// snapshot (spec §5 "the Brain reads a consistent snapshot per scan"), so
/// a hot-reload racing a scan can't mix old and new weights/blacklist.
pub struct ScanContext {
    pub weights: ScoringWeights,
    pub blacklist: Vec<SignalBlacklistEntry>,
    pub quality: HashMap<(String, Side), SignalQualityStats>,
    pub emergency_blocks: EmergencyBlocks,
    pub recently_closed: HashMap<(String, Side), DateTime<Utc>>,
    pub anti_fomo_enabled: bool,
    pub now: DateTime<Utc>,
}

/// One scoring component's contribution to a symbol/side's score, as
/// returned by `DecisionBrain::explain`.
#[derive(Debug, Clone)]
pub struct ComponentContribution {
    pub name: &'static str,
    pub side: Side,
    pub raw_points: Decimal,
    pub weight: Decimal,
    pub contribution: Decimal,
}

pub struct DecisionBrain {
    klines: Arc<KlineAccessor>,
}

impl DecisionBrain {
    pub fn new(klines: Arc<KlineAccessor>) -> Self {
        Self { klines }
    }

    pub async fn evaluate_symbol(
        &self,
        symbol: &str,
        ctx: &ScanContext,
    ) -> Result<Option<SignalCandidate>, EngineError> {
        let d1 = self.klines.require(symbol, Timeframe::OneDay, 30, 1).await?;
        let h1 = self.klines.require(symbol, Timeframe::OneHour, 72, 48).await?;
        let m15 = self.klines.require(symbol, Timeframe::FifteenMin, 48, 21).await?;
        let current_price = m15.last().map(|c| c.close).unwrap_or_default();

        let windows = CandleWindows { d1: &d1, h1: &h1, m15: &m15 };

        if let Some((side, breakout)) = components::strong_breakout(&windows) {
            return self
                .finish_candidate(
                    symbol,
                    side,
                    Decimal::from(50),
                    current_price,
                    vec!["breakout_strong".to_string()],
                    Some(breakout),
                    &windows,
                    ctx,
                )
                .await;
        }

        let raw: Vec<(&'static str, Side, f64)> = [
            components::position_in_72h_range(&windows),
            components::momentum_24h(&windows),
            components::trend_1h(&windows),
            components::volatility_24h(&windows),
            components::consecutive_10h_bias(&windows),
            components::volume_weighted_power(&windows),
            components::breakout_through_level(&windows),
        ]
        .into_iter()
        .flatten()
        .collect();

        if raw.is_empty() {
            return Ok(None);
        }

        let mut long_score = Decimal::ZERO;
        let mut short_score = Decimal::ZERO;
        for (name, side, points) in &raw {
            let weight = ctx.weights.weight_for(name, *side);
            let contribution = Decimal::try_from(*points).unwrap_or_default() * weight;
            match side {
                Side::Long => long_score += contribution,
                Side::Short => short_score += contribution,
            }
        }

        let (side, score) = if long_score >= short_score {
            (Side::Long, long_score)
        } else {
            (Side::Short, short_score)
        };
        if score <= Decimal::ZERO {
            return Ok(None);
        }

        let raw_names: Vec<&str> = raw.iter().map(|(name, _, _)| *name).collect();
        let component_pairs: Vec<(&str, Side)> = raw.iter().map(|(n, s, _)| (*n, *s)).collect();

        let fingerprint = match filters::direction_contradiction_filter(&component_pairs, side) {
            Ok(fp) => fp,
            Err(_) => return Ok(None),
        };

        if filters::timeframe_consistency_filter(symbol, side, &raw_names).is_err() {
            return Ok(None);
        }

        if side == Side::Short {
            let (pos_pct, volume_declining, upper_shadow_freq) =
                components::position_high_evidence(&windows);
            if filters::position_high_validation(symbol, side, pos_pct, volume_declining, upper_shadow_freq)
                .is_err()
            {
                return Ok(None);
            }
        }

        let components_out: Vec<String> = fingerprint.split('+').map(str::to_string).collect();

        match self
            .finish_candidate(symbol, side, score, current_price, components_out, None, &windows, ctx)
            .await
        {
            Ok(candidate) => Ok(candidate),
            Err(e) if e.is_retryable() => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Per-symbol introspection: recomputes every raw scoring component for
    /// `side` and multiplies by `weights`, without running the entry
    /// filters. Used for the audit trail, not the hot scan path — a symbol
    /// that would be filtered out of `evaluate_symbol` can still be
    /// `explain`ed.
    pub async fn explain(
        &self,
        symbol: &str,
        side: Side,
        weights: &ScoringWeights,
    ) -> Result<Vec<ComponentContribution>, EngineError> {
        let d1 = self.klines.require(symbol, Timeframe::OneDay, 30, 1).await?;
        let h1 = self.klines.require(symbol, Timeframe::OneHour, 72, 48).await?;
        let m15 = self.klines.require(symbol, Timeframe::FifteenMin, 48, 21).await?;
        let windows = CandleWindows { d1: &d1, h1: &h1, m15: &m15 };

        let raw: Vec<(&'static str, Side, f64)> = [
            components::position_in_72h_range(&windows),
            components::momentum_24h(&windows),
            components::trend_1h(&windows),
            components::volatility_24h(&windows),
            components::consecutive_10h_bias(&windows),
            components::volume_weighted_power(&windows),
            components::breakout_through_level(&windows),
        ]
        .into_iter()
        .flatten()
        .filter(|(_, s, _)| *s == side)
        .collect();

        Ok(raw
            .into_iter()
            .map(|(name, side, points)| {
                let weight = weights.weight_for(name, side);
                let raw_points = Decimal::try_from(points).unwrap_or_default();
                ComponentContribution {
                    name,
                    side,
                    raw_points,
                    weight,
                    contribution: raw_points * weight,
                }
            })
            .collect())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_candidate(
        &self,
        symbol: &str,
        side: Side,
        score: Decimal,
        current_price: Decimal,
        signal_components: Vec<String>,
        breakout_info: Option<BreakoutInfo>,
        windows: &CandleWindows<'_>,
        ctx: &ScanContext,
    ) -> Result<Option<SignalCandidate>, EngineError> {
        let fingerprint = crate::domain::signal::fingerprint(
            &signal_components.iter().map(String::as_str).collect::<Vec<_>>(),
        );
        let quality = ctx.quality.get(&(fingerprint.clone(), side));

        filters::threshold_gate(score, &fingerprint, side, quality)?;
        filters::blacklist_filter(&fingerprint, side, &ctx.blacklist)?;
        filters::anti_fomo_filter(symbol, side, components::position_in_24h_range(windows), ctx.anti_fomo_enabled)?;
        filters::cooldown_filter(
            symbol,
            side,
            ctx.recently_closed.get(&(symbol.to_string(), side)).copied(),
            ctx.now,
        )?;
        filters::emergency_blocks_filter(side, &ctx.emergency_blocks, ctx.now)?;

        Ok(Some(SignalCandidate {
            symbol: symbol.to_string(),
            side,
            score: score.to_string().parse().unwrap_or(0.0),
            current_price,
            signal_components,
            breakout_info,
            fixed_stop_loss_price: None,
            fixed_take_profit_price: None,
            position_size_override: None,
            allow_batched_entry: true,
            max_hold_minutes_override: None,
        }))
    }
}
