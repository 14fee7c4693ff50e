use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::application::market_data::KlineAccessor;
use crate::domain::errors::EngineError;
use crate::domain::market::{indicators, Timeframe};
use crate::domain::regime::{Big4Signal, Mode, RangeClassification};
use crate::domain::repositories::{ModeStateRepository, PositionRepository};

/// Confirmation window (consecutive disagreeing scans before a switch is
/// allowed) and per-switch cooldown (spec §4.5).
pub struct ModeSwitcherConfig {
    pub confirmation_window: u32,
    pub cooldown: Duration,
}

impl Default for ModeSwitcherConfig {
    fn default() -> Self {
        Self {
            confirmation_window: 3,
            cooldown: Duration::minutes(30),
        }
    }
}

/// Classifies range-vs-trend on a symbol's recent candles and persists a
/// mode switch once the confirmation window and cooldown both clear, and no
/// position on the account is still `building` (spec §4.5, testable
/// property 8).
pub struct ModeSwitcher {
    mode_states: Arc<dyn ModeStateRepository>,
    positions: Arc<dyn PositionRepository>,
    klines: Arc<KlineAccessor>,
    config: ModeSwitcherConfig,
}

impl ModeSwitcher {
    pub fn new(
        mode_states: Arc<dyn ModeStateRepository>,
        positions: Arc<dyn PositionRepository>,
        klines: Arc<KlineAccessor>,
        config: ModeSwitcherConfig,
    ) -> Self {
        Self {
            mode_states,
            positions,
            klines,
            config,
        }
    }

    pub async fn classify(&self, symbol: &str) -> Result<RangeClassification, EngineError> {
        let candles = self
            .klines
            .require(symbol, Timeframe::FifteenMin, 32, 20)
            .await?;

        let bollinger = indicators::bollinger(&candles, 20, 2.0);
        let bollinger_width_pct = bollinger
            .and_then(|b| {
                if b.middle.abs() > f64::EPSILON {
                    Some((b.upper - b.lower) / b.middle * 100.0)
                } else {
                    None
                }
            })
            .unwrap_or(0.0);

        let window = &candles[candles.len().saturating_sub(16)..];
        let high = window.iter().map(|c| c.high).max().unwrap_or_default();
        let low = window.iter().map(|c| c.low).min().unwrap_or_default();
        let high_low_spread_pct = if !low.is_zero() {
            ((high - low) / low * rust_decimal::Decimal::from(100))
                .to_string()
                .parse()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let bullish = window.iter().filter(|c| c.is_bullish()).count() as f64;
        let bearish = window.iter().filter(|c| c.is_bearish()).count() as f64;
        let directional_persistence = (bullish - bearish) / window.len().max(1) as f64;

        Ok(RangeClassification::classify(
            bollinger_width_pct,
            high_low_spread_pct,
            directional_persistence,
        ))
    }

    /// Records one scan's classification and, if the state machine allows
    /// it, persists the switch. `manual_override` bypasses the confirmation
    /// window but never the cooldown.
    pub async fn observe(
        &self,
        account_id: Uuid,
        trading_type: &str,
        classification: RangeClassification,
        big4_signal: Big4Signal,
        manual_override: bool,
    ) -> Result<Mode, EngineError> {
        let mut state = self.mode_states.find(account_id, trading_type).await?;
        let now = Utc::now();

        if classification.classified_mode == state.current_mode {
            state.record_observation_agrees();
            self.mode_states
                .record_observation(account_id, trading_type, state.confirming_observations)
                .await?;
            return Ok(state.current_mode);
        }

        let has_building = self
            .positions
            .find_all_active(account_id)
            .await?
            .iter()
            .any(|p| matches!(p.status, crate::domain::trading::PositionStatus::Building));

        if !state.can_switch(
            classification.classified_mode,
            now,
            self.config.cooldown,
            self.config.confirmation_window,
            has_building,
            manual_override,
        ) {
            state.record_observation_disagrees();
            self.mode_states
                .record_observation(account_id, trading_type, state.confirming_observations)
                .await?;
            return Ok(state.current_mode);
        }

        let new_mode = classification.classified_mode;
        self.mode_states
            .record_switch(
                account_id,
                trading_type,
                new_mode,
                format!(
                    "range classifier: bollinger_width={:.2}% spread={:.2}% persistence={:.2}",
                    classification.bollinger_width_pct,
                    classification.high_low_spread_pct,
                    classification.directional_persistence
                ),
                now,
            )
            .await?;

        Ok(new_mode)
    }
}
