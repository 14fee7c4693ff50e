use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Big4Signal;

/// Regime classification affecting which strategies may produce candidates
/// and the maximum hold duration (GLOSSARY "Mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Trend,
    Range,
}

/// `market_mode_state`: one row per (account, market_type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeState {
    pub account_id: Uuid,
    pub trading_type: String,
    pub current_mode: Mode,
    pub switched_at: DateTime<Utc>,
    /// How many consecutive scans have confirmed a *different* classification
    /// than `current_mode`; reset to 0 on agreement or on switch.
    pub confirming_observations: u32,
    pub last_switch_reason: Option<String>,
    pub last_switch_signal: Option<Big4Signal>,
}

/// Output of the range-vs-trend classifier (spec §4.5): Bollinger width,
/// recent high-low spread, and directional persistence on 15m/1h.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeClassification {
    pub classified_mode: Mode,
    pub bollinger_width_pct: f64,
    pub high_low_spread_pct: f64,
    pub directional_persistence: f64,
}

impl RangeClassification {
    /// Combines the three inputs into trend-vs-range. Narrow bands, a tight
    /// high-low spread, and low directional persistence together say
    /// "range"; any one strongly trending signal says "trend".
    pub fn classify(
        bollinger_width_pct: f64,
        high_low_spread_pct: f64,
        directional_persistence: f64,
    ) -> Self {
        let is_range = bollinger_width_pct < 3.0
            && high_low_spread_pct < 4.0
            && directional_persistence.abs() < 0.3;
        Self {
            classified_mode: if is_range { Mode::Range } else { Mode::Trend },
            bollinger_width_pct,
            high_low_spread_pct,
            directional_persistence,
        }
    }
}

impl ModeState {
    /// Whether a switch to `new_mode` may be recorded right now, per spec
    /// §4.5 / testable property 8: persisted classification across the
    /// confirmation window, elapsed per-switch cooldown, and no in-flight
    /// `building` positions.
    pub fn can_switch(
        &self,
        new_mode: Mode,
        now: DateTime<Utc>,
        cooldown: chrono::Duration,
        confirmation_window: u32,
        has_building_positions: bool,
        manual_override: bool,
    ) -> bool {
        if new_mode == self.current_mode {
            return false;
        }
        if has_building_positions {
            return false;
        }
        if !manual_override && now - self.switched_at < cooldown {
            return false;
        }
        manual_override || self.confirming_observations >= confirmation_window
    }

    pub fn record_observation_agrees(&mut self) {
        self.confirming_observations = 0;
    }

    pub fn record_observation_disagrees(&mut self) {
        self.confirming_observations += 1;
    }

    pub fn switch(
        &mut self,
        new_mode: Mode,
        now: DateTime<Utc>,
        reason: String,
        signal: Big4Signal,
    ) {
        self.current_mode = new_mode;
        self.switched_at = now;
        self.confirming_observations = 0;
        self.last_switch_reason = Some(reason);
        self.last_switch_signal = Some(signal);
    }
}

/// Per-symbol position-size multiplier implied by a mode, used by the entry
/// executor's `regime_multiplier` (spec §4.7): agreement between Big4
/// direction and the candidate side earns a bonus.
pub fn regime_multiplier(big4_signal: Big4Signal, candidate_is_long: bool) -> Decimal {
    use rust_decimal_macros::dec;
    let agrees = matches!(
        (big4_signal, candidate_is_long),
        (Big4Signal::Bullish, true) | (Big4Signal::Bearish, false)
    );
    if agrees { dec!(1.2) } else { dec!(1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(mode: Mode, switched_at: DateTime<Utc>) -> ModeState {
        ModeState {
            account_id: Uuid::new_v4(),
            trading_type: "futures".into(),
            current_mode: mode,
            switched_at,
            confirming_observations: 0,
            last_switch_reason: None,
            last_switch_signal: None,
        }
    }

    #[test]
    fn switch_blocked_by_building_positions() {
        let s = state(Mode::Trend, Utc::now() - chrono::Duration::hours(1));
        assert!(!s.can_switch(
            Mode::Range,
            Utc::now(),
            chrono::Duration::minutes(30),
            3,
            true,
            false,
        ));
    }

    #[test]
    fn switch_blocked_by_cooldown() {
        let s = state(Mode::Trend, Utc::now());
        assert!(!s.can_switch(
            Mode::Range,
            Utc::now(),
            chrono::Duration::minutes(30),
            3,
            false,
            false,
        ));
    }

    #[test]
    fn manual_override_bypasses_confirmation_not_cooldown() {
        let mut s = state(Mode::Trend, Utc::now() - chrono::Duration::hours(1));
        s.confirming_observations = 0;
        assert!(s.can_switch(
            Mode::Range,
            Utc::now(),
            chrono::Duration::minutes(30),
            3,
            false,
            true,
        ));
    }

    #[test]
    fn regime_multiplier_bonus_on_agreement() {
        assert_eq!(regime_multiplier(Big4Signal::Bullish, true), Decimal::new(12, 1));
        assert_eq!(regime_multiplier(Big4Signal::Bearish, true), Decimal::new(10, 1));
    }
}
