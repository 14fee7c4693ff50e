//! The Signal Decision Brain's output shape (spec §4.6) and the fingerprint
//! convention shared by the quality manager, blacklist, and scoring weights.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::trading::Side;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakoutInfo {
    pub broken_level: Decimal,
}

/// One scoring component's contribution to one side. A component never
/// contributes to both sides at once (spec §4.6 "at most one side").
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentScore {
    pub name: &'static str,
    pub side: Side,
    pub weighted_score: f64,
}

/// Fingerprint convention: sorted component names, joined by `+`. Computed
/// fresh after the direction-contradiction filter strips opposite-signed
/// components, never before.
pub fn fingerprint(components: &[&str]) -> String {
    let mut sorted: Vec<&str> = components.to_vec();
    sorted.sort_unstable();
    sorted.join("+")
}

#[derive(Debug, Clone)]
pub struct SignalCandidate {
    pub symbol: String,
    pub side: Side,
    pub score: f64,
    pub current_price: Decimal,
    pub signal_components: Vec<String>,
    pub breakout_info: Option<BreakoutInfo>,
    /// Set by range-mode generators that compute their own exit prices from
    /// the band geometry rather than the adaptive-parameters percentages
    /// (spec §9 redesign note 2; `application::strategies::mean_reversion`).
    /// `None` for every trend-mode candidate the brain produces.
    pub fixed_stop_loss_price: Option<Decimal>,
    pub fixed_take_profit_price: Option<Decimal>,
    /// Overrides `default_position_size` when set; range-mode candidates
    /// typically size smaller than trend-mode ones.
    pub position_size_override: Option<Decimal>,
    /// Range-mode candidates never batch (fixed-band exits are incompatible
    /// with a volatility-scaled slice schedule).
    pub allow_batched_entry: bool,
    /// Overrides the score-bucketed default hold duration; range-mode
    /// candidates hold for a fixed horizon regardless of score.
    pub max_hold_minutes_override: Option<i64>,
}

impl SignalCandidate {
    pub fn fingerprint(&self) -> String {
        let refs: Vec<&str> = self.signal_components.iter().map(String::as_str).collect();
        fingerprint(&refs)
    }

    pub fn is_breakout(&self) -> bool {
        self.breakout_info.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sorted_and_joined() {
        assert_eq!(fingerprint(&["momentum_24h", "breakout_through_high"]),
            "breakout_through_high+momentum_24h");
    }

    #[test]
    fn empty_components_yields_empty_fingerprint() {
        assert_eq!(fingerprint(&[]), "");
    }
}
