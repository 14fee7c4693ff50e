use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::trading::Side;

/// `signal_scoring_weights`: hot-reloadable per-component weight, one row
/// per scoring component (spec §3, §4.6). Each component contributes to at
/// most one side, so the unused half of the pair is simply never read for a
/// given component's contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeight {
    pub component: String,
    pub weight_long: Decimal,
    pub weight_short: Decimal,
    pub is_active: bool,
}

/// An immutable snapshot of all active weights, read once per scan (spec §5
/// "the Brain reads a consistent snapshot per scan").
#[derive(Debug, Clone, Default)]
pub struct ScoringWeights {
    weights: Vec<ScoringWeight>,
}

impl ScoringWeights {
    pub fn new(weights: Vec<ScoringWeight>) -> Self {
        Self {
            weights: weights.into_iter().filter(|w| w.is_active).collect(),
        }
    }

    pub fn weight_for(&self, component: &str, side: Side) -> Decimal {
        self.weights
            .iter()
            .find(|w| w.component == component)
            .map(|w| match side {
                Side::Long => w.weight_long,
                Side::Short => w.weight_short,
            })
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn inactive_weights_are_excluded_from_snapshot() {
        let weights = ScoringWeights::new(vec![
            ScoringWeight {
                component: "momentum_24h".into(),
                weight_long: dec!(10),
                weight_short: dec!(10),
                is_active: true,
            },
            ScoringWeight {
                component: "disabled_component".into(),
                weight_long: dec!(99),
                weight_short: dec!(99),
                is_active: false,
            },
        ]);
        assert_eq!(weights.weight_for("momentum_24h", Side::Long), dec!(10));
        assert_eq!(weights.weight_for("disabled_component", Side::Long), Decimal::ZERO);
    }

    #[test]
    fn unknown_component_defaults_to_zero() {
        let weights = ScoringWeights::new(vec![]);
        assert_eq!(weights.weight_for("nonexistent", Side::Short), Decimal::ZERO);
    }
}
