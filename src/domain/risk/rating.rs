use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `trading_symbol_rating.rating_level`. 0 is the whitelist; 3 is forbidden
/// and carries margin multiplier 0 (GLOSSARY "Margin multiplier").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatingLevel {
    Whitelist = 0,
    Level1 = 1,
    Level2 = 2,
    Forbidden = 3,
}

impl RatingLevel {
    pub fn is_tradeable(self) -> bool {
        self != RatingLevel::Forbidden
    }

    pub fn from_i16(v: i16) -> Self {
        match v {
            0 => RatingLevel::Whitelist,
            1 => RatingLevel::Level1,
            2 => RatingLevel::Level2,
            _ => RatingLevel::Forbidden,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRating {
    pub symbol: String,
    pub rating_level: RatingLevel,
    pub margin_multiplier: Decimal,
}

impl SymbolRating {
    pub fn whitelist(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            rating_level: RatingLevel::Whitelist,
            margin_multiplier: Decimal::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_not_tradeable() {
        assert!(!RatingLevel::Forbidden.is_tradeable());
        assert!(RatingLevel::Whitelist.is_tradeable());
    }

    #[test]
    fn from_i16_clamps_unknown_to_forbidden() {
        assert_eq!(RatingLevel::from_i16(9), RatingLevel::Forbidden);
        assert_eq!(RatingLevel::from_i16(0), RatingLevel::Whitelist);
    }
}
