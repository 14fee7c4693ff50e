use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Side;

/// `futures_orders.side`. Opening orders carry a plain `Side`; closing
/// orders carry the `CLOSE_*` variant so a single table can tell "opened
/// LONG" from "closed a LONG" without a separate direction column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Long,
    Short,
    CloseLong,
    CloseShort,
}

impl OrderKind {
    pub fn closing(side: Side) -> Self {
        match side {
            Side::Long => OrderKind::CloseLong,
            Side::Short => OrderKind::CloseShort,
        }
    }

    pub fn opening(side: Side) -> Self {
        match side {
            Side::Long => OrderKind::Long,
            Side::Short => OrderKind::Short,
        }
    }

    pub fn is_closing(self) -> bool {
        matches!(self, OrderKind::CloseLong | OrderKind::CloseShort)
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderKind::Long => "LONG",
            OrderKind::Short => "SHORT",
            OrderKind::CloseLong => "CLOSE_LONG",
            OrderKind::CloseShort => "CLOSE_SHORT",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Filled,
    Rejected,
}

/// Immutable record of one fill event, open or close (`futures_orders`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub position_id: Uuid,
    pub symbol: String,
    pub side: OrderKind,
    pub order_type: String,
    pub leverage: u32,
    pub price: Decimal,
    pub quantity: Decimal,
    pub executed_quantity: Decimal,
    pub total_value: Decimal,
    pub executed_value: Decimal,
    pub fee: Decimal,
    pub fee_rate: Decimal,
    pub status: OrderStatus,
    pub avg_fill_price: Decimal,
    pub fill_time: DateTime<Utc>,
    pub realized_pnl: Decimal,
    pub pnl_pct: Decimal,
    pub order_source: String,
    /// Human-readable reason; close orders carry why the close happened
    /// ("止损", "止盈", "超时", ...).
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_and_opening_kinds_round_trip() {
        assert_eq!(OrderKind::closing(Side::Long), OrderKind::CloseLong);
        assert_eq!(OrderKind::opening(Side::Short), OrderKind::Short);
        assert!(OrderKind::CloseShort.is_closing());
        assert!(!OrderKind::Long.is_closing());
    }

    #[test]
    fn display_matches_table_strings() {
        assert_eq!(OrderKind::CloseLong.to_string(), "CLOSE_LONG");
    }
}
