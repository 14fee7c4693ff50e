use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Side;

/// Mirror of a fill for analytics/out-of-scope surfaces (`futures_trades`).
/// One row per order in the core path (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: Uuid,
    pub position_id: Uuid,
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub notional_value: Decimal,
    pub leverage: u32,
    pub margin: Decimal,
    pub fee: Decimal,
    pub realized_pnl: Decimal,
    pub pnl_pct: Decimal,
    pub roi: Decimal,
    pub entry_price: Decimal,
    pub close_price: Decimal,
    pub order_id: Uuid,
    pub trade_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
