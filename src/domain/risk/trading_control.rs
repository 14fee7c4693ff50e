use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `trading_control`: boolean kill switch per (account, market_type). When
/// disabled, no new positions may be opened; existing positions continue to
/// be monitored and closed (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingControl {
    pub account_id: Uuid,
    pub trading_type: String,
    pub trading_enabled: bool,
}
