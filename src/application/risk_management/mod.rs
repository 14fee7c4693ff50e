//! Risk & Emergency Layer (spec §4.9): three independent breaker predicates
//! evaluated every main tick. The rest of this directory was the teacher's
//! equities-style risk control (PDT/session/order-throttling,
//! `circuit_breaker_service`, `commands`, `hard_stop_manager`,
//! `liquidation_service`, `order_monitor`, `order_reconciler`,
//! `order_retry_strategy`, `order_throttler`, `pipeline`,
//! `portfolio_valuation_service`, `position_manager`, `risk_manager`,
//! `session_manager`, `sizing_engine`, `state`, `trailing_stops`); it
//! depends on `domain::trading::{portfolio,types}`,
//! `application::monitoring`, and `domain::repositories::RiskStateRepository`,
//! none of which this crate carries, and has no spec counterpart.
pub mod emergency_layer;

pub use emergency_layer::{EmergencyLayer, EmergencyLayerConfig};
