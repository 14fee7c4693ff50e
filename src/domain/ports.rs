//! Narrow external-collaborator boundaries (spec §1 "Out of scope", §6 wire
//! interface). The core depends on these traits, never on a concrete
//! streaming or exchange implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::errors::EngineError;
use crate::domain::trading::OrderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Stream,
    Kline,
    Stale,
}

#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub price: Decimal,
    pub source: PriceSource,
    pub as_of: DateTime<Utc>,
}

/// Per-symbol latest mid price with staleness (spec §4.1). Implementations
/// own the streaming ingestion; the core only calls `get_price`.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, EngineError>;
}

#[derive(Debug, Clone)]
pub struct ExchangeOrderRequest {
    pub symbol: String,
    pub side: OrderKind,
    pub quantity: Decimal,
    pub leverage: u32,
}

#[derive(Debug, Clone)]
pub struct ExchangeFill {
    pub avg_fill_price: Decimal,
    pub executed_quantity: Decimal,
    pub fee: Decimal,
    pub fee_rate: Decimal,
    pub fill_time: DateTime<Utc>,
}

/// USDT-margined futures execution boundary. HMAC-signed REST calls live
/// behind this in `infrastructure::exchange`.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn place_order(&self, request: ExchangeOrderRequest) -> Result<ExchangeFill, EngineError>;
}
