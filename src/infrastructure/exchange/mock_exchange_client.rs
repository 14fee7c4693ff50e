//! In-memory `ExchangeClient` used by integration tests and local runs
//! without live exchange credentials. Fills every order immediately at a
//! caller-supplied price, grounded on the teacher's `mock.rs` fixed-fill
//! broker stub.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::errors::EngineError;
use crate::domain::ports::{ExchangeClient, ExchangeFill, ExchangeOrderRequest};

/// Fixed taker fee rate, matching Binance USDT-M futures' default tier.
const DEFAULT_FEE_RATE: Decimal = dec!(0.0004);

pub struct MockExchangeClient {
    fill_price: Decimal,
    fee_rate: Decimal,
    fills: AtomicI64,
}

impl MockExchangeClient {
    pub fn new(fill_price: Decimal) -> Self {
        Self {
            fill_price,
            fee_rate: DEFAULT_FEE_RATE,
            fills: AtomicI64::new(0),
        }
    }

    pub fn fill_count(&self) -> i64 {
        self.fills.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ExchangeClient for MockExchangeClient {
    async fn place_order(&self, request: ExchangeOrderRequest) -> Result<ExchangeFill, EngineError> {
        self.fills.fetch_add(1, Ordering::Relaxed);
        let notional = self.fill_price * request.quantity;
        Ok(ExchangeFill {
            avg_fill_price: self.fill_price,
            executed_quantity: request.quantity,
            fee: notional * self.fee_rate,
            fee_rate: self.fee_rate,
            fill_time: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::OrderKind;

    #[tokio::test]
    async fn fills_at_configured_price() {
        let client = MockExchangeClient::new(dec!(50000));
        let fill = client
            .place_order(ExchangeOrderRequest {
                symbol: "BTC/USDT".to_string(),
                side: OrderKind::Long,
                quantity: dec!(0.01),
                leverage: 10,
            })
            .await
            .unwrap();

        assert_eq!(fill.avg_fill_price, dec!(50000));
        assert_eq!(fill.executed_quantity, dec!(0.01));
        assert_eq!(client.fill_count(), 1);
    }
}
