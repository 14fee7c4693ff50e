//! Exercises `ShutdownService` end to end against an in-memory exchange and
//! position store, grounded on `ExitOptimizer`'s own test fixtures.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use perpcore::application::execution::exit_optimizer::ExitOptimizerConfig;
use perpcore::application::execution::ExitOptimizer;
use perpcore::application::system::shutdown_service::{EmergencyShutdownConfig, ShutdownService};
use perpcore::domain::errors::EngineError;
use perpcore::domain::ports::{
    ExchangeClient, ExchangeFill, ExchangeOrderRequest, PriceFeed, PriceQuote, PriceSource,
};
use perpcore::domain::repositories::PositionRepository;
use perpcore::domain::trading::{Order, Position, PositionStatus, Side, Trade};

struct FixedExchange(Decimal);

#[async_trait]
impl ExchangeClient for FixedExchange {
    async fn place_order(&self, request: ExchangeOrderRequest) -> Result<ExchangeFill, EngineError> {
        Ok(ExchangeFill {
            avg_fill_price: self.0,
            executed_quantity: request.quantity,
            fee: dec!(0.05),
            fee_rate: dec!(0.0004),
            fill_time: Utc::now(),
        })
    }
}

struct FixedPriceFeed(Decimal);

#[async_trait]
impl PriceFeed for FixedPriceFeed {
    async fn get_price(&self, _symbol: &str) -> Result<PriceQuote, EngineError> {
        Ok(PriceQuote {
            price: self.0,
            source: PriceSource::Stream,
            as_of: Utc::now(),
        })
    }
}

struct InMemoryPositions {
    account_id: Uuid,
    open: Mutex<Vec<Position>>,
    closed: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl PositionRepository for InMemoryPositions {
    async fn find_active(&self, _: Uuid, _: &str, _: Side) -> Result<Option<Position>, EngineError> {
        Ok(None)
    }
    async fn find_by_id(&self, _: Uuid) -> Result<Option<Position>, EngineError> {
        Ok(None)
    }
    async fn find_all_active(&self, account_id: Uuid) -> Result<Vec<Position>, EngineError> {
        if account_id != self.account_id {
            return Ok(Vec::new());
        }
        Ok(self.open.lock().unwrap().clone())
    }
    async fn find_active_by_side(&self, _: Uuid, _: Side) -> Result<Vec<Position>, EngineError> {
        Ok(Vec::new())
    }
    async fn find_closed_since(&self, _: Uuid, _: DateTime<Utc>) -> Result<Vec<Position>, EngineError> {
        Ok(Vec::new())
    }
    async fn open_and_debit(&self, _: Position, _: Decimal) -> Result<(), EngineError> {
        Ok(())
    }
    async fn append_slice_fill(&self, _: Uuid, _: Decimal, _: Decimal) -> Result<(), EngineError> {
        Ok(())
    }
    async fn promote_to_open(&self, _: Uuid) -> Result<(), EngineError> {
        Ok(())
    }
    async fn apply_partial_close(&self, _: Uuid, _: Decimal, _: Decimal, _: Decimal) -> Result<(), EngineError> {
        Ok(())
    }
    async fn close_with_fill(
        &self,
        position_id: Uuid,
        _: Order,
        _: Trade,
        _: Decimal,
        _: Decimal,
        _: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.closed.lock().unwrap().push(position_id);
        self.open.lock().unwrap().retain(|p| p.id != position_id);
        Ok(())
    }
    async fn push_note(&self, _: Uuid, _: &str) -> Result<(), EngineError> {
        Ok(())
    }
}

fn open_position(account_id: Uuid, entry: Decimal) -> Position {
    let now = Utc::now();
    Position {
        id: Uuid::new_v4(),
        account_id,
        symbol: "BTC/USDT".into(),
        side: Side::Long,
        quantity: dec!(1.0),
        entry_price: entry,
        avg_entry_price: entry,
        leverage: 5,
        notional_value: entry,
        margin: dec!(400),
        open_time: now,
        close_time: None,
        stop_loss_price: entry - dec!(1000),
        take_profit_price: entry + dec!(1000),
        entry_signal_type: "momentum_24h".into(),
        entry_reason: "score 50".into(),
        entry_score: dec!(50),
        signal_components: vec!["momentum_24h".into()],
        max_hold_minutes: 120,
        timeout_at: now + ChronoDuration::minutes(120),
        status: PositionStatus::Open,
        realized_pnl: Decimal::ZERO,
        notes: Vec::new(),
        updated_at: now,
    }
}

#[tokio::test]
async fn flatten_on_exit_closes_every_open_position() {
    let account_id = Uuid::new_v4();
    let positions = Arc::new(InMemoryPositions {
        account_id,
        open: Mutex::new(vec![open_position(account_id, dec!(50000)), open_position(account_id, dec!(50000))]),
        closed: Mutex::new(Vec::new()),
    });
    let price_feed = Arc::new(FixedPriceFeed(dec!(50000)));
    let exit_optimizer = Arc::new(ExitOptimizer::new(
        Arc::new(FixedExchange(dec!(50000))),
        positions.clone(),
        ExitOptimizerConfig::default(),
    ));

    let service = ShutdownService::new(
        account_id,
        positions.clone(),
        price_feed,
        exit_optimizer,
        EmergencyShutdownConfig {
            flatten_on_exit: true,
            liquidation_timeout_ms: 5_000,
        },
    );

    service.shutdown().await;

    assert_eq!(positions.closed.lock().unwrap().len(), 2);
    assert!(positions.open.lock().unwrap().is_empty());
}

#[tokio::test]
async fn flatten_disabled_leaves_positions_open() {
    let account_id = Uuid::new_v4();
    let positions = Arc::new(InMemoryPositions {
        account_id,
        open: Mutex::new(vec![open_position(account_id, dec!(50000))]),
        closed: Mutex::new(Vec::new()),
    });
    let price_feed = Arc::new(FixedPriceFeed(dec!(50000)));
    let exit_optimizer = Arc::new(ExitOptimizer::new(
        Arc::new(FixedExchange(dec!(50000))),
        positions.clone(),
        ExitOptimizerConfig::default(),
    ));

    let service = ShutdownService::new(
        account_id,
        positions.clone(),
        price_feed,
        exit_optimizer,
        EmergencyShutdownConfig::default(),
    );

    service.shutdown().await;

    assert!(positions.closed.lock().unwrap().is_empty());
    assert_eq!(positions.open.lock().unwrap().len(), 1);
}
