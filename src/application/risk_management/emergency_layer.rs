use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;
use uuid::Uuid;

use crate::application::market_data::KlineAccessor;
use crate::domain::errors::EngineError;
use crate::domain::market::Timeframe;
use crate::domain::ports::PriceFeed;
use crate::domain::regime::big4::{self, ReversalSide};
use crate::domain::repositories::{EmergencyBlocksSource, PositionRepository};
use crate::domain::risk::{EmergencyBlocks, EmergencyLayerState};
use crate::domain::trading::Side;

#[derive(Debug, Clone)]
pub struct EmergencyLayerConfig {
    pub aggregate_loss_threshold: Decimal,
    pub aggregate_loss_block: Duration,
    pub consecutive_stop_loss_window: usize,
    pub consecutive_stop_loss_limit: usize,
    pub consecutive_stop_loss_block: Duration,
    pub reversal_block: Duration,
    pub big4_symbols: [String; 4],
}

impl Default for EmergencyLayerConfig {
    fn default() -> Self {
        Self {
            aggregate_loss_threshold: dec!(600),
            aggregate_loss_block: Duration::hours(2),
            consecutive_stop_loss_window: 10,
            consecutive_stop_loss_limit: 5,
            consecutive_stop_loss_block: Duration::hours(2),
            reversal_block: Duration::hours(4),
            big4_symbols: [
                "BTC/USDT".to_string(),
                "ETH/USDT".to_string(),
                "BNB/USDT".to_string(),
                "SOL/USDT".to_string(),
            ],
        }
    }
}

/// Three independent predicates evaluated every main tick (spec §4.9):
/// aggregate floating loss, stop-loss clustering, and a synchronized Big4
/// reversal. Each arms a fixed-duration block that clears itself once wall
/// time passes `until` — nothing here decrements a counter.
pub struct EmergencyLayer {
    klines: Arc<KlineAccessor>,
    positions: Arc<dyn PositionRepository>,
    price_feed: Arc<dyn PriceFeed>,
    config: EmergencyLayerConfig,
    blocks: RwLock<EmergencyBlocks>,
    state: RwLock<EmergencyLayerState>,
}

impl EmergencyLayer {
    pub fn new(
        klines: Arc<KlineAccessor>,
        positions: Arc<dyn PositionRepository>,
        price_feed: Arc<dyn PriceFeed>,
        config: EmergencyLayerConfig,
    ) -> Self {
        Self {
            klines,
            positions,
            price_feed,
            config,
            blocks: RwLock::new(EmergencyBlocks::default()),
            state: RwLock::new(EmergencyLayerState::default()),
        }
    }

    /// Called by the Exit Optimizer after every close, so the consecutive
    /// stop-loss breaker has an up to date rolling window without the
    /// emergency layer re-reading the close-order history itself.
    pub fn record_close(&self, is_stop_loss: bool) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .record_close(is_stop_loss, self.config.consecutive_stop_loss_window);
    }

    fn arm(&self, now: DateTime<Utc>, pick: impl FnOnce(&mut EmergencyBlocks) -> &mut Option<DateTime<Utc>>, block: Duration, reason: &str) {
        let mut blocks = self.blocks.write().unwrap_or_else(|e| e.into_inner());
        *pick(&mut blocks) = Some(now + block);
        warn!(reason, until_secs = block.num_seconds(), "emergency block armed");
    }

    async fn check_aggregate_loss(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<(), EngineError> {
        let positions = self.positions.find_all_active(account_id).await?;
        let mut total = Decimal::ZERO;
        for position in &positions {
            let quote = self.price_feed.get_price(&position.symbol).await?;
            let unrealized = match position.side {
                Side::Long => (quote.price - position.avg_entry_price) * position.quantity,
                Side::Short => (position.avg_entry_price - quote.price) * position.quantity,
            };
            total += unrealized;
        }
        if total < -self.config.aggregate_loss_threshold {
            self.arm(
                now,
                |b| &mut b.aggregate_loss_until,
                self.config.aggregate_loss_block,
                "aggregate floating loss",
            );
        }
        Ok(())
    }

    fn check_consecutive_stop_loss(&self, now: DateTime<Utc>) {
        let count = self
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .consecutive_stop_loss_count(self.config.consecutive_stop_loss_window);
        if count >= self.config.consecutive_stop_loss_limit {
            self.arm(
                now,
                |b| &mut b.stop_loss_circuit_until,
                self.config.consecutive_stop_loss_block,
                "consecutive stop-loss cluster",
            );
        }
    }

    async fn check_synchronized_reversal(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let mut windows = Vec::with_capacity(self.config.big4_symbols.len());
        for symbol in &self.config.big4_symbols {
            windows.push(self.klines.recent(symbol, Timeframe::FifteenMin, 16).await?);
        }

        if big4::detect_synchronized_reversal(&windows, ReversalSide::Bottom, now).is_some() {
            self.arm(
                now,
                |b| &mut b.bottom_reversal_until,
                self.config.reversal_block,
                "synchronized bottom reversal",
            );
        }
        if big4::detect_synchronized_reversal(&windows, ReversalSide::Top, now).is_some() {
            self.arm(
                now,
                |b| &mut b.top_reversal_until,
                self.config.reversal_block,
                "synchronized top reversal",
            );
        }
        Ok(())
    }

    /// Runs all three predicates and returns the resulting snapshot. Errors
    /// from the reversal/loss checks are `TransientInfra`/`StaleData` and
    /// should be treated like any other scan-tick failure: abort, retry
    /// next tick.
    pub async fn run_tick(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<EmergencyBlocks, EngineError> {
        self.check_aggregate_loss(account_id, now).await?;
        self.check_consecutive_stop_loss(now);
        self.check_synchronized_reversal(now).await?;
        Ok(self.blocks.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

#[async_trait]
impl EmergencyBlocksSource for EmergencyLayer {
    async fn current_blocks(&self) -> EmergencyBlocks {
        self.blocks.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
