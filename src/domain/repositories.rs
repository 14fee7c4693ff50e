//! State Store Access Layer ports (spec §4.11). All writes that touch money
//! are expressed as single composite methods so the "one transaction per
//! business operation" contract is enforced by the trait surface itself,
//! not left to callers to remember. Reads may be autocommit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::errors::EngineError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::regime::{Mode, ModeState};
use crate::domain::risk::{
    AdaptiveParams, EmergencyBlocks, ScoringWeight, SignalBlacklistEntry, SignalQualityStats,
    SymbolRating, TradingControl, VolatilityProfile,
};
use crate::domain::trading::{Account, Order, Position, Side, Trade};

#[async_trait]
pub trait PositionRepository: Send + Sync {
    /// The non-closed (building or open) position for (symbol, side), if
    /// any. Callers rely on this to enforce the one-active-row invariant.
    async fn find_active(
        &self,
        account_id: Uuid,
        symbol: &str,
        side: Side,
    ) -> Result<Option<Position>, EngineError>;

    async fn find_by_id(&self, position_id: Uuid) -> Result<Option<Position>, EngineError>;

    async fn find_all_active(&self, account_id: Uuid) -> Result<Vec<Position>, EngineError>;

    async fn find_active_by_side(
        &self,
        account_id: Uuid,
        side: Side,
    ) -> Result<Vec<Position>, EngineError>;

    /// Closed positions with `close_time >= since`, read by the adaptive
    /// optimizer to compute per-(fingerprint, side) realized performance
    /// (spec §4.10).
    async fn find_closed_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Position>, EngineError>;

    /// Inserts the position and debits `margin_to_freeze` from the account
    /// in one transaction (spec §4.7 immediate/batched entry).
    async fn open_and_debit(
        &self,
        position: Position,
        margin_to_freeze: Decimal,
    ) -> Result<(), EngineError>;

    /// Appends a batched-entry fill slice, adjusting quantity/margin; does
    /// not change status. Promotion to `open` is a separate call so the
    /// "first slice fills → open" rule (spec §4.7b) is explicit at the
    /// call site.
    async fn append_slice_fill(
        &self,
        position_id: Uuid,
        quantity_delta: Decimal,
        margin_delta: Decimal,
    ) -> Result<(), EngineError>;

    async fn promote_to_open(&self, position_id: Uuid) -> Result<(), EngineError>;

    /// Applies a partial close (quantity/margin reduction, realized P&L
    /// accrual) and returns the released margin to `available`, all inside
    /// one transaction with the order+trade insert the caller performs.
    async fn apply_partial_close(
        &self,
        position_id: Uuid,
        close_fraction: Decimal,
        realized_pnl_slice: Decimal,
        released_margin: Decimal,
    ) -> Result<(), EngineError>;

    /// Closes the position, inserts the order and trade rows, credits
    /// realized P&L and margin, and bumps the account's win/loss counters —
    /// one transaction (spec §4.8). Returns `Conflict` if the position was
    /// already closed by a racing writer.
    async fn close_with_fill(
        &self,
        position_id: Uuid,
        order: Order,
        trade: Trade,
        released_margin: Decimal,
        final_realized_pnl_slice: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<(), EngineError>;

    async fn push_note(&self, position_id: Uuid, note: &str) -> Result<(), EngineError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_recent(&self, account_id: Uuid, limit: usize) -> Result<Vec<Order>, EngineError>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn find_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Trade>, EngineError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find(&self, account_id: Uuid) -> Result<Account, EngineError>;
}

#[async_trait]
pub trait KlineRepository: Send + Sync {
    /// Ordered, oldest-first candle sequence. Insufficient history returns
    /// an empty `Vec`, never an error (spec §4.2).
    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError>;
}

#[async_trait]
pub trait SymbolRatingRepository: Send + Sync {
    async fn find(&self, symbol: &str) -> Result<Option<SymbolRating>, EngineError>;
    async fn whitelist(&self) -> Result<Vec<SymbolRating>, EngineError>;
    async fn upsert(&self, rating: SymbolRating) -> Result<(), EngineError>;
}

#[async_trait]
pub trait SignalBlacklistRepository: Send + Sync {
    async fn active_entries(&self) -> Result<Vec<SignalBlacklistEntry>, EngineError>;
    async fn upsert(&self, entry: SignalBlacklistEntry) -> Result<(), EngineError>;
}

#[async_trait]
pub trait SignalQualityRepository: Send + Sync {
    async fn find(
        &self,
        fingerprint: &str,
        side: Side,
    ) -> Result<Option<SignalQualityStats>, EngineError>;
    async fn upsert(&self, stats: SignalQualityStats) -> Result<(), EngineError>;
}

#[async_trait]
pub trait ScoringWeightsRepository: Send + Sync {
    async fn active_weights(&self) -> Result<Vec<ScoringWeight>, EngineError>;
    async fn upsert(&self, weight: ScoringWeight) -> Result<(), EngineError>;
}

#[async_trait]
pub trait AdaptiveParamsRepository: Send + Sync {
    async fn find(&self) -> Result<AdaptiveParams, EngineError>;
    async fn upsert(&self, params: AdaptiveParams) -> Result<(), EngineError>;
}

#[async_trait]
pub trait VolatilityProfileRepository: Send + Sync {
    async fn find(&self, symbol: &str) -> Result<Option<VolatilityProfile>, EngineError>;
    async fn upsert(&self, profile: VolatilityProfile) -> Result<(), EngineError>;
}

#[async_trait]
pub trait ModeStateRepository: Send + Sync {
    async fn find(&self, account_id: Uuid, trading_type: &str) -> Result<ModeState, EngineError>;

    /// Persists a mode switch; implementations must check
    /// `ModeState::can_switch` was satisfied by the caller and treat a
    /// concurrent switch as `Conflict` (spec testable property 8).
    async fn record_switch(
        &self,
        account_id: Uuid,
        trading_type: &str,
        new_mode: Mode,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError>;

    /// Persists the confirmation-window counter on a scan that didn't
    /// switch modes (agreement resets it to 0, disagreement increments it).
    /// Without this, `ModeState::can_switch`'s confirmation-window check
    /// never accumulates across scans (spec §4.5).
    async fn record_observation(
        &self,
        account_id: Uuid,
        trading_type: &str,
        confirming_observations: u32,
    ) -> Result<(), EngineError>;
}

#[async_trait]
pub trait TradingControlRepository: Send + Sync {
    async fn find(
        &self,
        account_id: Uuid,
        trading_type: &str,
    ) -> Result<TradingControl, EngineError>;
}

/// Read access to the in-memory emergency block snapshot. Implemented by
/// `application::risk_management::emergency_layer`, not by a DB-backed
/// adapter — blocks are recomputed every tick, not persisted (spec §4.9).
#[async_trait]
pub trait EmergencyBlocksSource: Send + Sync {
    async fn current_blocks(&self) -> EmergencyBlocks;
}
