use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::{EngineError, Invariant};
use crate::domain::ports::{ExchangeClient, ExchangeOrderRequest};
use crate::domain::repositories::PositionRepository;
use crate::domain::signal::SignalCandidate;
use crate::domain::trading::{Order, OrderKind, OrderStatus, Position, Side, Trade};

/// One rung of the partial take-profit ladder (spec §4.8 step 3):
/// at `profit_pct` unrealized gain, close `close_fraction` of the position.
#[derive(Debug, Clone, Copy)]
pub struct PartialTpRung {
    pub profit_pct: Decimal,
    pub close_fraction: Decimal,
}

#[derive(Debug, Clone)]
pub struct ExitOptimizerConfig {
    pub partial_tp_ladder: Vec<PartialTpRung>,
    /// Below this residual margin, a partial close is upgraded to full
    /// (spec §4.8 step 3, Scenario D).
    pub margin_floor: Decimal,
    pub trailing_activate_profit_pct: Decimal,
    pub trailing_distance_pct: Decimal,
    /// Minimum opposite-side candidate score to count as a qualifying
    /// reversal (spec §4.8 step 5).
    pub reversal_min_score: Decimal,
}

impl Default for ExitOptimizerConfig {
    fn default() -> Self {
        Self {
            partial_tp_ladder: vec![
                PartialTpRung {
                    profit_pct: dec!(2.0),
                    close_fraction: dec!(0.5),
                },
                PartialTpRung {
                    profit_pct: dec!(4.0),
                    close_fraction: dec!(0.5),
                },
            ],
            margin_floor: dec!(10),
            trailing_activate_profit_pct: dec!(1.5),
            trailing_distance_pct: dec!(0.8),
            reversal_min_score: dec!(45),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrailingState {
    active: bool,
    stop_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitDecision {
    pub close_fraction: Decimal,
    pub reason: &'static str,
}

impl ExitDecision {
    fn full(reason: &'static str) -> Self {
        Self {
            close_fraction: Decimal::ONE,
            reason,
        }
    }

    fn partial(close_fraction: Decimal, reason: &'static str) -> Self {
        Self {
            close_fraction,
            reason,
        }
    }

    pub fn is_full(&self) -> bool {
        self.close_fraction >= Decimal::ONE
    }
}

/// Everything the evaluator needs beyond the position row itself and the
/// latest price: an opposite-side candidate for the reversal-exit step and
/// whether the Risk layer is demanding an immediate forced close.
pub struct ExitContext<'a> {
    pub current_price: Decimal,
    pub reversal_signal: Option<&'a SignalCandidate>,
    pub emergency_force_close: bool,
    pub now: DateTime<Utc>,
}

/// Report produced by a reconciliation pass (spec §4.8 health supervision).
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    pub missing_monitors: Vec<Uuid>,
    pub stale_monitors: Vec<Uuid>,
    pub overdue: Vec<Uuid>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_monitors.is_empty() && self.stale_monitors.is_empty() && self.overdue.is_empty()
    }

    /// Raises the first inconsistency as an `Invariant` error so the caller
    /// (a supervisor loop) can treat "reconcile" as an ordinary retryable
    /// action rather than inspecting the report by hand.
    pub fn into_result(self) -> Result<(), EngineError> {
        if let Some(id) = self.overdue.first() {
            return Err(Invariant::OverdueTimeout {
                position_id: id.to_string(),
            }
            .into());
        }
        if !self.missing_monitors.is_empty() || !self.stale_monitors.is_empty() {
            return Err(Invariant::MonitorSetMismatch {
                detail: format!(
                    "missing={:?} stale={:?}",
                    self.missing_monitors, self.stale_monitors
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Per-position monitor and single source of truth for closes (spec §4.8).
/// Trailing-stop and partial-ladder progress are kept in-memory, keyed by
/// position id; a supervisor respawn simply rebuilds this state from the
/// position's current P&L on the next tick, since both are monotonic
/// ratchets recoverable from price alone.
pub struct ExitOptimizer {
    exchange: Arc<dyn ExchangeClient>,
    positions: Arc<dyn PositionRepository>,
    config: ExitOptimizerConfig,
    trailing_state: RwLock<HashMap<Uuid, TrailingState>>,
    ladder_progress: RwLock<HashMap<Uuid, usize>>,
}

impl ExitOptimizer {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        positions: Arc<dyn PositionRepository>,
        config: ExitOptimizerConfig,
    ) -> Self {
        Self {
            exchange,
            positions,
            config,
            trailing_state: RwLock::new(HashMap::new()),
            ladder_progress: RwLock::new(HashMap::new()),
        }
    }

    fn price_pnl_pct(position: &Position, price: Decimal) -> Decimal {
        let raw = match position.side {
            Side::Long => (price - position.avg_entry_price) / position.avg_entry_price,
            Side::Short => (position.avg_entry_price - price) / position.avg_entry_price,
        };
        raw * dec!(100)
    }

    fn trail_price(side: Side, price: Decimal, distance_pct: Decimal) -> Decimal {
        match side {
            Side::Long => price * (Decimal::ONE - distance_pct / dec!(100)),
            Side::Short => price * (Decimal::ONE + distance_pct / dec!(100)),
        }
    }

    fn hard_stop_loss(position: &Position, price: Decimal) -> Option<ExitDecision> {
        let crossed = match position.side {
            Side::Long => price <= position.stop_loss_price,
            Side::Short => price >= position.stop_loss_price,
        };
        crossed.then(|| ExitDecision::full("止损"))
    }

    fn take_profit(position: &Position, price: Decimal) -> Option<ExitDecision> {
        let crossed = match position.side {
            Side::Long => price >= position.take_profit_price,
            Side::Short => price <= position.take_profit_price,
        };
        crossed.then(|| ExitDecision::full("止盈"))
    }

    fn partial_ladder(&self, position: &Position, price: Decimal) -> Option<ExitDecision> {
        let pct = Self::price_pnl_pct(position, price);
        let mut progress = self.ladder_progress.write().unwrap_or_else(|e| e.into_inner());
        let next_idx = *progress.get(&position.id).unwrap_or(&0);
        let rung = self.config.partial_tp_ladder.get(next_idx)?;
        if pct < rung.profit_pct {
            return None;
        }
        progress.insert(position.id, next_idx + 1);
        let residual_margin = position.margin * (Decimal::ONE - rung.close_fraction);
        if residual_margin < self.config.margin_floor {
            Some(ExitDecision::full("止盈(满仓升级)"))
        } else {
            Some(ExitDecision::partial(rung.close_fraction, "止盈(阶梯)"))
        }
    }

    fn trailing_stop(&self, position: &Position, price: Decimal) -> Option<ExitDecision> {
        let pct = Self::price_pnl_pct(position, price);
        let mut states = self.trailing_state.write().unwrap_or_else(|e| e.into_inner());
        let state = states.entry(position.id).or_insert(TrailingState {
            active: false,
            stop_price: Decimal::ZERO,
        });

        if !state.active {
            if pct >= self.config.trailing_activate_profit_pct {
                state.active = true;
                state.stop_price = Self::trail_price(position.side, price, self.config.trailing_distance_pct);
            }
            return None;
        }

        let candidate_stop = Self::trail_price(position.side, price, self.config.trailing_distance_pct);
        match position.side {
            Side::Long if candidate_stop > state.stop_price => state.stop_price = candidate_stop,
            Side::Short if candidate_stop < state.stop_price => state.stop_price = candidate_stop,
            _ => {}
        }

        let triggered = match position.side {
            Side::Long => price <= state.stop_price,
            Side::Short => price >= state.stop_price,
        };
        if triggered {
            states.remove(&position.id);
            Some(ExitDecision::full("移动止损"))
        } else {
            None
        }
    }

    fn reversal_exit(&self, position: &Position, ctx: &ExitContext) -> Option<ExitDecision> {
        let candidate = ctx.reversal_signal?;
        if candidate.symbol != position.symbol || candidate.side == position.side {
            return None;
        }
        let score = Decimal::try_from(candidate.score).unwrap_or_default();
        (score >= self.config.reversal_min_score).then(|| ExitDecision::full("反转信号平仓"))
    }

    fn timeout_exit(position: &Position, now: DateTime<Utc>) -> Option<ExitDecision> {
        (now >= position.timeout_at).then(|| ExitDecision::full("超时"))
    }

    /// Evaluates the seven ordered checks of spec §4.8 and returns the
    /// first that fires, or `None` if the position should keep running.
    pub fn evaluate(&self, position: &Position, ctx: &ExitContext) -> Option<ExitDecision> {
        Self::hard_stop_loss(position, ctx.current_price)
            .or_else(|| Self::take_profit(position, ctx.current_price))
            .or_else(|| self.partial_ladder(position, ctx.current_price))
            .or_else(|| self.trailing_stop(position, ctx.current_price))
            .or_else(|| self.reversal_exit(position, ctx))
            .or_else(|| Self::timeout_exit(position, ctx.now))
            .or_else(|| ctx.emergency_force_close.then(|| ExitDecision::full("EMERGENCY: 紧急平仓")))
    }

    fn realized_pnl_slice(position: &Position, fill_price: Decimal, close_fraction: Decimal) -> Decimal {
        let qty = position.quantity * close_fraction;
        match position.side {
            Side::Long => (fill_price - position.avg_entry_price) * qty,
            Side::Short => (position.avg_entry_price - fill_price) * qty,
        }
    }

    /// Executes a close decision: places the opposing order, persists the
    /// state change in one transaction, and clears any in-memory ladder/
    /// trailing progress once the position is fully closed.
    pub async fn apply_decision(
        &self,
        position: &mut Position,
        decision: ExitDecision,
    ) -> Result<(), EngineError> {
        let close_quantity = position.quantity * decision.close_fraction;
        let fill = self
            .exchange
            .place_order(ExchangeOrderRequest {
                symbol: position.symbol.clone(),
                side: OrderKind::closing(position.side),
                quantity: close_quantity,
                leverage: position.leverage,
            })
            .await?;

        let pnl_slice = Self::realized_pnl_slice(position, fill.avg_fill_price, decision.close_fraction);
        let released_margin = position.margin * decision.close_fraction;
        let now = Utc::now();

        if decision.is_full() {
            let notional = fill.avg_fill_price * fill.executed_quantity;
            let order = Order {
                order_id: Uuid::new_v4(),
                account_id: position.account_id,
                position_id: position.id,
                symbol: position.symbol.clone(),
                side: OrderKind::closing(position.side),
                order_type: "market".to_string(),
                leverage: position.leverage,
                price: fill.avg_fill_price,
                quantity: close_quantity,
                executed_quantity: fill.executed_quantity,
                total_value: notional,
                executed_value: notional,
                fee: fill.fee,
                fee_rate: fill.fee_rate,
                status: OrderStatus::Filled,
                avg_fill_price: fill.avg_fill_price,
                fill_time: fill.fill_time,
                realized_pnl: pnl_slice,
                pnl_pct: Self::price_pnl_pct(position, fill.avg_fill_price),
                order_source: "exit_optimizer".to_string(),
                notes: decision.reason.to_string(),
            };
            let trade = Trade {
                trade_id: Uuid::new_v4(),
                position_id: position.id,
                account_id: position.account_id,
                symbol: position.symbol.clone(),
                side: position.side,
                price: fill.avg_fill_price,
                quantity: fill.executed_quantity,
                notional_value: notional,
                leverage: position.leverage,
                margin: position.margin,
                fee: fill.fee,
                realized_pnl: pnl_slice,
                pnl_pct: Self::price_pnl_pct(position, fill.avg_fill_price),
                roi: if position.margin.is_zero() {
                    Decimal::ZERO
                } else {
                    pnl_slice / position.margin * dec!(100)
                },
                entry_price: position.avg_entry_price,
                close_price: fill.avg_fill_price,
                order_id: order.order_id,
                trade_time: now,
                created_at: now,
            };
            self.positions
                .close_with_fill(position.id, order, trade, released_margin, pnl_slice, now)
                .await?;
            position.close(now, pnl_slice);
            self.trailing_state.write().unwrap_or_else(|e| e.into_inner()).remove(&position.id);
            self.ladder_progress.write().unwrap_or_else(|e| e.into_inner()).remove(&position.id);
        } else {
            self.positions
                .apply_partial_close(position.id, decision.close_fraction, pnl_slice, released_margin)
                .await?;
            position.apply_partial_close(decision.close_fraction, pnl_slice);
        }

        info!(
            position_id = %position.id,
            symbol = %position.symbol,
            reason = decision.reason,
            fraction = %decision.close_fraction,
            "position closed"
        );
        Ok(())
    }

    /// Force-closes a position outside the normal `evaluate` flow, e.g. the
    /// opposite-side close spec §4.6 requires before a strong-breakout
    /// entry proceeds.
    pub async fn force_close(&self, position: &mut Position, reason: &'static str) -> Result<(), EngineError> {
        self.apply_decision(position, ExitDecision::full(reason)).await
    }

    /// Compares the monitored-position-id set against the non-closed rows
    /// and flags overdue timeouts (spec §4.8 health supervision).
    pub fn reconcile(
        &self,
        monitored_ids: &HashSet<Uuid>,
        active_positions: &[Position],
        now: DateTime<Utc>,
    ) -> ReconciliationReport {
        let active_ids: HashSet<Uuid> = active_positions.iter().map(|p| p.id).collect();
        ReconciliationReport {
            missing_monitors: active_ids.difference(monitored_ids).copied().collect(),
            stale_monitors: monitored_ids.difference(&active_ids).copied().collect(),
            overdue: active_positions
                .iter()
                .filter(|p| now >= p.timeout_at)
                .map(|p| p.id)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ExchangeFill;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

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

    struct RecordingPositions {
        closed: Mutex<Vec<Uuid>>,
        partial: Mutex<Vec<(Uuid, Decimal)>>,
    }

    #[async_trait]
    impl PositionRepository for RecordingPositions {
        async fn find_active(&self, _: Uuid, _: &str, _: Side) -> Result<Option<Position>, EngineError> {
            Ok(None)
        }
        async fn find_by_id(&self, _: Uuid) -> Result<Option<Position>, EngineError> {
            Ok(None)
        }
        async fn find_all_active(&self, _: Uuid) -> Result<Vec<Position>, EngineError> {
            Ok(Vec::new())
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
        async fn apply_partial_close(
            &self,
            position_id: Uuid,
            close_fraction: Decimal,
            _: Decimal,
            _: Decimal,
        ) -> Result<(), EngineError> {
            self.partial.lock().unwrap().push((position_id, close_fraction));
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
            Ok(())
        }
        async fn push_note(&self, _: Uuid, _: &str) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn long_position(entry: Decimal, stop: Decimal, take_profit: Decimal) -> Position {
        let now = Utc::now();
        Position {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
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
            stop_loss_price: stop,
            take_profit_price: take_profit,
            entry_signal_type: "momentum_24h".into(),
            entry_reason: "score 50".into(),
            entry_score: dec!(50),
            signal_components: vec!["momentum_24h".into()],
            max_hold_minutes: 120,
            timeout_at: now + Duration::minutes(120),
            status: crate::domain::trading::PositionStatus::Open,
            realized_pnl: Decimal::ZERO,
            notes: Vec::new(),
            updated_at: now,
        }
    }

    fn optimizer() -> ExitOptimizer {
        ExitOptimizer::new(
            Arc::new(FixedExchange(dec!(50000))),
            Arc::new(RecordingPositions {
                closed: Mutex::new(Vec::new()),
                partial: Mutex::new(Vec::new()),
            }),
            ExitOptimizerConfig::default(),
        )
    }

    fn ctx(price: Decimal) -> ExitContext<'static> {
        ExitContext {
            current_price: price,
            reversal_signal: None,
            emergency_force_close: false,
            now: Utc::now(),
        }
    }

    #[test]
    fn hard_stop_loss_fires_before_anything_else() {
        let opt = optimizer();
        let position = long_position(dec!(50000), dec!(49000), dec!(52000));
        let decision = opt.evaluate(&position, &ctx(dec!(48900))).unwrap();
        assert_eq!(decision.reason, "止损");
        assert!(decision.is_full());
    }

    #[test]
    fn take_profit_fires_when_no_stop_loss_hit() {
        let opt = optimizer();
        let position = long_position(dec!(50000), dec!(49000), dec!(52000));
        let decision = opt.evaluate(&position, &ctx(dec!(52100))).unwrap();
        assert_eq!(decision.reason, "止盈");
    }

    #[test]
    fn partial_ladder_triggers_at_configured_band() {
        let opt = optimizer();
        let position = long_position(dec!(50000), dec!(40000), dec!(90000));
        let decision = opt.evaluate(&position, &ctx(dec!(51000))).unwrap();
        assert_eq!(decision.reason, "止盈(阶梯)");
        assert_eq!(decision.close_fraction, dec!(0.5));
    }

    #[test]
    fn partial_ladder_upgrades_to_full_below_margin_floor() {
        let mut config = ExitOptimizerConfig::default();
        config.partial_tp_ladder = vec![PartialTpRung {
            profit_pct: dec!(2.0),
            close_fraction: dec!(0.98),
        }];
        let opt = ExitOptimizer::new(
            Arc::new(FixedExchange(dec!(51000))),
            Arc::new(RecordingPositions {
                closed: Mutex::new(Vec::new()),
                partial: Mutex::new(Vec::new()),
            }),
            config,
        );
        let position = long_position(dec!(50000), dec!(40000), dec!(90000));
        let decision = opt.evaluate(&position, &ctx(dec!(51000))).unwrap();
        assert_eq!(decision.reason, "止盈(满仓升级)");
        assert!(decision.is_full());
    }

    #[test]
    fn timeout_fires_when_due() {
        let opt = optimizer();
        let mut position = long_position(dec!(50000), dec!(40000), dec!(90000));
        position.timeout_at = Utc::now() - Duration::seconds(5);
        let decision = opt.evaluate(&position, &ctx(dec!(50100))).unwrap();
        assert_eq!(decision.reason, "超时");
    }

    #[test]
    fn emergency_force_close_fires_last() {
        let opt = optimizer();
        let position = long_position(dec!(50000), dec!(40000), dec!(90000));
        let mut c = ctx(dec!(50100));
        c.emergency_force_close = true;
        let decision = opt.evaluate(&position, &c).unwrap();
        assert_eq!(decision.reason, "紧急平仓");
    }

    #[test]
    fn reconcile_flags_missing_and_stale_monitors() {
        let opt = optimizer();
        let position = long_position(dec!(50000), dec!(40000), dec!(90000));
        let monitored: HashSet<Uuid> = [Uuid::new_v4()].into_iter().collect();
        let report = opt.reconcile(&monitored, &[position], Utc::now());
        assert!(!report.is_consistent());
        assert_eq!(report.missing_monitors.len(), 1);
        assert_eq!(report.stale_monitors.len(), 1);
    }

    #[tokio::test]
    async fn apply_decision_full_close_persists_and_clears_state() {
        let opt = optimizer();
        let mut position = long_position(dec!(50000), dec!(49000), dec!(52000));
        opt.apply_decision(&mut position, ExitDecision::full("止盈")).await.unwrap();
        assert_eq!(position.status, crate::domain::trading::PositionStatus::Closed);
        assert_eq!(position.quantity, Decimal::ZERO);
    }
}
