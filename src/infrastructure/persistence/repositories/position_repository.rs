//! `futures_positions` (spec §3, §4.11). Money-moving writes are single
//! `sqlx` transactions so "one transaction per business operation" is
//! enforced here, not left to callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::{Conflict, EngineError, Fatal};
use crate::domain::repositories::PositionRepository;
use crate::domain::trading::{Order, Position, PositionStatus, Side, Trade};

pub struct PgPositionRepository {
    pool: PgPool,
}

impl PgPositionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_position(row: &sqlx::postgres::PgRow) -> Result<Position, EngineError> {
    let side_str: String = row.try_get("side").map_err(db_err)?;
    let status_str: String = row.try_get("status").map_err(db_err)?;
    let components: serde_json::Value = row.try_get("signal_components").map_err(db_err)?;
    let notes: serde_json::Value = row.try_get("notes").map_err(db_err)?;

    Ok(Position {
        id: row.try_get("id").map_err(db_err)?,
        account_id: row.try_get("account_id").map_err(db_err)?,
        symbol: row.try_get("symbol").map_err(db_err)?,
        side: Side::from_str(&side_str).map_err(|_| Fatal::SchemaMissing { table: "futures_positions.side".into() })?,
        quantity: row.try_get("quantity").map_err(db_err)?,
        entry_price: row.try_get("entry_price").map_err(db_err)?,
        avg_entry_price: row.try_get("avg_entry_price").map_err(db_err)?,
        leverage: row.try_get::<i32, _>("leverage").map_err(db_err)? as u32,
        notional_value: row.try_get("notional_value").map_err(db_err)?,
        margin: row.try_get("margin").map_err(db_err)?,
        open_time: row.try_get("open_time").map_err(db_err)?,
        close_time: row.try_get("close_time").map_err(db_err)?,
        stop_loss_price: row.try_get("stop_loss_price").map_err(db_err)?,
        take_profit_price: row.try_get("take_profit_price").map_err(db_err)?,
        entry_signal_type: row.try_get("entry_signal_type").map_err(db_err)?,
        entry_reason: row.try_get("entry_reason").map_err(db_err)?,
        entry_score: row.try_get("entry_score").map_err(db_err)?,
        signal_components: serde_json::from_value(components).unwrap_or_default(),
        max_hold_minutes: row.try_get("max_hold_minutes").map_err(db_err)?,
        timeout_at: row.try_get("timeout_at").map_err(db_err)?,
        status: match status_str.as_str() {
            "building" => PositionStatus::Building,
            "open" => PositionStatus::Open,
            _ => PositionStatus::Closed,
        },
        realized_pnl: row.try_get("realized_pnl").map_err(db_err)?,
        notes: serde_json::from_value(notes).unwrap_or_default(),
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn db_err(e: sqlx::Error) -> EngineError {
    Fatal::SchemaMissing { table: e.to_string() }.into()
}

fn status_str(status: PositionStatus) -> &'static str {
    match status {
        PositionStatus::Building => "building",
        PositionStatus::Open => "open",
        PositionStatus::Closed => "closed",
    }
}

#[async_trait]
impl PositionRepository for PgPositionRepository {
    async fn find_active(
        &self,
        account_id: Uuid,
        symbol: &str,
        side: Side,
    ) -> Result<Option<Position>, EngineError> {
        let row = sqlx::query(
            "SELECT * FROM futures_positions WHERE account_id = $1 AND symbol = $2 AND side = $3 AND status != 'closed'",
        )
        .bind(account_id)
        .bind(symbol)
        .bind(side.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_position).transpose()
    }

    async fn find_by_id(&self, position_id: Uuid) -> Result<Option<Position>, EngineError> {
        let row = sqlx::query("SELECT * FROM futures_positions WHERE id = $1")
            .bind(position_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_position).transpose()
    }

    async fn find_all_active(&self, account_id: Uuid) -> Result<Vec<Position>, EngineError> {
        let rows = sqlx::query("SELECT * FROM futures_positions WHERE account_id = $1 AND status != 'closed'")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_position).collect()
    }

    async fn find_active_by_side(
        &self,
        account_id: Uuid,
        side: Side,
    ) -> Result<Vec<Position>, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM futures_positions WHERE account_id = $1 AND side = $2 AND status != 'closed'",
        )
        .bind(account_id)
        .bind(side.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_position).collect()
    }

    async fn find_closed_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Position>, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM futures_positions WHERE account_id = $1 AND status = 'closed' AND close_time >= $2",
        )
        .bind(account_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_position).collect()
    }

    async fn open_and_debit(
        &self,
        position: Position,
        margin_to_freeze: Decimal,
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO futures_positions (
                id, account_id, symbol, side, quantity, entry_price, avg_entry_price,
                leverage, notional_value, margin, open_time, close_time, stop_loss_price,
                take_profit_price, entry_signal_type, entry_reason, entry_score,
                signal_components, max_hold_minutes, timeout_at, status, realized_pnl,
                notes, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)
            "#,
        )
        .bind(position.id)
        .bind(position.account_id)
        .bind(&position.symbol)
        .bind(position.side.to_string())
        .bind(position.quantity)
        .bind(position.entry_price)
        .bind(position.avg_entry_price)
        .bind(position.leverage as i32)
        .bind(position.notional_value)
        .bind(position.margin)
        .bind(position.open_time)
        .bind(position.close_time)
        .bind(position.stop_loss_price)
        .bind(position.take_profit_price)
        .bind(&position.entry_signal_type)
        .bind(&position.entry_reason)
        .bind(position.entry_score)
        .bind(serde_json::to_value(&position.signal_components).unwrap_or_default())
        .bind(position.max_hold_minutes)
        .bind(position.timeout_at)
        .bind(status_str(position.status))
        .bind(position.realized_pnl)
        .bind(serde_json::to_value(&position.notes).unwrap_or_default())
        .bind(position.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "UPDATE futures_trading_accounts SET current_balance = current_balance - $1, frozen_balance = frozen_balance + $1, updated_at = now() WHERE id = $2",
        )
        .bind(margin_to_freeze)
        .bind(position.account_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn append_slice_fill(
        &self,
        position_id: Uuid,
        quantity_delta: Decimal,
        margin_delta: Decimal,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE futures_positions SET quantity = quantity + $1, margin = margin + $2, updated_at = now() WHERE id = $3",
        )
        .bind(quantity_delta)
        .bind(margin_delta)
        .bind(position_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn promote_to_open(&self, position_id: Uuid) -> Result<(), EngineError> {
        sqlx::query("UPDATE futures_positions SET status = 'open', updated_at = now() WHERE id = $1")
            .bind(position_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn apply_partial_close(
        &self,
        position_id: Uuid,
        close_fraction: Decimal,
        realized_pnl_slice: Decimal,
        released_margin: Decimal,
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT account_id FROM futures_positions WHERE id = $1 FOR UPDATE")
            .bind(position_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| Conflict::AlreadyClosed {
                position_id: position_id.to_string(),
                status: "missing".into(),
            })?;
        let account_id: Uuid = row.try_get("account_id").map_err(db_err)?;

        let remaining = Decimal::ONE - close_fraction;
        sqlx::query(
            "UPDATE futures_positions SET quantity = quantity * $1, margin = margin * $1, realized_pnl = realized_pnl + $2, updated_at = now() WHERE id = $3",
        )
        .bind(remaining)
        .bind(realized_pnl_slice)
        .bind(position_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "UPDATE futures_trading_accounts SET frozen_balance = frozen_balance - $1, current_balance = current_balance + $1 + $2, updated_at = now() WHERE id = $3",
        )
        .bind(released_margin)
        .bind(realized_pnl_slice)
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn close_with_fill(
        &self,
        position_id: Uuid,
        order: Order,
        trade: Trade,
        released_margin: Decimal,
        final_realized_pnl_slice: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT account_id, status FROM futures_positions WHERE id = $1 FOR UPDATE")
            .bind(position_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| Conflict::AlreadyClosed {
                position_id: position_id.to_string(),
                status: "missing".into(),
            })?;
        let account_id: Uuid = row.try_get("account_id").map_err(db_err)?;
        let status: String = row.try_get("status").map_err(db_err)?;
        if status == "closed" {
            return Err(Conflict::AlreadyClosed {
                position_id: position_id.to_string(),
                status,
            }
            .into());
        }

        sqlx::query(
            "UPDATE futures_positions SET status = 'closed', quantity = 0, margin = 0, close_time = $1, realized_pnl = realized_pnl + $2, updated_at = $1 WHERE id = $3",
        )
        .bind(closed_at)
        .bind(final_realized_pnl_slice)
        .bind(position_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO futures_orders (
                order_id, account_id, position_id, symbol, side, order_type, leverage, price,
                quantity, executed_quantity, total_value, executed_value, fee, fee_rate, status,
                avg_fill_price, fill_time, realized_pnl, pnl_pct, order_source, notes
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
            "#,
        )
        .bind(order.order_id)
        .bind(order.account_id)
        .bind(order.position_id)
        .bind(&order.symbol)
        .bind(order.side.to_string())
        .bind(&order.order_type)
        .bind(order.leverage as i32)
        .bind(order.price)
        .bind(order.quantity)
        .bind(order.executed_quantity)
        .bind(order.total_value)
        .bind(order.executed_value)
        .bind(order.fee)
        .bind(order.fee_rate)
        .bind(format!("{:?}", order.status).to_lowercase())
        .bind(order.avg_fill_price)
        .bind(order.fill_time)
        .bind(order.realized_pnl)
        .bind(order.pnl_pct)
        .bind(&order.order_source)
        .bind(&order.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO futures_trades (
                trade_id, position_id, account_id, symbol, side, price, quantity, notional_value,
                leverage, margin, fee, realized_pnl, pnl_pct, roi, entry_price, close_price,
                order_id, trade_time, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
            "#,
        )
        .bind(trade.trade_id)
        .bind(trade.position_id)
        .bind(trade.account_id)
        .bind(&trade.symbol)
        .bind(trade.side.to_string())
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.notional_value)
        .bind(trade.leverage as i32)
        .bind(trade.margin)
        .bind(trade.fee)
        .bind(trade.realized_pnl)
        .bind(trade.pnl_pct)
        .bind(trade.roi)
        .bind(trade.entry_price)
        .bind(trade.close_price)
        .bind(trade.order_id)
        .bind(trade.trade_time)
        .bind(trade.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "UPDATE futures_trading_accounts SET frozen_balance = frozen_balance - $1, current_balance = current_balance + $1 + $2, realized_pnl = realized_pnl + $2, total_trades = total_trades + 1, winning_trades = winning_trades + (CASE WHEN $2 >= 0 THEN 1 ELSE 0 END), losing_trades = losing_trades + (CASE WHEN $2 < 0 THEN 1 ELSE 0 END), updated_at = $3 WHERE id = $4",
        )
        .bind(released_margin)
        .bind(final_realized_pnl_slice)
        .bind(closed_at)
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn push_note(&self, position_id: Uuid, note: &str) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE futures_positions SET notes = notes || to_jsonb($1::text), updated_at = now() WHERE id = $2",
        )
        .bind(note)
        .bind(position_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
