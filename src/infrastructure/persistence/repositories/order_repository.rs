use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::errors::{EngineError, Fatal};
use crate::domain::repositories::OrderRepository;
use crate::domain::trading::{Order, OrderKind, OrderStatus};

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> EngineError {
    Fatal::SchemaMissing { table: e.to_string() }.into()
}

fn parse_order_kind(s: &str) -> OrderKind {
    match s {
        "LONG" => OrderKind::Long,
        "SHORT" => OrderKind::Short,
        "CLOSE_LONG" => OrderKind::CloseLong,
        _ => OrderKind::CloseShort,
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn find_recent(&self, account_id: Uuid, limit: usize) -> Result<Vec<Order>, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM futures_orders WHERE account_id = $1 ORDER BY fill_time DESC LIMIT $2",
        )
        .bind(account_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let side_str: String = row.try_get("side").map_err(db_err)?;
                let status_str: String = row.try_get("status").map_err(db_err)?;
                Ok(Order {
                    order_id: row.try_get("order_id").map_err(db_err)?,
                    account_id: row.try_get("account_id").map_err(db_err)?,
                    position_id: row.try_get("position_id").map_err(db_err)?,
                    symbol: row.try_get("symbol").map_err(db_err)?,
                    side: parse_order_kind(&side_str),
                    order_type: row.try_get("order_type").map_err(db_err)?,
                    leverage: row.try_get::<i32, _>("leverage").map_err(db_err)? as u32,
                    price: row.try_get("price").map_err(db_err)?,
                    quantity: row.try_get("quantity").map_err(db_err)?,
                    executed_quantity: row.try_get("executed_quantity").map_err(db_err)?,
                    total_value: row.try_get("total_value").map_err(db_err)?,
                    executed_value: row.try_get("executed_value").map_err(db_err)?,
                    fee: row.try_get("fee").map_err(db_err)?,
                    fee_rate: row.try_get("fee_rate").map_err(db_err)?,
                    status: if status_str == "filled" {
                        OrderStatus::Filled
                    } else {
                        OrderStatus::Rejected
                    },
                    avg_fill_price: row.try_get("avg_fill_price").map_err(db_err)?,
                    fill_time: row.try_get("fill_time").map_err(db_err)?,
                    realized_pnl: row.try_get("realized_pnl").map_err(db_err)?,
                    pnl_pct: row.try_get("pnl_pct").map_err(db_err)?,
                    order_source: row.try_get("order_source").map_err(db_err)?,
                    notes: row.try_get("notes").map_err(db_err)?,
                })
            })
            .collect()
    }
}
