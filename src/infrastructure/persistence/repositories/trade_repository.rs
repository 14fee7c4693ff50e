use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::errors::{EngineError, Fatal};
use crate::domain::repositories::TradeRepository;
use crate::domain::trading::{Side, Trade};

pub struct PgTradeRepository {
    pool: PgPool,
}

impl PgTradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> EngineError {
    Fatal::SchemaMissing { table: e.to_string() }.into()
}

#[async_trait]
impl TradeRepository for PgTradeRepository {
    async fn find_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Trade>, EngineError> {
        let rows = sqlx::query("SELECT * FROM futures_trades WHERE account_id = $1 AND trade_time >= $2")
            .bind(account_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let side_str: String = row.try_get("side").map_err(db_err)?;
                Ok(Trade {
                    trade_id: row.try_get("trade_id").map_err(db_err)?,
                    position_id: row.try_get("position_id").map_err(db_err)?,
                    account_id: row.try_get("account_id").map_err(db_err)?,
                    symbol: row.try_get("symbol").map_err(db_err)?,
                    side: if side_str == "LONG" { Side::Long } else { Side::Short },
                    price: row.try_get("price").map_err(db_err)?,
                    quantity: row.try_get("quantity").map_err(db_err)?,
                    notional_value: row.try_get("notional_value").map_err(db_err)?,
                    leverage: row.try_get::<i32, _>("leverage").map_err(db_err)? as u32,
                    margin: row.try_get("margin").map_err(db_err)?,
                    fee: row.try_get("fee").map_err(db_err)?,
                    realized_pnl: row.try_get("realized_pnl").map_err(db_err)?,
                    pnl_pct: row.try_get("pnl_pct").map_err(db_err)?,
                    roi: row.try_get("roi").map_err(db_err)?,
                    entry_price: row.try_get("entry_price").map_err(db_err)?,
                    close_price: row.try_get("close_price").map_err(db_err)?,
                    order_id: row.try_get("order_id").map_err(db_err)?,
                    trade_time: row.try_get("trade_time").map_err(db_err)?,
                    created_at: row.try_get("created_at").map_err(db_err)?,
                })
            })
            .collect()
    }
}
