use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::errors::{EngineError, Fatal};
use crate::domain::repositories::AccountRepository;
use crate::domain::trading::Account;

pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> EngineError {
    Fatal::SchemaMissing { table: e.to_string() }.into()
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find(&self, account_id: Uuid) -> Result<Account, EngineError> {
        let row = sqlx::query("SELECT * FROM futures_trading_accounts WHERE id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(Account {
            id: row.try_get("id").map_err(db_err)?,
            current_balance: row.try_get("current_balance").map_err(db_err)?,
            frozen_balance: row.try_get("frozen_balance").map_err(db_err)?,
            realized_pnl: row.try_get("realized_pnl").map_err(db_err)?,
            total_trades: row.try_get("total_trades").map_err(db_err)?,
            winning_trades: row.try_get("winning_trades").map_err(db_err)?,
            losing_trades: row.try_get("losing_trades").map_err(db_err)?,
            win_rate: row.try_get("win_rate").map_err(db_err)?,
            updated_at: row.try_get("updated_at").map_err(db_err)?,
        })
    }
}
