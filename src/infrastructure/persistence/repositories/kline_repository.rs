//! `candles`, read newest-first from storage and reversed to the
//! oldest-first order `domain::market::indicators` expects (spec §4.2).

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::errors::{EngineError, Fatal};
use crate::domain::market::{Candle, Timeframe};
use crate::domain::repositories::KlineRepository;

pub struct PgKlineRepository {
    pool: PgPool,
}

impl PgKlineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> EngineError {
    Fatal::SchemaMissing { table: e.to_string() }.into()
}

#[async_trait]
impl KlineRepository for PgKlineRepository {
    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM candles WHERE symbol = $1 AND timeframe = $2 ORDER BY open_time DESC LIMIT $3",
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut candles: Vec<Candle> = rows
            .iter()
            .map(|row| {
                Ok(Candle {
                    open_time: row.try_get("open_time").map_err(db_err)?,
                    open: row.try_get("open").map_err(db_err)?,
                    high: row.try_get("high").map_err(db_err)?,
                    low: row.try_get("low").map_err(db_err)?,
                    close: row.try_get("close").map_err(db_err)?,
                    volume: row.try_get("volume").map_err(db_err)?,
                })
            })
            .collect::<Result<_, EngineError>>()?;
        candles.reverse();
        Ok(candles)
    }
}
