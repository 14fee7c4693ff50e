use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::errors::{Conflict, EngineError, Fatal};
use crate::domain::regime::{Big4Signal, Mode, ModeState};
use crate::domain::repositories::{ModeStateRepository, TradingControlRepository};
use crate::domain::risk::TradingControl;

fn db_err(e: sqlx::Error) -> EngineError {
    Fatal::SchemaMissing { table: e.to_string() }.into()
}

pub struct PgModeStateRepository {
    pool: PgPool,
}

impl PgModeStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModeStateRepository for PgModeStateRepository {
    async fn find(&self, account_id: Uuid, trading_type: &str) -> Result<ModeState, EngineError> {
        let row = sqlx::query("SELECT * FROM market_mode_state WHERE account_id = $1 AND trading_type = $2")
            .bind(account_id)
            .bind(trading_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => {
                let mode_str: String = row.try_get("current_mode").map_err(db_err)?;
                let signal_str: Option<String> = row.try_get("last_switch_signal").map_err(db_err)?;
                Ok(ModeState {
                    account_id: row.try_get("account_id").map_err(db_err)?,
                    trading_type: row.try_get("trading_type").map_err(db_err)?,
                    current_mode: if mode_str == "trend" { Mode::Trend } else { Mode::Range },
                    switched_at: row.try_get("switched_at").map_err(db_err)?,
                    confirming_observations: row.try_get::<i32, _>("confirming_observations").map_err(db_err)? as u32,
                    last_switch_reason: row.try_get("last_switch_reason").map_err(db_err)?,
                    last_switch_signal: signal_str.map(|s| match s.as_str() {
                        "bullish" => Big4Signal::Bullish,
                        "bearish" => Big4Signal::Bearish,
                        _ => Big4Signal::Neutral,
                    }),
                })
            }
            None => Ok(ModeState {
                account_id,
                trading_type: trading_type.to_string(),
                current_mode: Mode::Trend,
                switched_at: Utc::now(),
                confirming_observations: 0,
                last_switch_reason: None,
                last_switch_signal: None,
            }),
        }
    }

    async fn record_switch(
        &self,
        account_id: Uuid,
        trading_type: &str,
        new_mode: Mode,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mode_str = match new_mode {
            Mode::Trend => "trend",
            Mode::Range => "range",
        };

        let result = sqlx::query(
            r#"
            INSERT INTO market_mode_state (account_id, trading_type, current_mode, switched_at, confirming_observations, last_switch_reason, last_switch_signal)
            VALUES ($1,$2,$3,$4,0,$5,NULL)
            ON CONFLICT (account_id, trading_type) DO UPDATE SET
                current_mode = excluded.current_mode,
                switched_at = excluded.switched_at,
                confirming_observations = 0,
                last_switch_reason = excluded.last_switch_reason
            WHERE market_mode_state.current_mode != excluded.current_mode
            "#,
        )
        .bind(account_id)
        .bind(trading_type)
        .bind(mode_str)
        .bind(at)
        .bind(&reason)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Conflict::AlreadyClosed {
                position_id: format!("{account_id}/{trading_type}"),
                status: "mode already switched by a racing writer".into(),
            }
            .into());
        }
        Ok(())
    }

    async fn record_observation(
        &self,
        account_id: Uuid,
        trading_type: &str,
        confirming_observations: u32,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO market_mode_state (account_id, trading_type, current_mode, switched_at, confirming_observations, last_switch_reason, last_switch_signal)
            VALUES ($1,$2,'trend',$3,$4,NULL,NULL)
            ON CONFLICT (account_id, trading_type) DO UPDATE SET
                confirming_observations = excluded.confirming_observations
            "#,
        )
        .bind(account_id)
        .bind(trading_type)
        .bind(Utc::now())
        .bind(confirming_observations as i32)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

pub struct PgTradingControlRepository {
    pool: PgPool,
}

impl PgTradingControlRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradingControlRepository for PgTradingControlRepository {
    async fn find(&self, account_id: Uuid, trading_type: &str) -> Result<TradingControl, EngineError> {
        let row = sqlx::query("SELECT * FROM trading_control WHERE account_id = $1 AND trading_type = $2")
            .bind(account_id)
            .bind(trading_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(match row {
            Some(row) => TradingControl {
                account_id: row.try_get("account_id").map_err(db_err)?,
                trading_type: row.try_get("trading_type").map_err(db_err)?,
                trading_enabled: row.try_get("trading_enabled").map_err(db_err)?,
            },
            None => TradingControl {
                account_id,
                trading_type: trading_type.to_string(),
                trading_enabled: true,
            },
        })
    }
}
