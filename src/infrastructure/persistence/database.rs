//! Postgres connection pool and schema bootstrap (spec §3 Data Model, §6
//! `DB_HOST`/`DB_PORT`/`DB_USER`/`DB_PASSWORD`/`DB_NAME`).

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::domain::errors::{EngineError, Fatal};

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, EngineError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_url())
            .await
            .map_err(|e| Fatal::DatabaseUnreachable { detail: e.to_string() })?;

        info!(host = %config.host, db = %config.name, "connected to database");

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Creates every table named in spec §3 if missing. Idempotent, run once
    /// at startup; no down-migrations, matching the teacher's `init()`.
    async fn migrate(&self) -> Result<(), EngineError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS futures_trading_accounts (
                id UUID PRIMARY KEY,
                current_balance NUMERIC NOT NULL,
                frozen_balance NUMERIC NOT NULL,
                realized_pnl NUMERIC NOT NULL,
                total_trades BIGINT NOT NULL DEFAULT 0,
                winning_trades BIGINT NOT NULL DEFAULT 0,
                losing_trades BIGINT NOT NULL DEFAULT 0,
                win_rate NUMERIC NOT NULL DEFAULT 0,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS futures_positions (
                id UUID PRIMARY KEY,
                account_id UUID NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity NUMERIC NOT NULL,
                entry_price NUMERIC NOT NULL,
                avg_entry_price NUMERIC NOT NULL,
                leverage INTEGER NOT NULL,
                notional_value NUMERIC NOT NULL,
                margin NUMERIC NOT NULL,
                open_time TIMESTAMPTZ NOT NULL,
                close_time TIMESTAMPTZ,
                stop_loss_price NUMERIC NOT NULL,
                take_profit_price NUMERIC NOT NULL,
                entry_signal_type TEXT NOT NULL,
                entry_reason TEXT NOT NULL,
                entry_score NUMERIC NOT NULL,
                signal_components JSONB NOT NULL,
                max_hold_minutes BIGINT NOT NULL,
                timeout_at TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL,
                realized_pnl NUMERIC NOT NULL,
                notes JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_positions_active_symbol_side ON futures_positions (account_id, symbol, side) WHERE status != 'closed'",
            "CREATE INDEX IF NOT EXISTS idx_positions_closed_since ON futures_positions (account_id, close_time) WHERE status = 'closed'",
            r#"
            CREATE TABLE IF NOT EXISTS futures_orders (
                order_id UUID PRIMARY KEY,
                account_id UUID NOT NULL,
                position_id UUID NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                leverage INTEGER NOT NULL,
                price NUMERIC NOT NULL,
                quantity NUMERIC NOT NULL,
                executed_quantity NUMERIC NOT NULL,
                total_value NUMERIC NOT NULL,
                executed_value NUMERIC NOT NULL,
                fee NUMERIC NOT NULL,
                fee_rate NUMERIC NOT NULL,
                status TEXT NOT NULL,
                avg_fill_price NUMERIC NOT NULL,
                fill_time TIMESTAMPTZ NOT NULL,
                realized_pnl NUMERIC NOT NULL,
                pnl_pct NUMERIC NOT NULL,
                order_source TEXT NOT NULL,
                notes TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_orders_account_recent ON futures_orders (account_id, fill_time DESC)",
            r#"
            CREATE TABLE IF NOT EXISTS futures_trades (
                trade_id UUID PRIMARY KEY,
                position_id UUID NOT NULL,
                account_id UUID NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                price NUMERIC NOT NULL,
                quantity NUMERIC NOT NULL,
                notional_value NUMERIC NOT NULL,
                leverage INTEGER NOT NULL,
                margin NUMERIC NOT NULL,
                fee NUMERIC NOT NULL,
                realized_pnl NUMERIC NOT NULL,
                pnl_pct NUMERIC NOT NULL,
                roi NUMERIC NOT NULL,
                entry_price NUMERIC NOT NULL,
                close_price NUMERIC NOT NULL,
                order_id UUID NOT NULL,
                trade_time TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_trades_account_since ON futures_trades (account_id, trade_time)",
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                open_time BIGINT NOT NULL,
                open NUMERIC NOT NULL,
                high NUMERIC NOT NULL,
                low NUMERIC NOT NULL,
                close NUMERIC NOT NULL,
                volume NUMERIC NOT NULL,
                PRIMARY KEY (symbol, timeframe, open_time)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS trading_symbol_rating (
                symbol TEXT PRIMARY KEY,
                rating_level SMALLINT NOT NULL,
                margin_multiplier NUMERIC NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signal_blacklist (
                signal_type TEXT NOT NULL,
                position_side TEXT NOT NULL,
                is_active BOOLEAN NOT NULL,
                PRIMARY KEY (signal_type, position_side)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signal_quality_stats (
                signal_fingerprint TEXT NOT NULL,
                side TEXT NOT NULL,
                sample_count INTEGER NOT NULL,
                win_rate NUMERIC NOT NULL,
                avg_pnl NUMERIC NOT NULL,
                threshold_adjustment NUMERIC NOT NULL,
                PRIMARY KEY (signal_fingerprint, side)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signal_scoring_weights (
                component TEXT PRIMARY KEY,
                weight_long NUMERIC NOT NULL,
                weight_short NUMERIC NOT NULL,
                is_active BOOLEAN NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS adaptive_params (
                id SMALLINT PRIMARY KEY DEFAULT 1,
                long_stop_loss_pct NUMERIC NOT NULL,
                long_take_profit_pct NUMERIC NOT NULL,
                short_stop_loss_pct NUMERIC NOT NULL,
                short_take_profit_pct NUMERIC NOT NULL,
                min_holding_minutes BIGINT NOT NULL,
                position_size_multiplier NUMERIC NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS symbol_volatility_profile (
                symbol TEXT PRIMARY KEY,
                long_fixed_tp_pct NUMERIC NOT NULL,
                short_fixed_tp_pct NUMERIC NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS market_mode_state (
                account_id UUID NOT NULL,
                trading_type TEXT NOT NULL,
                current_mode TEXT NOT NULL,
                switched_at TIMESTAMPTZ NOT NULL,
                confirming_observations INTEGER NOT NULL,
                last_switch_reason TEXT,
                last_switch_signal TEXT,
                PRIMARY KEY (account_id, trading_type)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS trading_control (
                account_id UUID NOT NULL,
                trading_type TEXT NOT NULL,
                trading_enabled BOOLEAN NOT NULL,
                PRIMARY KEY (account_id, trading_type)
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| Fatal::SchemaMissing { table: e.to_string() })?;
        }

        info!("schema migration complete");
        Ok(())
    }
}
