//! Composition root for the State Store Access Layer (spec §4.11): opens the
//! Postgres pool, runs schema migration, seeds the single trading account if
//! this is a fresh database, and wires one `Pg*Repository` per
//! `domain::repositories` trait.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::domain::repositories::{
    AccountRepository, AdaptiveParamsRepository, KlineRepository, ModeStateRepository,
    OrderRepository, PositionRepository, ScoringWeightsRepository, SignalBlacklistRepository,
    SignalQualityRepository, SymbolRatingRepository, TradeRepository, TradingControlRepository,
    VolatilityProfileRepository,
};
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::{
    PgAccountRepository, PgAdaptiveParamsRepository, PgKlineRepository, PgModeStateRepository,
    PgOrderRepository, PgPositionRepository, PgScoringWeightsRepository,
    PgSignalBlacklistRepository, PgSignalQualityRepository, PgSymbolRatingRepository,
    PgTradeRepository, PgTradingControlRepository, PgVolatilityProfileRepository,
};

#[derive(Clone)]
pub struct PersistenceHandle {
    pub database: Database,
    pub accounts: Arc<dyn AccountRepository>,
    pub positions: Arc<dyn PositionRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub klines: Arc<dyn KlineRepository>,
    pub symbol_ratings: Arc<dyn SymbolRatingRepository>,
    pub blacklist: Arc<dyn SignalBlacklistRepository>,
    pub signal_quality: Arc<dyn SignalQualityRepository>,
    pub scoring_weights: Arc<dyn ScoringWeightsRepository>,
    pub adaptive_params: Arc<dyn AdaptiveParamsRepository>,
    pub volatility_profiles: Arc<dyn VolatilityProfileRepository>,
    pub mode_state: Arc<dyn ModeStateRepository>,
    pub trading_control: Arc<dyn TradingControlRepository>,
}

pub struct PersistenceBootstrap;

impl PersistenceBootstrap {
    pub async fn init(config: &Config) -> Result<PersistenceHandle> {
        info!(host = %config.database.host, db = %config.database.name, "initializing database");

        let database = Database::connect(&config.database)
            .await
            .context("connecting to database")?;

        seed_account(&database, config)
            .await
            .context("seeding trading account")?;

        let pool = database.pool.clone();

        Ok(PersistenceHandle {
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            positions: Arc::new(PgPositionRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            trades: Arc::new(PgTradeRepository::new(pool.clone())),
            klines: Arc::new(PgKlineRepository::new(pool.clone())),
            symbol_ratings: Arc::new(PgSymbolRatingRepository::new(pool.clone())),
            blacklist: Arc::new(PgSignalBlacklistRepository::new(pool.clone())),
            signal_quality: Arc::new(PgSignalQualityRepository::new(pool.clone())),
            scoring_weights: Arc::new(PgScoringWeightsRepository::new(pool.clone())),
            adaptive_params: Arc::new(PgAdaptiveParamsRepository::new(pool.clone())),
            volatility_profiles: Arc::new(PgVolatilityProfileRepository::new(pool.clone())),
            mode_state: Arc::new(PgModeStateRepository::new(pool.clone())),
            trading_control: Arc::new(PgTradingControlRepository::new(pool.clone())),
            database,
        })
    }
}

/// Inserts the configured account row if it isn't already there. The
/// `AccountRepository` port has no write side (spec §4.11 treats account
/// mutation as part of the position/order write transactions), so a fresh
/// database needs exactly one row to exist before any scan can run.
async fn seed_account(database: &Database, config: &Config) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO futures_trading_accounts
            (id, current_balance, frozen_balance, realized_pnl, updated_at)
        VALUES ($1, $2, 0, 0, now())
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(config.account.id)
    .bind(config.account.initial_balance_usd)
    .execute(&database.pool)
    .await
    .context("upserting trading account row")?;

    if result.rows_affected() > 0 {
        info!(
            account_id = %config.account.id,
            balance = %config.account.initial_balance_usd,
            "seeded new trading account"
        );
    }

    Ok(())
}
