//! The small hot-reloadable risk tables (spec §3): symbol ratings, the
//! signal blacklist, signal quality stats, scoring weights, adaptive
//! parameters, and volatility profiles. Grouped in one file since each
//! implementation is a handful of lines around a single-row or
//! single-key table.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::errors::{EngineError, Fatal};
use crate::domain::repositories::{
    AdaptiveParamsRepository, ScoringWeightsRepository, SignalBlacklistRepository,
    SignalQualityRepository, SymbolRatingRepository, VolatilityProfileRepository,
};
use crate::domain::risk::{
    AdaptiveParams, RatingLevel, ScoringWeight, SignalBlacklistEntry, SignalQualityStats,
    SymbolRating, VolatilityProfile,
};
use crate::domain::trading::Side;

fn db_err(e: sqlx::Error) -> EngineError {
    Fatal::SchemaMissing { table: e.to_string() }.into()
}

pub struct PgSymbolRatingRepository {
    pool: PgPool,
}

impl PgSymbolRatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SymbolRatingRepository for PgSymbolRatingRepository {
    async fn find(&self, symbol: &str) -> Result<Option<SymbolRating>, EngineError> {
        let row = sqlx::query("SELECT * FROM trading_symbol_rating WHERE symbol = $1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|row| {
            Ok(SymbolRating {
                symbol: row.try_get("symbol").map_err(db_err)?,
                rating_level: RatingLevel::from_i16(row.try_get("rating_level").map_err(db_err)?),
                margin_multiplier: row.try_get("margin_multiplier").map_err(db_err)?,
            })
        })
        .transpose()
    }

    async fn whitelist(&self) -> Result<Vec<SymbolRating>, EngineError> {
        let rows = sqlx::query("SELECT * FROM trading_symbol_rating WHERE rating_level = 0")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(SymbolRating {
                    symbol: row.try_get("symbol").map_err(db_err)?,
                    rating_level: RatingLevel::from_i16(row.try_get("rating_level").map_err(db_err)?),
                    margin_multiplier: row.try_get("margin_multiplier").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn upsert(&self, rating: SymbolRating) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO trading_symbol_rating (symbol, rating_level, margin_multiplier) VALUES ($1,$2,$3) \
             ON CONFLICT (symbol) DO UPDATE SET rating_level = excluded.rating_level, margin_multiplier = excluded.margin_multiplier",
        )
        .bind(&rating.symbol)
        .bind(rating.rating_level as i16)
        .bind(rating.margin_multiplier)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

pub struct PgSignalBlacklistRepository {
    pool: PgPool,
}

impl PgSignalBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalBlacklistRepository for PgSignalBlacklistRepository {
    async fn active_entries(&self) -> Result<Vec<SignalBlacklistEntry>, EngineError> {
        let rows = sqlx::query("SELECT * FROM signal_blacklist WHERE is_active = true")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                let side_str: String = row.try_get("position_side").map_err(db_err)?;
                Ok(SignalBlacklistEntry {
                    signal_type: row.try_get("signal_type").map_err(db_err)?,
                    position_side: if side_str == "LONG" { Side::Long } else { Side::Short },
                    is_active: row.try_get("is_active").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn upsert(&self, entry: SignalBlacklistEntry) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO signal_blacklist (signal_type, position_side, is_active) VALUES ($1,$2,$3) \
             ON CONFLICT (signal_type, position_side) DO UPDATE SET is_active = excluded.is_active",
        )
        .bind(&entry.signal_type)
        .bind(entry.position_side.to_string())
        .bind(entry.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

pub struct PgSignalQualityRepository {
    pool: PgPool,
}

impl PgSignalQualityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalQualityRepository for PgSignalQualityRepository {
    async fn find(
        &self,
        fingerprint: &str,
        side: Side,
    ) -> Result<Option<SignalQualityStats>, EngineError> {
        let row = sqlx::query("SELECT * FROM signal_quality_stats WHERE signal_fingerprint = $1 AND side = $2")
            .bind(fingerprint)
            .bind(side.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|row| {
            Ok(SignalQualityStats {
                signal_fingerprint: row.try_get("signal_fingerprint").map_err(db_err)?,
                side,
                sample_count: row.try_get::<i32, _>("sample_count").map_err(db_err)? as u32,
                win_rate: row.try_get("win_rate").map_err(db_err)?,
                avg_pnl: row.try_get("avg_pnl").map_err(db_err)?,
                threshold_adjustment: row.try_get("threshold_adjustment").map_err(db_err)?,
            })
        })
        .transpose()
    }

    async fn upsert(&self, stats: SignalQualityStats) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO signal_quality_stats (signal_fingerprint, side, sample_count, win_rate, avg_pnl, threshold_adjustment) VALUES ($1,$2,$3,$4,$5,$6) \
             ON CONFLICT (signal_fingerprint, side) DO UPDATE SET sample_count = excluded.sample_count, win_rate = excluded.win_rate, avg_pnl = excluded.avg_pnl, threshold_adjustment = excluded.threshold_adjustment",
        )
        .bind(&stats.signal_fingerprint)
        .bind(stats.side.to_string())
        .bind(stats.sample_count as i32)
        .bind(stats.win_rate)
        .bind(stats.avg_pnl)
        .bind(stats.threshold_adjustment)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

pub struct PgScoringWeightsRepository {
    pool: PgPool,
}

impl PgScoringWeightsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoringWeightsRepository for PgScoringWeightsRepository {
    async fn active_weights(&self) -> Result<Vec<ScoringWeight>, EngineError> {
        let rows = sqlx::query("SELECT * FROM signal_scoring_weights WHERE is_active = true")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(ScoringWeight {
                    component: row.try_get("component").map_err(db_err)?,
                    weight_long: row.try_get("weight_long").map_err(db_err)?,
                    weight_short: row.try_get("weight_short").map_err(db_err)?,
                    is_active: row.try_get("is_active").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn upsert(&self, weight: ScoringWeight) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO signal_scoring_weights (component, weight_long, weight_short, is_active) VALUES ($1,$2,$3,$4) \
             ON CONFLICT (component) DO UPDATE SET weight_long = excluded.weight_long, weight_short = excluded.weight_short, is_active = excluded.is_active",
        )
        .bind(&weight.component)
        .bind(weight.weight_long)
        .bind(weight.weight_short)
        .bind(weight.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

pub struct PgAdaptiveParamsRepository {
    pool: PgPool,
}

impl PgAdaptiveParamsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdaptiveParamsRepository for PgAdaptiveParamsRepository {
    async fn find(&self) -> Result<AdaptiveParams, EngineError> {
        let row = sqlx::query("SELECT * FROM adaptive_params WHERE id = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(AdaptiveParams {
            long_stop_loss_pct: row.try_get("long_stop_loss_pct").map_err(db_err)?,
            long_take_profit_pct: row.try_get("long_take_profit_pct").map_err(db_err)?,
            short_stop_loss_pct: row.try_get("short_stop_loss_pct").map_err(db_err)?,
            short_take_profit_pct: row.try_get("short_take_profit_pct").map_err(db_err)?,
            min_holding_minutes: row.try_get("min_holding_minutes").map_err(db_err)?,
            position_size_multiplier: row.try_get("position_size_multiplier").map_err(db_err)?,
        })
    }

    async fn upsert(&self, params: AdaptiveParams) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO adaptive_params (id, long_stop_loss_pct, long_take_profit_pct, short_stop_loss_pct, short_take_profit_pct, min_holding_minutes, position_size_multiplier) \
             VALUES (1,$1,$2,$3,$4,$5,$6) \
             ON CONFLICT (id) DO UPDATE SET long_stop_loss_pct = excluded.long_stop_loss_pct, long_take_profit_pct = excluded.long_take_profit_pct, \
             short_stop_loss_pct = excluded.short_stop_loss_pct, short_take_profit_pct = excluded.short_take_profit_pct, \
             min_holding_minutes = excluded.min_holding_minutes, position_size_multiplier = excluded.position_size_multiplier",
        )
        .bind(params.long_stop_loss_pct)
        .bind(params.long_take_profit_pct)
        .bind(params.short_stop_loss_pct)
        .bind(params.short_take_profit_pct)
        .bind(params.min_holding_minutes)
        .bind(params.position_size_multiplier)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

pub struct PgVolatilityProfileRepository {
    pool: PgPool,
}

impl PgVolatilityProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VolatilityProfileRepository for PgVolatilityProfileRepository {
    async fn find(&self, symbol: &str) -> Result<Option<VolatilityProfile>, EngineError> {
        let row = sqlx::query("SELECT * FROM symbol_volatility_profile WHERE symbol = $1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|row| {
            Ok(VolatilityProfile {
                symbol: row.try_get("symbol").map_err(db_err)?,
                long_fixed_tp_pct: row.try_get("long_fixed_tp_pct").map_err(db_err)?,
                short_fixed_tp_pct: row.try_get("short_fixed_tp_pct").map_err(db_err)?,
            })
        })
        .transpose()
    }

    async fn upsert(&self, profile: VolatilityProfile) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO symbol_volatility_profile (symbol, long_fixed_tp_pct, short_fixed_tp_pct) VALUES ($1,$2,$3) \
             ON CONFLICT (symbol) DO UPDATE SET long_fixed_tp_pct = excluded.long_fixed_tp_pct, short_fixed_tp_pct = excluded.short_fixed_tp_pct",
        )
        .bind(&profile.symbol)
        .bind(profile.long_fixed_tp_pct)
        .bind(profile.short_fixed_tp_pct)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
