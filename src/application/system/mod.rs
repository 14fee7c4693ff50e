//! Composition root: wires every `domain::ports`/`domain::repositories`
//! boundary to its concrete implementation and spawns the task graph of
//! spec §5 — main scanner, exit monitor, price-stream reader, daily
//! optimizer, metrics reporter — plus the Ctrl+C-triggered graceful
//! shutdown.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{Duration, Timelike, Utc};
use rust_decimal_macros::dec;
use tracing::{error, info, warn};
use uuid::Uuid;

pub mod shutdown_service;

use crate::application::bootstrap::{PersistenceBootstrap, PersistenceHandle};
use crate::application::brain::DecisionBrain;
use crate::application::brain::decision_brain::ScanContext;
use crate::application::execution::entry_executor::EntryContext;
use crate::application::execution::exit_optimizer::{ExitContext, ExitOptimizerConfig};
use crate::application::execution::{EntryExecutor, ExitOptimizer};
use crate::application::market_data::KlineAccessor;
use crate::application::optimization::adaptive_optimizer::{AdaptiveOptimizer, AdaptiveOptimizerConfig};
use crate::application::price_feed::PriceFeedGateway;
use crate::application::regime::mode_switcher::ModeSwitcherConfig;
use crate::application::regime::{Big4Service, ModeSwitcher};
use crate::application::risk_management::{EmergencyLayer, EmergencyLayerConfig};
use crate::application::system::shutdown_service::{EmergencyShutdownConfig, ShutdownService};
use crate::config::Config;
use crate::domain::ports::{ExchangeClient, PriceFeed};
use crate::domain::regime::Mode;
use crate::domain::repositories::EmergencyBlocksSource;
use crate::domain::risk::ScoringWeights;
use crate::domain::trading::{PositionStatus, Side};
use crate::infrastructure::exchange::BinanceFuturesClient;
use crate::infrastructure::observability::{Metrics, MetricsReporter};
use crate::infrastructure::price_stream::WsTickerSource;

/// This engine drives exactly one market type (USDT-margined perpetuals)
/// and one account-wide regime state machine, so `trading_type` is a fixed
/// key rather than a per-symbol one (spec §1, §4.5).
const TRADING_TYPE: &str = "perp_usdt";
/// Fixed leverage, matching spec §8 Scenario A's worked example. No
/// per-symbol leverage table exists in the data model.
const LEVERAGE: u32 = 5;
/// Base margin per immediate/batched entry before the rating and regime
/// multipliers (spec §4.7, Scenario A).
const DEFAULT_POSITION_SIZE: rust_decimal::Decimal = dec!(400);
/// Batched entries split into this many slices over `BATCH_HORIZON` (spec
/// §4.7b "bounded horizon, default ≤ 60 minutes").
const BATCH_SLICES: u32 = 4;
const BATCH_HORIZON_MINUTES: i64 = 60;

pub struct Application {
    config: Config,
    persistence: PersistenceHandle,
    metrics: Metrics,
    price_feed: Arc<PriceFeedGateway>,
    exchange: Arc<dyn ExchangeClient>,
    brain: Arc<DecisionBrain>,
    entry_executor: Arc<EntryExecutor>,
    exit_optimizer: Arc<ExitOptimizer>,
    emergency_layer: Arc<EmergencyLayer>,
    big4_service: Arc<Big4Service>,
    mode_switcher: Arc<ModeSwitcher>,
    adaptive_optimizer: Arc<AdaptiveOptimizer>,
}

/// Returned to `main.rs`; holds nothing the caller needs beyond proof the
/// system is up and a handle to drive a `/metrics`-less render if wanted.
pub struct SystemHandle {
    pub metrics: Metrics,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!(symbols = config.symbols.len(), "building trading engine");

        let metrics = Metrics::new()?;
        let persistence = PersistenceBootstrap::init(&config).await?;

        let price_feed = Arc::new(PriceFeedGateway::new(persistence.klines.clone()));
        let exchange: Arc<dyn ExchangeClient> = Arc::new(BinanceFuturesClient::new(
            config.exchange.api_key.clone(),
            config.exchange.api_secret.clone(),
            config.exchange.base_url.clone(),
        ));

        let klines = Arc::new(KlineAccessor::new(persistence.klines.clone()));
        let brain = Arc::new(DecisionBrain::new(klines.clone()));

        let entry_executor = Arc::new(EntryExecutor::new(
            price_feed.clone(),
            exchange.clone(),
            persistence.positions.clone(),
        ));

        let exit_optimizer = Arc::new(ExitOptimizer::new(
            exchange.clone(),
            persistence.positions.clone(),
            ExitOptimizerConfig::default(),
        ));

        let emergency_layer = Arc::new(EmergencyLayer::new(
            klines.clone(),
            persistence.positions.clone(),
            price_feed.clone() as Arc<dyn PriceFeed>,
            EmergencyLayerConfig {
                big4_symbols: config.big4_symbols.clone(),
                ..Default::default()
            },
        ));

        let big4_service = Arc::new(Big4Service::new(
            config.big4_symbols.clone(),
            klines.clone(),
            config.big4_cache_ttl_override_secs,
        ));

        let mode_switcher = Arc::new(ModeSwitcher::new(
            persistence.mode_state.clone(),
            persistence.positions.clone(),
            klines.clone(),
            ModeSwitcherConfig::default(),
        ));

        let adaptive_optimizer = Arc::new(AdaptiveOptimizer::new(
            persistence.positions.clone(),
            klines,
            persistence.signal_quality.clone(),
            persistence.blacklist.clone(),
            persistence.adaptive_params.clone(),
            persistence.scoring_weights.clone(),
            persistence.symbol_ratings.clone(),
            persistence.volatility_profiles.clone(),
            AdaptiveOptimizerConfig::default(),
        ));

        Ok(Self {
            config,
            persistence,
            metrics,
            price_feed,
            exchange,
            brain,
            entry_executor,
            exit_optimizer,
            emergency_layer,
            big4_service,
            mode_switcher,
            adaptive_optimizer,
        })
    }

    pub async fn start(self) -> Result<SystemHandle> {
        let account_id = self.config.account.id;

        info!(account_id = %account_id, "starting task graph");

        WsTickerSource::new(
            self.config.exchange.ws_url.clone(),
            self.config.symbols.clone(),
            self.price_feed.clone(),
        )
        .spawn();

        let reporter = MetricsReporter::new(
            account_id,
            self.persistence.accounts.clone(),
            self.persistence.positions.clone(),
            self.metrics.clone(),
            60,
        );
        tokio::spawn(reporter.run());

        tokio::spawn(run_main_scan_loop(
            account_id,
            self.config.clone(),
            self.brain.clone(),
            self.entry_executor.clone(),
            self.exit_optimizer.clone(),
            self.emergency_layer.clone(),
            self.big4_service.clone(),
            self.mode_switcher.clone(),
            self.persistence.clone(),
            self.metrics.clone(),
        ));

        tokio::spawn(run_exit_monitor_loop(
            account_id,
            self.config.monitor_interval_secs,
            self.config.anti_fomo_enabled,
            self.price_feed.clone(),
            self.exit_optimizer.clone(),
            self.brain.clone(),
            self.persistence.clone(),
            self.emergency_layer.clone(),
            self.metrics.clone(),
        ));

        tokio::spawn(run_daily_optimizer_loop(
            account_id,
            self.config.symbols.clone(),
            self.config.optimizer_schedule.hour_utc,
            self.adaptive_optimizer.clone(),
            self.metrics.clone(),
        ));

        let flatten_on_exit = std::env::var("FLATTEN_ON_EXIT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let shutdown_service = Arc::new(ShutdownService::new(
            account_id,
            self.persistence.positions.clone(),
            self.price_feed.clone() as Arc<dyn PriceFeed>,
            self.exit_optimizer.clone(),
            EmergencyShutdownConfig {
                flatten_on_exit,
                liquidation_timeout_ms: 10_000,
            },
        ));

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received shutdown signal");
                    shutdown_service.shutdown().await;
                    info!("shutdown complete, exiting");
                    std::process::exit(0);
                }
                Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
            }
        });

        Ok(SystemHandle {
            metrics: self.metrics,
        })
    }
}

/// Main scanner loop (spec §5): regime detection, mode switching, candidate
/// generation, entry dispatch, once every `main_scan_interval_secs`.
#[allow(clippy::too_many_arguments)]
async fn run_main_scan_loop(
    account_id: Uuid,
    config: Config,
    brain: Arc<DecisionBrain>,
    entry_executor: Arc<EntryExecutor>,
    exit_optimizer: Arc<ExitOptimizer>,
    emergency_layer: Arc<EmergencyLayer>,
    big4_service: Arc<Big4Service>,
    mode_switcher: Arc<ModeSwitcher>,
    persistence: PersistenceHandle,
    metrics: Metrics,
) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(config.main_scan_interval_secs));
    loop {
        interval.tick().await;
        let started = std::time::Instant::now();
        match run_one_scan(
            account_id,
            &config,
            &brain,
            &entry_executor,
            &exit_optimizer,
            &emergency_layer,
            &big4_service,
            &mode_switcher,
            &persistence,
            &metrics,
        )
        .await
        {
            Ok(()) => metrics.observe_scan_duration("ok", started.elapsed().as_secs_f64()),
            Err(e) => {
                warn!(error = %e, "scan tick failed, retrying next period");
                metrics.observe_scan_duration("error", started.elapsed().as_secs_f64());
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_scan(
    account_id: Uuid,
    config: &Config,
    brain: &DecisionBrain,
    entry_executor: &EntryExecutor,
    exit_optimizer: &ExitOptimizer,
    emergency_layer: &EmergencyLayer,
    big4_service: &Big4Service,
    mode_switcher: &ModeSwitcher,
    persistence: &PersistenceHandle,
    metrics: &Metrics,
) -> Result<()> {
    let now = Utc::now();

    let blocks = emergency_layer.run_tick(account_id, now).await?;
    metrics.set_emergency_block("bottom_reversal", blocks.bottom_reversal_until.is_some_and(|t| t > now));
    metrics.set_emergency_block("top_reversal", blocks.top_reversal_until.is_some_and(|t| t > now));
    metrics.set_emergency_block("aggregate_loss", blocks.aggregate_loss_until.is_some_and(|t| t > now));
    metrics.set_emergency_block("stop_loss_circuit", blocks.stop_loss_circuit_until.is_some_and(|t| t > now));

    let big4 = big4_service.current().await?;

    // Mode is an account-wide state machine (spec §4.5); the Big4 basket's
    // first symbol stands in for "the market" for the range-vs-trend read,
    // since the classifier itself takes a single symbol's candles.
    let representative_symbol = config
        .big4_symbols
        .first()
        .cloned()
        .unwrap_or_else(|| "BTC/USDT".to_string());
    let classification = mode_switcher.classify(&representative_symbol).await?;
    let mode = mode_switcher
        .observe(account_id, TRADING_TYPE, classification, big4.overall_signal, false)
        .await?;
    metrics.current_mode.with_label_values(&[TRADING_TYPE]).set(match mode {
        Mode::Trend => 0.0,
        Mode::Range => 1.0,
    });

    let trading_control = persistence.trading_control.find(account_id, TRADING_TYPE).await?;
    if !trading_control.trading_enabled {
        info!("trading disabled via trading_control, skipping entry dispatch this tick");
        return Ok(());
    }

    // Range mode pauses new entries; exits keep running in the monitor loop
    // (spec §4.5 "effectively a pause-and-monitor state").
    if mode == Mode::Range {
        return Ok(());
    }

    let weights = ScoringWeights::new(persistence.scoring_weights.active_weights().await?);
    let blacklist = persistence.blacklist.active_entries().await?;
    let recently_closed_positions = persistence
        .positions
        .find_closed_since(account_id, now - Duration::minutes(15))
        .await?;
    let mut recently_closed = std::collections::HashMap::new();
    for position in &recently_closed_positions {
        if let Some(closed_at) = position.close_time {
            recently_closed
                .entry((position.symbol.clone(), position.side))
                .and_modify(|existing: &mut chrono::DateTime<Utc>| {
                    if closed_at > *existing {
                        *existing = closed_at;
                    }
                })
                .or_insert(closed_at);
        }
    }

    let ctx = ScanContext {
        weights,
        blacklist,
        // No bulk accessor exists on `SignalQualityRepository` to prefetch
        // every (fingerprint, side) pair ahead of scoring, so the
        // quality-adjusted threshold is inert for a scan until the
        // adaptive optimizer has a reason to look one up directly.
        quality: std::collections::HashMap::new(),
        emergency_blocks: blocks,
        recently_closed,
        anti_fomo_enabled: config.anti_fomo_enabled,
        now,
    };

    let ratings = persistence.symbol_ratings.whitelist().await?;
    let adaptive_params = persistence.adaptive_params.find().await?;

    for rating in &ratings {
        let candidate = match brain.evaluate_symbol(&rating.symbol, &ctx).await {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) if e.is_retryable() => return Err(e.into()),
            Err(_) => continue,
        };

        metrics.inc_signal(&candidate.symbol, &candidate.side.to_string());

        let volatility_profile = persistence.volatility_profiles.find(&candidate.symbol).await?;
        let entry_ctx = EntryContext {
            account_id,
            default_position_size: candidate.position_size_override.unwrap_or(DEFAULT_POSITION_SIZE),
            rating,
            adaptive_params: &adaptive_params,
            volatility_profile: volatility_profile.as_ref(),
            big4_signal: big4.overall_signal,
            leverage: LEVERAGE,
        };

        if candidate.is_breakout() {
            match persistence
                .positions
                .find_active(account_id, &candidate.symbol, candidate.side.opposite())
                .await
            {
                Ok(Some(mut opposite)) => {
                    match exit_optimizer
                        .force_close(&mut opposite, "EMERGENCY: breakout flip")
                        .await
                    {
                        Ok(()) => {
                            metrics.inc_orders(&opposite.side.to_string(), "closed");
                            info!(symbol = %opposite.symbol, side = %opposite.side, "closed opposite-side position ahead of breakout entry");
                        }
                        Err(e) if e.is_retryable() => return Err(e.into()),
                        Err(e) => {
                            warn!(symbol = %candidate.symbol, error = %e, "failed to close opposite-side position, skipping breakout entry");
                            continue;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => return Err(e.into()),
                Err(e) => {
                    warn!(symbol = %candidate.symbol, error = %e, "opposite-side lookup failed, skipping breakout entry");
                    continue;
                }
            }
        }

        let use_batched = config.batch_entry_enabled && candidate.allow_batched_entry && !candidate.is_breakout();

        let result = if use_batched {
            entry_executor
                .batched_entry(
                    &candidate,
                    &entry_ctx,
                    BATCH_SLICES,
                    Duration::minutes(BATCH_HORIZON_MINUTES),
                    || async { true },
                )
                .await
        } else {
            entry_executor.immediate_entry(&candidate, &entry_ctx).await
        };

        match result {
            Ok(position) => {
                metrics.inc_orders(&position.side.to_string(), "opened");
                info!(symbol = %position.symbol, side = %position.side, "entry dispatched");
            }
            Err(e) if e.is_retryable() => return Err(e.into()),
            Err(e) => warn!(symbol = %candidate.symbol, error = %e, "entry rejected"),
        }
    }

    Ok(())
}

/// Exit monitor loop (spec §4.8): evaluates every open/building position
/// every `monitor_interval_secs`. A single supervisor loop stands in for
/// "one monitor task per position" — positions churn fast enough that
/// spawning/aborting a task per open/close would add bookkeeping (the
/// `ReconciliationReport` this module already defines) without changing
/// behavior, since every tick still evaluates the full active set either
/// way.
#[allow(clippy::too_many_arguments)]
async fn run_exit_monitor_loop(
    account_id: Uuid,
    interval_secs: u64,
    anti_fomo_enabled: bool,
    price_feed: Arc<PriceFeedGateway>,
    exit_optimizer: Arc<ExitOptimizer>,
    brain: Arc<DecisionBrain>,
    persistence: PersistenceHandle,
    emergency_layer: Arc<EmergencyLayer>,
    metrics: Metrics,
) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs));
    loop {
        interval.tick().await;

        let positions = match persistence.positions.find_all_active(account_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to list active positions for monitor tick");
                continue;
            }
        };

        let blocks = emergency_layer.current_blocks().await;
        let now = Utc::now();

        // Scored fresh each tick so the reversal-exit check (spec §4.8 step
        // 5) sees the same weights/blacklist a live scan would, without
        // threading the main scanner's quality/recently-closed cache in.
        let scan_ctx = match build_reversal_scan_context(&persistence, &blocks, anti_fomo_enabled, now).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "failed to build reversal scan context for monitor tick");
                continue;
            }
        };

        for mut position in positions {
            if position.status != PositionStatus::Open {
                continue;
            }

            let quote = match price_feed.get_price(&position.symbol).await {
                Ok(q) => q,
                Err(e) => {
                    warn!(symbol = %position.symbol, error = %e, "no price for monitor tick");
                    continue;
                }
            };

            let force_close = match position.side {
                Side::Short => blocks.bottom_reversal_until.is_some_and(|t| t > now),
                Side::Long => blocks.top_reversal_until.is_some_and(|t| t > now),
            };

            let reversal_candidate = match brain.evaluate_symbol(&position.symbol, &scan_ctx).await {
                Ok(Some(c)) if c.side == position.side.opposite() => Some(c),
                Ok(_) => None,
                Err(e) => {
                    warn!(symbol = %position.symbol, error = %e, "reversal scoring failed for monitor tick");
                    None
                }
            };

            let ctx = ExitContext {
                current_price: quote.price,
                reversal_signal: reversal_candidate.as_ref(),
                emergency_force_close: force_close,
                now,
            };

            if let Some(decision) = exit_optimizer.evaluate(&position, &ctx) {
                let is_stop_loss = decision.reason == "止损";
                match exit_optimizer.apply_decision(&mut position, decision).await {
                    Ok(()) => {
                        emergency_layer.record_close(is_stop_loss);
                        metrics.inc_orders(&position.side.to_string(), "closed");
                    }
                    Err(e) => warn!(symbol = %position.symbol, error = %e, "exit close failed"),
                }
            }
        }
    }
}

/// Builds the minimal `ScanContext` the reversal-exit check needs: real
/// weights and blacklist, but no quality/recently-closed cache, since those
/// only gate new entries, not the opposite-side read the exit monitor does.
async fn build_reversal_scan_context(
    persistence: &PersistenceHandle,
    blocks: &crate::domain::risk::EmergencyBlocks,
    anti_fomo_enabled: bool,
    now: chrono::DateTime<Utc>,
) -> Result<ScanContext> {
    let weights = ScoringWeights::new(persistence.scoring_weights.active_weights().await?);
    let blacklist = persistence.blacklist.active_entries().await?;
    Ok(ScanContext {
        weights,
        blacklist,
        quality: std::collections::HashMap::new(),
        emergency_blocks: blocks.clone(),
        recently_closed: std::collections::HashMap::new(),
        anti_fomo_enabled,
        now,
    })
}

/// Daily adaptive optimizer run (spec §4.10), fired once per UTC day at
/// `hour_utc`.
async fn run_daily_optimizer_loop(
    account_id: Uuid,
    symbols: Vec<String>,
    hour_utc: u32,
    optimizer: Arc<AdaptiveOptimizer>,
    metrics: Metrics,
) {
    let mut last_run_date = None;
    let mut interval = tokio::time::interval(StdDuration::from_secs(60));
    loop {
        interval.tick().await;
        let now = Utc::now();
        if now.hour() != hour_utc || last_run_date == Some(now.date_naive()) {
            continue;
        }

        match optimizer.run_daily(account_id, &symbols, now).await {
            Ok(report) => {
                let applied = !report.adjusted_weights.is_empty()
                    || !report.blacklisted.is_empty()
                    || !report.ratings.is_empty();
                metrics.inc_optimizer_run(applied);
                info!(?report, "adaptive optimizer run complete");
            }
            Err(e) => error!(error = %e, "adaptive optimizer run failed"),
        }
        last_run_date = Some(now.date_naive());
    }
}
