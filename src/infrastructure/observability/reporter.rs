//! Push-based metrics reporter.
//!
//! Periodically outputs account/position state as structured JSON to
//! stdout. No HTTP server, no incoming connections, only outbound logs —
//! matching spec §6's "no external HTTP API is emitted by the core".

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::repositories::{AccountRepository, PositionRepository};
use crate::infrastructure::observability::metrics::Metrics;

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub account: AccountSnapshot,
    pub positions: Vec<PositionSnapshot>,
}

#[derive(Serialize)]
pub struct AccountSnapshot {
    pub balance_usd: f64,
    pub frozen_usd: f64,
    pub realized_pnl_usd: f64,
    pub win_rate: f64,
}

#[derive(Serialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub side: String,
    pub status: String,
    pub quantity: f64,
    pub margin_usd: f64,
}

/// Outputs account/position state as structured JSON logs on a configurable
/// interval. No HTTP server: only outbound data.
pub struct MetricsReporter {
    account_id: Uuid,
    accounts: Arc<dyn AccountRepository>,
    positions: Arc<dyn PositionRepository>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(
        account_id: Uuid,
        accounts: Arc<dyn AccountRepository>,
        positions: Arc<dyn PositionRepository>,
        metrics: Metrics,
        interval_seconds: u64,
    ) -> Self {
        Self {
            account_id,
            accounts,
            positions,
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub async fn run(self) {
        info!(interval = ?self.interval, "metrics reporter starting, push-based JSON to stdout");

        loop {
            tokio::time::sleep(self.interval).await;

            match self.collect_snapshot().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        println!("METRICS_JSON:{json}");
                        info!(
                            balance = snapshot.account.balance_usd,
                            positions = snapshot.positions.len(),
                            uptime_seconds = snapshot.uptime_seconds,
                            "metrics snapshot"
                        );
                    }
                    Err(e) => warn!(error = %e, "failed to serialize metrics snapshot"),
                },
                Err(e) => warn!(error = %e, "failed to collect metrics snapshot"),
            }
        }
    }

    async fn collect_snapshot(&self) -> anyhow::Result<MetricsSnapshot> {
        let account = self.accounts.find(self.account_id).await?;
        let positions = self.positions.find_all_active(self.account_id).await?;
        let uptime = self.start_time.elapsed().as_secs();

        let balance = account.current_balance.to_f64().unwrap_or(0.0);
        let frozen = account.frozen_balance.to_f64().unwrap_or(0.0);
        let realized_pnl = account.realized_pnl.to_f64().unwrap_or(0.0);

        self.metrics.account_balance_usd.set(balance);
        self.metrics.account_frozen_usd.set(frozen);
        self.metrics.account_realized_pnl_usd.set(realized_pnl);
        self.metrics.win_rate_current.set(account.win_rate.to_f64().unwrap_or(0.0));
        self.metrics.uptime_seconds.set(uptime as f64);

        let mut snapshots = Vec::with_capacity(positions.len());
        for position in &positions {
            let margin = position.margin.to_f64().unwrap_or(0.0);
            self.metrics.set_position_margin(&position.symbol, margin);
            snapshots.push(PositionSnapshot {
                symbol: position.symbol.clone(),
                side: position.side.to_string(),
                status: format!("{:?}", position.status).to_lowercase(),
                quantity: position.quantity.to_f64().unwrap_or(0.0),
                margin_usd: margin,
            });
        }

        Ok(MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            account: AccountSnapshot {
                balance_usd: balance,
                frozen_usd: frozen,
                realized_pnl_usd: realized_pnl,
                win_rate: account.win_rate.to_f64().unwrap_or(0.0),
            },
            positions: snapshots,
        })
    }
}
