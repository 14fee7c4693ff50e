//! Emergency shutdown (spec §4.9, §6): on Ctrl+C, optionally flattens every
//! open/building position through the same Exit Optimizer path a live
//! forced-close would take, gated by `FLATTEN_ON_EXIT`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::execution::ExitOptimizer;
use crate::application::execution::exit_optimizer::ExitContext;
use crate::domain::ports::PriceFeed;
use crate::domain::repositories::PositionRepository;

#[derive(Debug, Clone, Copy)]
pub struct EmergencyShutdownConfig {
    pub flatten_on_exit: bool,
    pub liquidation_timeout_ms: u64,
}

impl Default for EmergencyShutdownConfig {
    fn default() -> Self {
        Self {
            flatten_on_exit: false,
            liquidation_timeout_ms: 10_000,
        }
    }
}

pub struct ShutdownService {
    account_id: Uuid,
    positions: Arc<dyn PositionRepository>,
    price_feed: Arc<dyn PriceFeed>,
    exit_optimizer: Arc<ExitOptimizer>,
    config: EmergencyShutdownConfig,
}

impl ShutdownService {
    pub fn new(
        account_id: Uuid,
        positions: Arc<dyn PositionRepository>,
        price_feed: Arc<dyn PriceFeed>,
        exit_optimizer: Arc<ExitOptimizer>,
        config: EmergencyShutdownConfig,
    ) -> Self {
        Self {
            account_id,
            positions,
            price_feed,
            exit_optimizer,
            config,
        }
    }

    pub async fn shutdown(&self) {
        info!("shutdown sequence starting");

        if self.config.flatten_on_exit {
            let timeout = Duration::from_millis(self.config.liquidation_timeout_ms);
            if tokio::time::timeout(timeout, self.flatten_all()).await.is_err() {
                warn!("flatten-on-exit timed out, exiting with positions possibly still open");
            }
        } else {
            info!("flatten-on-exit disabled, open positions left as-is");
        }

        info!("shutdown sequence complete");
    }

    /// Runs every active position through the same forced-close path the
    /// emergency layer uses mid-session (`ExitContext::emergency_force_close`),
    /// so shutdown flattening and live emergency flattening can never diverge.
    async fn flatten_all(&self) {
        let positions = match self.positions.find_all_active(self.account_id).await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to list active positions during shutdown");
                return;
            }
        };

        for mut position in positions {
            let quote = match self.price_feed.get_price(&position.symbol).await {
                Ok(q) => q,
                Err(e) => {
                    error!(error = %e, symbol = %position.symbol, "failed to price position during flatten");
                    continue;
                }
            };

            let ctx = ExitContext {
                current_price: quote.price,
                reversal_signal: None,
                emergency_force_close: true,
                now: Utc::now(),
            };

            if let Some(decision) = self.exit_optimizer.evaluate(&position, &ctx) {
                if let Err(e) = self
                    .exit_optimizer
                    .apply_decision(&mut position, decision)
                    .await
                {
                    error!(error = %e, symbol = %position.symbol, "failed to flatten position");
                }
            }
        }
    }
}
