//! Prometheus metric definitions for the trading core.
//!
//! All metrics use the `perpcore_` prefix. There is no HTTP `/metrics`
//! endpoint (spec §6 "no external HTTP API is emitted by the core");
//! `render()` exists for `reporter.rs`'s periodic stdout push and for tests.

use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Account balance available for new margin.
    pub account_balance_usd: GenericGauge<AtomicF64>,
    /// Account margin currently frozen by open/building positions.
    pub account_frozen_usd: GenericGauge<AtomicF64>,
    /// Cumulative realized P&L on the account.
    pub account_realized_pnl_usd: GenericGauge<AtomicF64>,
    /// Count of positions by status (open, building).
    pub positions_count: GenericGaugeVec<AtomicF64>,
    /// Margin committed per symbol across all non-closed positions.
    pub position_margin_usd: GenericGaugeVec<AtomicF64>,
    /// Orders by side and status (spec §3 Order / §4.8 close reasons).
    pub orders_total: CounterVec,
    /// Whether each of the three emergency breakers (spec §4.9) is currently armed.
    pub emergency_block_active: GenericGaugeVec<AtomicF64>,
    /// Current regime per trading type (0 = trend, 1 = range, spec §4.5).
    pub current_mode: GenericGaugeVec<AtomicF64>,
    /// Main scanner loop duration (spec §5 "must not block ... longer than one scan period").
    pub scan_duration_seconds: HistogramVec,
    /// Exchange REST call latency by endpoint.
    pub exchange_latency_seconds: HistogramVec,
    /// Price-stream reconnection attempts.
    pub websocket_reconnects_total: CounterVec,
    /// Candidates generated by the Decision Brain, by symbol and side.
    pub trade_signals_total: CounterVec,
    /// Current account win rate as a percentage (0-100).
    pub win_rate_current: GenericGauge<AtomicF64>,
    /// Adaptive Optimizer runs (spec §4.10), split by whether auto-apply took effect.
    pub adaptive_optimizer_runs_total: CounterVec,
    /// Process uptime in seconds.
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let account_balance_usd = Gauge::with_opts(Opts::new(
            "perpcore_account_balance_usd",
            "Account balance available for new margin",
        ))?;
        registry.register(Box::new(account_balance_usd.clone()))?;

        let account_frozen_usd = Gauge::with_opts(Opts::new(
            "perpcore_account_frozen_usd",
            "Account margin frozen by open or building positions",
        ))?;
        registry.register(Box::new(account_frozen_usd.clone()))?;

        let account_realized_pnl_usd = Gauge::with_opts(Opts::new(
            "perpcore_account_realized_pnl_usd",
            "Cumulative realized P&L on the account",
        ))?;
        registry.register(Box::new(account_realized_pnl_usd.clone()))?;

        let positions_count = GaugeVec::new(
            Opts::new("perpcore_positions_count", "Position count by status"),
            &["status"],
        )?;
        registry.register(Box::new(positions_count.clone()))?;

        let position_margin_usd = GaugeVec::new(
            Opts::new(
                "perpcore_position_margin_usd",
                "Margin committed per symbol across non-closed positions",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(position_margin_usd.clone()))?;

        let orders_total = CounterVec::new(
            Opts::new("perpcore_orders_total", "Total orders by side and status"),
            &["side", "status"],
        )?;
        registry.register(Box::new(orders_total.clone()))?;

        let emergency_block_active = GaugeVec::new(
            Opts::new(
                "perpcore_emergency_block_active",
                "Whether an emergency breaker is currently armed (0/1)",
            ),
            &["breaker"],
        )?;
        registry.register(Box::new(emergency_block_active.clone()))?;

        let current_mode = GaugeVec::new(
            Opts::new(
                "perpcore_current_mode",
                "Current regime per trading type (0=trend, 1=range)",
            ),
            &["trading_type"],
        )?;
        registry.register(Box::new(current_mode.clone()))?;

        let scan_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "perpcore_scan_duration_seconds",
                "Main scanner loop duration in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(scan_duration_seconds.clone()))?;

        let exchange_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "perpcore_exchange_latency_seconds",
                "Exchange REST call latency in seconds",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(exchange_latency_seconds.clone()))?;

        let websocket_reconnects_total = CounterVec::new(
            Opts::new(
                "perpcore_websocket_reconnects_total",
                "Total price-stream reconnection attempts",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(websocket_reconnects_total.clone()))?;

        let trade_signals_total = CounterVec::new(
            Opts::new(
                "perpcore_trade_signals_total",
                "Candidates generated by the decision brain",
            ),
            &["symbol", "side"],
        )?;
        registry.register(Box::new(trade_signals_total.clone()))?;

        let win_rate_current = Gauge::with_opts(Opts::new(
            "perpcore_win_rate_current",
            "Current account win rate as a percentage (0-100)",
        ))?;
        registry.register(Box::new(win_rate_current.clone()))?;

        let adaptive_optimizer_runs_total = CounterVec::new(
            Opts::new(
                "perpcore_adaptive_optimizer_runs_total",
                "Adaptive optimizer runs, by whether changes were auto-applied",
            ),
            &["auto_applied"],
        )?;
        registry.register(Box::new(adaptive_optimizer_runs_total.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "perpcore_uptime_seconds",
            "Process uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            account_balance_usd,
            account_frozen_usd,
            account_realized_pnl_usd,
            positions_count,
            position_margin_usd,
            orders_total,
            emergency_block_active,
            current_mode,
            scan_duration_seconds,
            exchange_latency_seconds,
            websocket_reconnects_total,
            trade_signals_total,
            win_rate_current,
            adaptive_optimizer_runs_total,
            uptime_seconds,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn set_position_margin(&self, symbol: &str, margin: f64) {
        self.position_margin_usd
            .with_label_values(&[symbol])
            .set(margin);
    }

    pub fn inc_orders(&self, side: &str, status: &str) {
        self.orders_total.with_label_values(&[side, status]).inc();
    }

    pub fn set_emergency_block(&self, breaker: &str, active: bool) {
        self.emergency_block_active
            .with_label_values(&[breaker])
            .set(if active { 1.0 } else { 0.0 });
    }

    pub fn observe_scan_duration(&self, outcome: &str, seconds: f64) {
        self.scan_duration_seconds
            .with_label_values(&[outcome])
            .observe(seconds);
    }

    pub fn observe_exchange_latency(&self, endpoint: &str, seconds: f64) {
        self.exchange_latency_seconds
            .with_label_values(&[endpoint])
            .observe(seconds);
    }

    pub fn inc_reconnects(&self, stream: &str) {
        self.websocket_reconnects_total
            .with_label_values(&[stream])
            .inc();
    }

    pub fn inc_signal(&self, symbol: &str, side: &str) {
        self.trade_signals_total
            .with_label_values(&[symbol, side])
            .inc();
    }

    pub fn inc_optimizer_run(&self, auto_applied: bool) {
        self.adaptive_optimizer_runs_total
            .with_label_values(&[if auto_applied { "true" } else { "false" }])
            .inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("static metric definitions are always valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_metrics() {
        let metrics = Metrics::new().expect("metrics construct");
        assert!(metrics.render().contains("perpcore_"));
    }

    #[test]
    fn account_balance_round_trips() {
        let metrics = Metrics::new().expect("metrics construct");
        metrics.account_balance_usd.set(50000.0);
        let output = metrics.render();
        assert!(output.contains("perpcore_account_balance_usd 50000"));
    }

    #[test]
    fn position_margin_labeled_by_symbol() {
        let metrics = Metrics::new().expect("metrics construct");
        metrics.set_position_margin("BTC/USDT", 1000.0);
        metrics.set_position_margin("ETH/USDT", 500.0);
        let output = metrics.render();
        assert!(output.contains("perpcore_position_margin_usd"));
        assert!(output.contains("BTC/USDT"));
        assert!(output.contains("ETH/USDT"));
    }

    #[test]
    fn orders_counter_increments() {
        let metrics = Metrics::new().expect("metrics construct");
        metrics.inc_orders("LONG", "filled");
        metrics.inc_orders("SHORT", "rejected");
        let output = metrics.render();
        assert!(output.contains("perpcore_orders_total"));
    }

    #[test]
    fn emergency_block_toggles() {
        let metrics = Metrics::new().expect("metrics construct");
        metrics.set_emergency_block("aggregate_loss", true);
        let output = metrics.render();
        assert!(output.contains("perpcore_emergency_block_active"));
        assert!(output.contains("aggregate_loss"));
    }
}
