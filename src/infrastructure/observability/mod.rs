//! Push-based observability (spec §6 "no external HTTP API is emitted by
//! the core"): Prometheus metric definitions plus a periodic JSON-to-stdout
//! reporter. Nothing in this module accepts incoming connections.

pub mod latency_tracker;
pub mod metrics;
pub mod reporter;

pub use latency_tracker::LatencyGuard;
pub use metrics::Metrics;
pub use reporter::MetricsReporter;
