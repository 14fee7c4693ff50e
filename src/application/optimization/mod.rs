//! Adaptive Optimizer (spec §4.10). The rest of this directory was the
//! teacher's grid-search backtesting/benchmark suite
//! (`adaptive_optimization_service`, `benchmark_metrics`, `crypto_clusters`,
//! `engine`, `expectancy_evaluator`, `optimizer`, `parallel_benchmark`,
//! `reporting`, `simulator`, `win_rate_provider`); it depends on
//! `application::agents`, `domain::trading::{portfolio,types,fee_model}`,
//! and `domain::market::market_regime`, none of which this crate carries,
//! and has no spec counterpart (no backtest/benchmark surface is in scope).
pub mod adaptive_optimizer;

pub use adaptive_optimizer::AdaptiveOptimizer;
