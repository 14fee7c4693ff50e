//! Entry Executor (spec §4.7) and Exit Optimizer (spec §4.8).

pub mod entry_executor;
pub mod exit_optimizer;

pub use entry_executor::EntryExecutor;
pub use exit_optimizer::ExitOptimizer;
