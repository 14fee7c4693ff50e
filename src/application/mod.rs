//! Orchestration layer: the components of the control-flow diagram, wired
//! together by `system`/`bootstrap`. Nothing here does its own I/O — ports
//! from `domain::ports`/`domain::repositories` are injected by the
//! composition root.

pub mod brain;
pub mod bootstrap;
pub mod events;
pub mod execution;
pub mod market_data;
pub mod optimization;
pub mod price_feed;
pub mod regime;
pub mod risk_management;
pub mod strategies;
pub mod system;
