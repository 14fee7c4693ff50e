//! Market regime: the Big4 benchmark aggregate (§4.4), range-vs-trend
//! classification and mode switching (§4.5), all as pure value types and
//! pure detection functions. Caching/TTL/cooldown state lives in
//! `application::regime`, which owns the clock.

pub mod big4;
pub mod mode;

pub use big4::{Big4Result, Big4Signal, PerSymbolSignal, ReversalSide};
pub use mode::{Mode, ModeState, RangeClassification};
