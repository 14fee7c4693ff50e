pub mod candle;
pub mod indicators;

pub use candle::{Candle, Timeframe};
