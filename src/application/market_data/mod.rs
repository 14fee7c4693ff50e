// Market data processing modules
pub mod kline_accessor;

pub use kline_accessor::KlineAccessor;
