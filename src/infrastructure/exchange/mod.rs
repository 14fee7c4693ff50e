//! Order execution boundary (spec §4.7, §5). Implementations of
//! `domain::ports::ExchangeClient`; the core never imports a concrete type
//! from this module outside of wiring in `application::bootstrap`.

pub mod binance_futures_client;
pub mod mock_exchange_client;

pub use binance_futures_client::BinanceFuturesClient;
pub use mock_exchange_client::MockExchangeClient;
