//! Streaming price ingestion (spec §4.1): the one concrete `PriceFeed`
//! producer. The core never talks to this module directly, only to
//! `application::price_feed::gateway::PriceFeedGateway`.

pub mod ws_ticker_source;

pub use ws_ticker_source::WsTickerSource;
