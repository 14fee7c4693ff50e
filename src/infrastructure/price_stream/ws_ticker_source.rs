//! Combined-stream websocket ticker ingestion (spec §4.1), grounded on the
//! teacher's `BinanceWebSocketManager` reconnect-with-backoff loop.
//!
//! Reconnects with exponential backoff on any stream error and feeds every
//! trade print into a `PriceFeedGateway`. The gateway, not this module,
//! decides when a tick has gone stale.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::application::price_feed::gateway::PriceFeedGateway;

const MAX_BACKOFF_SECS: u64 = 60;
const PING_INTERVAL_SECS: u64 = 180;

/// "BTC/USDT" -> "BTCUSDT". Every symbol this market type trades is
/// USDT-margined (spec §1), so the exchange wire form is just the slash
/// removed.
fn denormalize(symbol: &str) -> String {
    symbol.replace('/', "")
}

/// "BTCUSDT" -> "BTC/USDT". Falls back to the raw wire symbol if it
/// doesn't end in USDT (it shouldn't, for this market type).
fn normalize(symbol: &str) -> String {
    match symbol.strip_suffix("USDT") {
        Some(base) => format!("{base}/USDT"),
        None => symbol.to_string(),
    }
}

/// Owns the reconnect loop; `spawn` hands the task to the tokio runtime and
/// returns immediately.
pub struct WsTickerSource {
    ws_base_url: String,
    symbols: Vec<String>,
    gateway: Arc<PriceFeedGateway>,
}

impl WsTickerSource {
    pub fn new(ws_base_url: String, symbols: Vec<String>, gateway: Arc<PriceFeedGateway>) -> Self {
        Self {
            ws_base_url,
            symbols,
            gateway,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        let mut backoff = 1u64;
        loop {
            match self.connect_and_stream().await {
                Ok(()) => {
                    info!("price stream closed gracefully, reconnecting");
                    tokio::time::sleep(StdDuration::from_secs(5)).await;
                    backoff = 1;
                }
                Err(e) => {
                    error!(error = %e, backoff_secs = backoff, "price stream error, reconnecting");
                    tokio::time::sleep(StdDuration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                }
            }
        }
    }

    async fn connect_and_stream(&self) -> anyhow::Result<()> {
        if self.symbols.is_empty() {
            tokio::time::sleep(StdDuration::from_secs(5)).await;
            return Ok(());
        }

        let streams: Vec<String> = self
            .symbols
            .iter()
            .map(|s| format!("{}@trade", denormalize(s).to_lowercase()))
            .collect();

        let url = format!(
            "{}/stream?streams={}",
            self.ws_base_url.trim_end_matches('/'),
            streams.join("/")
        );

        info!(url = %url, "connecting to price stream");
        let (ws_stream, _) = connect_async(&url).await?;
        info!("price stream connected");

        let (write, mut read) = ws_stream.split();
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Message>(100);

        let mut write = write;
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let ping_tx = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_secs(PING_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if ping_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.handle_message(&text) {
                        if !text.contains("\"result\":null") {
                            warn!(error = %e, "failed to parse price stream message");
                        }
                    }
                }
                Ok(Message::Ping(_)) => {
                    let _ = tx.send(Message::Pong(Vec::new().into())).await;
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "price stream closed by server");
                    break;
                }
                Err(e) => return Err(e.into()),
                _ => {}
            }
        }

        Ok(())
    }

    fn handle_message(&self, text: &str) -> anyhow::Result<()> {
        #[derive(Deserialize)]
        struct Envelope {
            stream: String,
            data: serde_json::Value,
        }
        #[derive(Deserialize)]
        struct TradePrint {
            #[serde(rename = "s")]
            symbol: String,
            #[serde(rename = "p")]
            price: String,
            #[serde(rename = "T")]
            trade_time_ms: i64,
        }

        let envelope: Envelope = serde_json::from_str(text)?;
        if !envelope.stream.ends_with("@trade") {
            return Ok(());
        }

        let trade: TradePrint = serde_json::from_value(envelope.data)?;
        let symbol = normalize(&trade.symbol);
        let price: Decimal = trade.price.parse()?;
        let as_of = Utc
            .timestamp_millis_opt(trade.trade_time_ms)
            .single()
            .unwrap_or_else(Utc::now);

        self.gateway.record_tick(&symbol, price, as_of);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denormalize_strips_slash() {
        assert_eq!(denormalize("BTC/USDT"), "BTCUSDT");
    }

    #[test]
    fn normalize_inserts_slash_before_usdt() {
        assert_eq!(normalize("ETHUSDT"), "ETH/USDT");
    }

    #[test]
    fn normalize_passes_through_unknown_suffix() {
        assert_eq!(normalize("WEIRDPAIR"), "WEIRDPAIR");
    }
}
