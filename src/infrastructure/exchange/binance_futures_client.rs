//! USDT-margined futures execution (spec §4.7, §5 "every network call to the
//! exchange ... is a suspension point"). HMAC-SHA256 request signing is
//! grounded on the teacher's `BinanceExecutionService::sign_request`.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use crate::domain::errors::{EngineError, TransientInfra};
use crate::domain::ports::{ExchangeClient, ExchangeFill, ExchangeOrderRequest};
use crate::domain::trading::OrderKind;

type HmacSha256 = Hmac<Sha256>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BinanceFuturesClient {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl BinanceFuturesClient {
    pub fn new(api_key: String, api_secret: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("static TLS config is always valid");

        Self {
            client,
            api_key,
            api_secret,
            base_url,
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts a key of any size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn symbol_wire(symbol: &str) -> String {
        symbol.replace('/', "")
    }
}

fn network_err(detail: impl ToString) -> EngineError {
    TransientInfra::Network {
        detail: detail.to_string(),
    }
    .into()
}

#[derive(Debug, Deserialize)]
struct FuturesOrderResponse {
    #[serde(rename = "avgPrice")]
    avg_price: String,
    #[serde(rename = "executedQty")]
    executed_qty: String,
    #[serde(default)]
    commission: Option<String>,
    #[serde(rename = "updateTime")]
    update_time: i64,
}

#[async_trait]
impl ExchangeClient for BinanceFuturesClient {
    async fn place_order(&self, request: ExchangeOrderRequest) -> Result<ExchangeFill, EngineError> {
        let side = match request.side {
            OrderKind::Long | OrderKind::CloseShort => "BUY",
            OrderKind::Short | OrderKind::CloseLong => "SELL",
        };
        let position_side = match request.side {
            OrderKind::Long | OrderKind::CloseLong => "LONG",
            OrderKind::Short | OrderKind::CloseShort => "SHORT",
        };
        let reduce_only = matches!(request.side, OrderKind::CloseLong | OrderKind::CloseShort);

        let timestamp = chrono::Utc::now().timestamp_millis();
        let symbol = Self::symbol_wire(&request.symbol);

        let mut params = vec![
            ("symbol".to_string(), symbol),
            ("side".to_string(), side.to_string()),
            ("positionSide".to_string(), position_side.to_string()),
            ("type".to_string(), "MARKET".to_string()),
            ("quantity".to_string(), request.quantity.normalize().to_string()),
            ("timestamp".to_string(), timestamp.to_string()),
        ];
        if reduce_only {
            params.push(("reduceOnly".to_string(), "true".to_string()));
        }

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.sign(&query);
        let url = format!("{}/fapi/v1/order?{}&signature={}", self.base_url, query, signature);

        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(network_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, symbol = %request.symbol, body = %body, "futures order rejected by exchange");
            return Err(network_err(format!("order placement failed: {status} {body}")));
        }

        let parsed: FuturesOrderResponse = response.json().await.map_err(network_err)?;

        let avg_fill_price: Decimal = parsed.avg_price.parse().map_err(network_err)?;
        let executed_quantity: Decimal = parsed.executed_qty.parse().map_err(network_err)?;
        let fee: Decimal = parsed
            .commission
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Decimal::ZERO);
        let fill_time = chrono::DateTime::from_timestamp_millis(parsed.update_time)
            .unwrap_or_else(chrono::Utc::now);

        Ok(ExchangeFill {
            avg_fill_price,
            executed_quantity,
            fee,
            fee_rate: if executed_quantity.is_zero() || avg_fill_price.is_zero() {
                Decimal::ZERO
            } else {
                fee / (avg_fill_price * executed_quantity)
            },
            fill_time,
        })
    }
}
