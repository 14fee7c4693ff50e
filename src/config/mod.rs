//! Configuration: a YAML file for the universe of symbols, exchange
//! credentials, batch-entry/smart-exit flags, and the optimizer schedule;
//! database connection parameters and Big4 cache overrides come from the
//! environment (spec §6).

mod database;

pub use database::DatabaseConfig;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub ws_url: String,
}

/// Identifies the single trading account this process drives and the
/// balance it is seeded with the first time it runs against an empty
/// database (spec §4.11 State Store Access Layer has no "create account"
/// operation — seeding is a bootstrap concern, not a domain one).
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub id: Uuid,
    pub initial_balance_usd: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerSchedule {
    #[serde(default = "default_optimizer_hour")]
    pub hour_utc: u32,
}

fn default_optimizer_hour() -> u32 {
    2
}

impl Default for OptimizerSchedule {
    fn default() -> Self {
        Self {
            hour_utc: default_optimizer_hour(),
        }
    }
}

/// The on-disk YAML schema. Kept separate from `Config` so env-sourced
/// fields (database, Big4 overrides) never need a placeholder in the file.
#[derive(Debug, Clone, Deserialize)]
struct YamlConfig {
    symbols: Vec<String>,
    big4_symbols: [String; 4],
    exchange: ExchangeCredentials,
    account: AccountConfig,
    #[serde(default = "default_true")]
    batch_entry_enabled: bool,
    #[serde(default)]
    smart_exit_enabled: bool,
    #[serde(default)]
    optimizer_schedule: OptimizerSchedule,
    #[serde(default = "default_scan_interval")]
    main_scan_interval_secs: u64,
    #[serde(default = "default_monitor_interval")]
    monitor_interval_secs: u64,
    #[serde(default)]
    anti_fomo_enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_scan_interval() -> u64 {
    300
}

fn default_monitor_interval() -> u64 {
    5
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    pub big4_symbols: [String; 4],
    pub exchange: ExchangeCredentials,
    pub account: AccountConfig,
    pub batch_entry_enabled: bool,
    pub smart_exit_enabled: bool,
    pub optimizer_schedule: OptimizerSchedule,
    pub main_scan_interval_secs: u64,
    pub monitor_interval_secs: u64,
    pub anti_fomo_enabled: bool,
    pub database: DatabaseConfig,
    /// Overrides the Big4 detector's cache TTL (default 60 minutes, spec
    /// §4.4), read from `BIG4_CACHE_TTL_SECS` if set.
    pub big4_cache_ttl_override_secs: Option<u64>,
}

impl Config {
    pub fn load(yaml_path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(yaml_path.as_ref()).with_context(|| {
            format!("reading config file {}", yaml_path.as_ref().display())
        })?;
        let yaml: YamlConfig =
            serde_yaml::from_str(&raw).context("parsing YAML configuration")?;

        let database = DatabaseConfig::from_env().context("loading database config from env")?;
        let big4_cache_ttl_override_secs = std::env::var("BIG4_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        Ok(Self {
            symbols: yaml.symbols,
            big4_symbols: yaml.big4_symbols,
            exchange: yaml.exchange,
            account: yaml.account,
            batch_entry_enabled: yaml.batch_entry_enabled,
            smart_exit_enabled: yaml.smart_exit_enabled,
            optimizer_schedule: yaml.optimizer_schedule,
            main_scan_interval_secs: yaml.main_scan_interval_secs,
            monitor_interval_secs: yaml.monitor_interval_secs,
            anti_fomo_enabled: yaml.anti_fomo_enabled,
            database,
            big4_cache_ttl_override_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml() {
        let yaml = r#"
symbols: ["BTC/USDT", "ENA/USDT"]
big4_symbols: ["BTC/USDT", "ETH/USDT", "BNB/USDT", "SOL/USDT"]
exchange:
  api_key: "key"
  api_secret: "secret"
  base_url: "https://fapi.example.com"
  ws_url: "wss://fstream.example.com"
account:
  id: "00000000-0000-0000-0000-000000000001"
  initial_balance_usd: "10000"
"#;
        let parsed: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.symbols.len(), 2);
        assert_eq!(parsed.account.initial_balance_usd, rust_decimal_macros::dec!(10000));
        assert!(parsed.batch_entry_enabled);
        assert!(!parsed.smart_exit_enabled);
        assert_eq!(parsed.optimizer_schedule.hour_utc, 2);
        assert_eq!(parsed.main_scan_interval_secs, 300);
    }
}
