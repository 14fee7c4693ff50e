//! Error taxonomy (spec §7). Kinds, not exception types: each variant family
//! maps to one propagation policy, enforced by callers rather than by the
//! type system alone.
//!
//! - `TransientInfra` / `StaleData` abort the current action and are retried
//!   on the next scheduler tick; they are logged at WARN, never ERROR.
//! - `ContractViolation` and `RiskReject` are rejections, not bugs; the
//!   former is an ERROR (a caller passed something it shouldn't have), the
//!   latter is INFO/WARN (the system is working as designed).
//! - `Conflict` becomes a no-op once observed.
//! - `Invariant` triggers supervisor reconciliation.
//! - `Fatal` exits the process; see `src/main.rs`.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient infrastructure failure: {0}")]
    TransientInfra(#[from] TransientInfra),

    #[error("stale data: {0}")]
    StaleData(#[from] StaleData),

    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),

    #[error("risk rejected: {0}")]
    RiskReject(#[from] RiskReject),

    #[error("conflict, treated as no-op: {0}")]
    Conflict(#[from] Conflict),

    #[error("invariant violation, supervisor will reconcile: {0}")]
    Invariant(#[from] Invariant),

    #[error("fatal: {0}")]
    Fatal(#[from] Fatal),
}

impl EngineError {
    /// True for kinds whose caller should simply abort the current action
    /// and let the next scheduler tick retry, without surfacing an error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::TransientInfra(_) | EngineError::StaleData(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_))
    }
}

#[derive(Debug, Error)]
pub enum TransientInfra {
    #[error("database timeout after {duration_ms}ms: {detail}")]
    DbTimeout { duration_ms: u64, detail: String },

    #[error("network error: {detail}")]
    Network { detail: String },

    #[error("streaming source disconnected: {detail}")]
    StreamDisconnected { detail: String },
}

#[derive(Debug, Error)]
pub enum StaleData {
    #[error("price for {symbol} is stale (age {age_secs}s > {max_age_secs}s)")]
    StalePrice {
        symbol: String,
        age_secs: i64,
        max_age_secs: i64,
    },

    #[error("insufficient k-line history for {symbol} {timeframe}: have {have}, need {need}")]
    InsufficientKlines {
        symbol: String,
        timeframe: String,
        have: usize,
        need: usize,
    },
}

#[derive(Debug, Error)]
pub enum ContractViolation {
    #[error("unsupported symbol suffix for {symbol}: only /USDT is tradeable in this market type")]
    UnsupportedSymbolSuffix { symbol: String },

    #[error("negative or zero quantity: {quantity}")]
    NonPositiveQuantity { quantity: Decimal },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

#[derive(Debug, Error)]
pub enum RiskReject {
    #[error("emergency block active: {reason}")]
    EmergencyBlock { reason: String },

    #[error("cooldown active for {symbol} {side}: {remaining_secs}s remaining")]
    Cooldown {
        symbol: String,
        side: String,
        remaining_secs: i64,
    },

    #[error("signal blacklisted: {fingerprint} {side}")]
    Blacklisted { fingerprint: String, side: String },

    #[error("direction contradiction: fingerprint empty after filtering for {symbol} {side}")]
    EmptyFingerprint { symbol: String, side: String },

    #[error("score {score} below quality-adjusted threshold {threshold} for {fingerprint} {side}")]
    BelowThreshold {
        score: Decimal,
        threshold: Decimal,
        fingerprint: String,
        side: String,
    },

    #[error("anti-fomo rejection: {symbol} {side} at {range_pct}% of 24h range")]
    AntiFomo {
        symbol: String,
        side: String,
        range_pct: Decimal,
    },

    #[error("timeframe contradiction: {symbol} {side} against {component}")]
    TimeframeContradiction {
        symbol: String,
        side: String,
        component: &'static str,
    },

    #[error("position-high validation failed for SHORT {symbol}: {reason}")]
    PositionHighUnconfirmed { symbol: String, reason: String },
}

#[derive(Debug, Error)]
pub enum Conflict {
    #[error("position {position_id} already {status}, treating as no-op")]
    AlreadyClosed {
        position_id: String,
        status: String,
    },
}

#[derive(Debug, Error)]
pub enum Invariant {
    #[error("monitor set diverges from non-closed position rows: {detail}")]
    MonitorSetMismatch { detail: String },

    #[error("position {position_id} overdue past timeout_at without action")]
    OverdueTimeout { position_id: String },
}

#[derive(Debug, Error)]
pub enum Fatal {
    #[error("database unreachable: {detail}")]
    DatabaseUnreachable { detail: String },

    #[error("required table missing: {table}")]
    SchemaMissing { table: String },

    #[error("authentication failed at startup: {detail}")]
    AuthFailure { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_stale_are_retryable() {
        let e: EngineError = TransientInfra::Network {
            detail: "reset".into(),
        }
        .into();
        assert!(e.is_retryable());

        let e: EngineError = StaleData::StalePrice {
            symbol: "BTC/USDT".into(),
            age_secs: 700,
            max_age_secs: 600,
        }
        .into();
        assert!(e.is_retryable());
    }

    #[test]
    fn fatal_is_fatal() {
        let e: EngineError = Fatal::DatabaseUnreachable {
            detail: "connect refused".into(),
        }
        .into();
        assert!(e.is_fatal());
        assert!(!e.is_retryable());
    }

    #[test]
    fn risk_reject_formats_cooldown() {
        let e = RiskReject::Cooldown {
            symbol: "SOL/USDT".into(),
            side: "LONG".into(),
            remaining_secs: 300,
        };
        assert!(e.to_string().contains("SOL/USDT"));
    }
}
