//! The eight-stage rejection chain applied after a side is chosen (spec
//! §4.6 steps 1-8). Each stage is a pure function over its inputs so the
//! decision brain can apply them in order and short-circuit on the first
//! rejection.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::errors::{EngineError, RiskReject};
use crate::domain::risk::{EmergencyBlocks, SignalBlacklistEntry, SignalQualityStats};
use crate::domain::signal::fingerprint;
use crate::domain::trading::Side;

pub const BASE_THRESHOLD: Decimal = Decimal::from_parts(35, 0, 0, false, 0);

/// Step 1: score must clear the quality-adjusted threshold.
pub fn threshold_gate(
    score: Decimal,
    fingerprint: &str,
    side: Side,
    quality: Option<&SignalQualityStats>,
) -> Result<(), EngineError> {
    let threshold = quality
        .map(|q| q.adjusted_threshold(BASE_THRESHOLD))
        .unwrap_or(BASE_THRESHOLD);
    if score < threshold {
        return Err(RiskReject::BelowThreshold {
            score,
            threshold,
            fingerprint: fingerprint.to_string(),
            side: side.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Step 2: drop components whose semantic opposes the chosen side, then
/// recompute the fingerprint from what survives. An empty result rejects.
pub fn direction_contradiction_filter(
    components: &[(&str, Side)],
    side: Side,
) -> Result<String, EngineError> {
    let retained: Vec<&str> = components
        .iter()
        .filter(|(_, component_side)| *component_side == side)
        .map(|(name, _)| *name)
        .collect();
    if retained.is_empty() {
        return Err(RiskReject::EmptyFingerprint {
            symbol: String::new(),
            side: side.to_string(),
        }
        .into());
    }
    Ok(fingerprint(&retained))
}

/// Step 3.
pub fn blacklist_filter(
    fingerprint: &str,
    side: Side,
    entries: &[SignalBlacklistEntry],
) -> Result<(), EngineError> {
    if entries.iter().any(|e| e.matches(fingerprint, side)) {
        return Err(RiskReject::Blacklisted {
            fingerprint: fingerprint.to_string(),
            side: side.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Step 4: reject LONG with `trend_1h_bear`, SHORT with `trend_1h_bull`
/// present among the *raw* (pre-filter) components; 1d neutrality is always
/// allowed since no 1d-trend component exists in this scheme.
pub fn timeframe_consistency_filter(
    symbol: &str,
    side: Side,
    raw_components: &[&str],
) -> Result<(), EngineError> {
    let contradicting = match side {
        Side::Long => "trend_1h_bear",
        Side::Short => "trend_1h_bull",
    };
    if raw_components.contains(&contradicting) {
        return Err(RiskReject::BelowThreshold {
            score: Decimal::ZERO,
            threshold: Decimal::ZERO,
            fingerprint: contradicting.to_string(),
            side: side.to_string(),
        }
        .into());
    }
    let _ = symbol;
    Ok(())
}

/// Step 5: SHORT into a position still near its recent high needs
/// corroborating evidence — declining volume and frequent upper shadows —
/// or it's rejected as shorting into strength.
pub fn position_high_validation(
    symbol: &str,
    side: Side,
    position_pct_of_range: f64,
    volume_declining: bool,
    upper_shadow_frequency: f64,
) -> Result<(), EngineError> {
    if side != Side::Short || position_pct_of_range < 0.70 {
        return Ok(());
    }
    if !volume_declining || upper_shadow_frequency < 0.30 {
        return Err(crate::domain::errors::RiskReject::EmptyFingerprint {
            symbol: symbol.to_string(),
            side: side.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Step 6: anti-FOMO. Contract preserved but gated behind
/// `anti_fomo_enabled` (Open Question 1) — callers pass `enabled = false`
/// to keep the check a no-op while matching the source's relaxed state.
pub fn anti_fomo_filter(
    symbol: &str,
    side: Side,
    position_pct_of_24h_range: f64,
    enabled: bool,
) -> Result<(), EngineError> {
    if !enabled {
        return Ok(());
    }
    let rejected = match side {
        Side::Long => position_pct_of_24h_range > 0.80,
        Side::Short => position_pct_of_24h_range < 0.20,
    };
    if rejected {
        return Err(RiskReject::AntiFomo {
            symbol: symbol.to_string(),
            side: side.to_string(),
            range_pct: Decimal::try_from(position_pct_of_24h_range * 100.0).unwrap_or_default(),
        }
        .into());
    }
    Ok(())
}

/// Step 7: reject if the same (symbol, side) was closed within 15 minutes.
pub fn cooldown_filter(
    symbol: &str,
    side: Side,
    last_closed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    const COOLDOWN: Duration = Duration::minutes(15);
    if let Some(closed_at) = last_closed_at {
        let elapsed = now - closed_at;
        if elapsed < COOLDOWN {
            return Err(RiskReject::Cooldown {
                symbol: symbol.to_string(),
                side: side.to_string(),
                remaining_secs: (COOLDOWN - elapsed).num_seconds().max(0),
            }
            .into());
        }
    }
    Ok(())
}

/// Step 8.
pub fn emergency_blocks_filter(
    side: Side,
    blocks: &EmergencyBlocks,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if blocks.blocks_side(side, now) {
        return Err(RiskReject::EmergencyBlock {
            reason: format!("{side} entries blocked by active emergency intervention"),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn threshold_gate_rejects_below_base() {
        let err = threshold_gate(dec!(30), "breakout_strong", Side::Long, None).unwrap_err();
        assert!(matches!(err, EngineError::RiskReject(_)));
    }

    #[test]
    fn direction_contradiction_strips_opposite_components() {
        let components = [("momentum_24h", Side::Long), ("trend_1h_bear", Side::Short)];
        let fp = direction_contradiction_filter(&components, Side::Long).unwrap();
        assert_eq!(fp, "momentum_24h");
    }

    #[test]
    fn direction_contradiction_rejects_empty_result() {
        let components = [("trend_1h_bear", Side::Short)];
        assert!(direction_contradiction_filter(&components, Side::Long).is_err());
    }

    #[test]
    fn timeframe_consistency_rejects_contradicting_trend() {
        assert!(timeframe_consistency_filter("BTC/USDT", Side::Long, &["trend_1h_bear"]).is_err());
        assert!(timeframe_consistency_filter("BTC/USDT", Side::Long, &["trend_1h_bull"]).is_ok());
    }

    #[test]
    fn anti_fomo_disabled_is_noop() {
        assert!(anti_fomo_filter("BTC/USDT", Side::Long, 0.95, false).is_ok());
    }

    #[test]
    fn anti_fomo_enabled_rejects_high_long() {
        assert!(anti_fomo_filter("BTC/USDT", Side::Long, 0.95, true).is_err());
    }

    #[test]
    fn cooldown_rejects_recent_close() {
        let now = Utc::now();
        assert!(cooldown_filter("BTC/USDT", Side::Long, Some(now - Duration::minutes(5)), now).is_err());
        assert!(cooldown_filter("BTC/USDT", Side::Long, Some(now - Duration::minutes(20)), now).is_ok());
    }

    #[test]
    fn position_high_validation_blocks_unconfirmed_short() {
        assert!(position_high_validation("BTC/USDT", Side::Short, 0.85, false, 0.1).is_err());
        assert!(position_high_validation("BTC/USDT", Side::Short, 0.85, true, 0.4).is_ok());
        assert!(position_high_validation("BTC/USDT", Side::Long, 0.85, false, 0.0).is_ok());
    }
}
