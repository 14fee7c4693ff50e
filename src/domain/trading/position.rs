use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Side;

/// `futures_positions.status`. `Building` is a position whose margin is
/// still being accumulated by a time-sliced entry; it counts as "exists" for
/// the one-row-per-(symbol, side) uniqueness invariant but exit logic treats
/// it as not-yet-full-size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Building,
    Open,
    Closed,
}

/// One directional exposure on one symbol (`futures_positions`).
///
/// Never reopened once `status` reaches `Closed`; the exit optimizer is the
/// only writer that makes that transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub avg_entry_price: Decimal,
    pub leverage: u32,
    pub notional_value: Decimal,
    pub margin: Decimal,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    /// Signal fingerprint: sorted component names joined with `+`.
    pub entry_signal_type: String,
    pub entry_reason: String,
    pub entry_score: Decimal,
    pub signal_components: Vec<String>,
    pub max_hold_minutes: i64,
    pub timeout_at: DateTime<Utc>,
    pub status: PositionStatus,
    pub realized_pnl: Decimal,
    /// Append-only audit trail; never truncated, only appended to.
    pub notes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn is_active(&self) -> bool {
        matches!(self.status, PositionStatus::Building | PositionStatus::Open)
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
        self.updated_at = Utc::now();
    }

    /// Applies a partial close, decreasing quantity/margin proportionally.
    /// If the remaining margin would fall below `min_margin_floor`, the
    /// caller must upgrade to a full close instead of calling this (spec
    /// §3 Position invariants / §4.8 partial-close ladder).
    pub fn apply_partial_close(
        &mut self,
        close_fraction: Decimal,
        realized_pnl_slice: Decimal,
    ) -> Decimal {
        let remaining_fraction = Decimal::ONE - close_fraction;
        self.quantity *= remaining_fraction;
        self.margin *= remaining_fraction;
        self.realized_pnl += realized_pnl_slice;
        self.margin
    }

    pub fn close(&mut self, at: DateTime<Utc>, final_realized_pnl_slice: Decimal) {
        self.status = PositionStatus::Closed;
        self.quantity = Decimal::ZERO;
        self.margin = Decimal::ZERO;
        self.close_time = Some(at);
        self.realized_pnl += final_realized_pnl_slice;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Position {
        Position {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            symbol: "BTC/USDT".into(),
            side: Side::Long,
            quantity: dec!(1.0),
            entry_price: dec!(50000),
            avg_entry_price: dec!(50000),
            leverage: 5,
            notional_value: dec!(50000),
            margin: dec!(400),
            open_time: Utc::now(),
            close_time: None,
            stop_loss_price: dec!(49000),
            take_profit_price: dec!(52000),
            entry_signal_type: "breakout_strong".into(),
            entry_reason: "strong breakout".into(),
            entry_score: dec!(50),
            signal_components: vec!["breakout_strong".into()],
            max_hold_minutes: 120,
            timeout_at: Utc::now(),
            status: PositionStatus::Open,
            realized_pnl: Decimal::ZERO,
            notes: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn partial_close_upgrades_margin_and_quantity_proportionally() {
        let mut p = sample();
        p.apply_partial_close(dec!(0.98), dec!(5));
        assert_eq!(p.margin, dec!(8.00));
        assert_eq!(p.realized_pnl, dec!(5));
        assert!(p.is_active());
    }

    #[test]
    fn close_zeroes_quantity_and_margin() {
        let mut p = sample();
        let now = Utc::now();
        p.close(now, dec!(120));
        assert_eq!(p.quantity, Decimal::ZERO);
        assert_eq!(p.margin, Decimal::ZERO);
        assert_eq!(p.status, PositionStatus::Closed);
        assert!(!p.is_active());
    }
}
