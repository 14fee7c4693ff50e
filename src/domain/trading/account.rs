use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single USDT-margined futures account the core trades against
/// (`futures_trading_accounts`). Balance mutations happen only through the
/// state store access layer, in the same transaction as the position/order
/// that justifies them (spec §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub current_balance: Decimal,
    pub frozen_balance: Decimal,
    pub realized_pnl: Decimal,
    pub total_trades: i64,
    pub winning_trades: i64,
    pub losing_trades: i64,
    pub win_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn recompute_win_rate(&mut self) {
        self.win_rate = if self.total_trades > 0 {
            Decimal::from(self.winning_trades) / Decimal::from(self.total_trades.max(1)) * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
    }

    pub fn record_close(&mut self, realized_pnl: Decimal) {
        self.total_trades += 1;
        if realized_pnl >= Decimal::ZERO {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }
        self.realized_pnl += realized_pnl;
        self.recompute_win_rate();
        self.updated_at = Utc::now();
    }

    pub fn freeze_margin(&mut self, amount: Decimal) {
        self.current_balance -= amount;
        self.frozen_balance += amount;
        self.updated_at = Utc::now();
    }

    pub fn release_margin(&mut self, amount: Decimal, realized_pnl: Decimal) {
        self.frozen_balance -= amount;
        self.current_balance += amount + realized_pnl;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Account {
        Account {
            id: Uuid::new_v4(),
            current_balance: dec!(10000),
            frozen_balance: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn win_rate_is_percentage_of_total() {
        let mut a = sample();
        a.record_close(dec!(10));
        a.record_close(dec!(-5));
        a.record_close(dec!(3));
        assert_eq!(a.total_trades, 3);
        assert_eq!(a.winning_trades, 2);
        assert_eq!(a.losing_trades, 1);
        assert_eq!(a.win_rate, Decimal::from(200) / Decimal::from(3));
    }

    #[test]
    fn freeze_then_release_conserves_balance() {
        let mut a = sample();
        let starting = a.current_balance;
        a.freeze_margin(dec!(400));
        assert_eq!(a.current_balance, starting - dec!(400));
        assert_eq!(a.frozen_balance, dec!(400));
        a.release_margin(dec!(400), dec!(20));
        assert_eq!(a.frozen_balance, Decimal::ZERO);
        assert_eq!(a.current_balance, starting + dec!(20));
    }
}
