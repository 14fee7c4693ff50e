//! Trading domain entities: positions, orders, trades, and the account they
//! settle against. Mirrors the `futures_*` tables (see
//! `infrastructure::persistence::repositories`) but carries no persistence
//! concerns itself.

pub mod account;
pub mod order;
pub mod position;
pub mod side;
pub mod trade;

pub use account::Account;
pub use order::{Order, OrderKind};
pub use position::{Position, PositionStatus};
pub use side::Side;
pub use trade::Trade;
