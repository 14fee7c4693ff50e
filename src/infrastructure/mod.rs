//! Concrete implementations of the `domain::ports`/`domain::repositories`
//! boundaries: the Postgres state store, the websocket price stream, the
//! exchange REST client, and push-based observability.

pub mod exchange;
pub mod observability;
pub mod persistence;
pub mod price_stream;
