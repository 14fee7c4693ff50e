//! State Store Access Layer (spec §4.11): `sqlx`/Postgres implementations of
//! every `domain::repositories` trait, behind the transactional boundary
//! described there.

pub mod database;
pub mod repositories;

pub use database::Database;
