//! Composition root helpers. `persistence` wires the Postgres repositories;
//! the task graph itself (scanner, monitors, price-stream reader, optimizer
//! schedule) is assembled in `application::system`.

pub mod persistence;

pub use persistence::{PersistenceBootstrap, PersistenceHandle};
