//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. Every write goes through the
//! `TxCoordinator` on the single writer connection.

pub mod coordinator;
pub mod error;
pub mod maintenance;
pub mod message;
pub mod pool;
pub mod schema;
pub mod session;
