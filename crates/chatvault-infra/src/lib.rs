//! Infrastructure layer for chatvault.
//!
//! Contains the SQLite implementations of the repository traits defined in
//! `chatvault-core`, the schema manager and write coordinator they rely on,
//! the `ChatStore` handle tying them together, and the configuration loader.

pub mod config;
pub mod sqlite;
pub mod store;

pub use store::ChatStore;
