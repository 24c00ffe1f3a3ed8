//! Shared domain types for chatvault.
//!
//! This crate contains the types every other chatvault crate speaks:
//! chat sessions, messages, the repository error taxonomy, store
//! configuration, and the events the store publishes.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
