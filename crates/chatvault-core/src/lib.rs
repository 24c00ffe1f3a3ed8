//! Business logic and repository trait definitions for chatvault.
//!
//! This crate defines the "ports" (repository traits) that the
//! infrastructure layer implements. It depends only on `chatvault-types`
//! -- never on `chatvault-infra` or any database crate.

pub mod cancel;
pub mod chat;
pub mod event;
pub mod repository;
pub mod retention;
