//! Chat conversation bookkeeping on top of the repositories.

pub mod service;
pub mod title;

pub use service::{ChatError, ChatService};
