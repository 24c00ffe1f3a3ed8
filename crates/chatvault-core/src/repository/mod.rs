//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (chatvault-infra) implements. Every mutating method is atomic: it either
//! commits all of its effects or none of them.

pub mod maintenance;
pub mod message;
pub mod session;

pub use maintenance::{IntegrityReport, MaintenanceRepository};
pub use message::MessageRepository;
pub use session::SessionRepository;
