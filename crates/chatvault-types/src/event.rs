//! Events published by the store to interested listeners.

use serde::{Deserialize, Serialize};

/// Notable store-level events.
///
/// Published on the core `EventBus`. A `DestructiveReset` means every
/// stored session and message was discarded during open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The schema was dropped and recreated because no migration existed.
    DestructiveReset {
        /// Version found on disk (`None` when no metadata record existed).
        from_version: Option<i64>,
        to_version: i64,
    },

    /// A migration chain was applied.
    Migrated { from_version: i64, to_version: i64 },

    /// Offline messages older than `threshold` were pruned.
    Pruned { threshold: i64, deleted: u64 },

    /// Every table was cleared.
    Cleared,
}
