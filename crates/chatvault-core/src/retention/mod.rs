//! Retention policy for offline-only sessions.
//!
//! Offline-only sessions never leave the device, so their history is kept
//! only for a bounded window. Online sessions are never pruned here.

pub mod task;

pub use task::{Pruner, spawn_prune_task};

use chatvault_types::config::RetentionConfig;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// How long offline-only messages are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub offline_retention_days: u32,
}

impl RetentionPolicy {
    pub fn new(offline_retention_days: u32) -> Self {
        Self {
            offline_retention_days,
        }
    }

    pub fn from_config(config: &RetentionConfig) -> Self {
        Self::new(config.offline_retention_days)
    }

    /// Prune threshold for a run at `now` (epoch millis).
    ///
    /// Messages with a timestamp strictly below the threshold are pruned.
    pub fn threshold(&self, now: i64) -> i64 {
        now.saturating_sub(i64::from(self.offline_retention_days) * MILLIS_PER_DAY)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&RetentionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_keeps_ninety_days() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.offline_retention_days, 90);
        let now = 100 * MILLIS_PER_DAY;
        assert_eq!(policy.threshold(now), 10 * MILLIS_PER_DAY);
    }

    #[test]
    fn test_zero_days_prunes_everything_before_now() {
        let policy = RetentionPolicy::new(0);
        assert_eq!(policy.threshold(1_234), 1_234);
    }

    #[test]
    fn test_threshold_saturates() {
        let policy = RetentionPolicy::new(u32::MAX);
        assert_eq!(policy.threshold(i64::MIN + 1), i64::MIN);
    }
}
