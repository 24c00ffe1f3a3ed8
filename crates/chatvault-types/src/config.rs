//! Store configuration types.
//!
//! `StoreConfig` represents the `config.toml` in the chatvault data
//! directory. Every field has a default so an empty or missing file yields
//! a working configuration.

use serde::{Deserialize, Serialize};

/// What to do when the on-disk schema version has no migration path to the
/// current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradePolicy {
    /// Drop every table and recreate the schema. All stored chats are lost.
    #[default]
    DestructiveReset,
    /// Refuse to open the store.
    Fail,
}

/// How foreign keys are handled while all tables are being cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityMode {
    /// Keep enforcement on and defer checks to commit.
    #[default]
    Deferred,
    /// Switch enforcement off for the duration of the clear.
    Disabled,
}

/// Top-level configuration for a chatvault store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file name, relative to the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Size of the read-only connection pool.
    #[serde(default = "default_reader_connections")]
    pub reader_connections: u32,

    /// SQLite busy timeout applied to every connection.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Retries of a write transaction that failed with `ResourceBusy`.
    #[serde(default = "default_busy_retries")]
    pub busy_retries: u32,

    #[serde(default)]
    pub upgrade_policy: UpgradePolicy,

    #[serde(default)]
    pub integrity_mode: IntegrityMode,

    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Retention settings for offline-only sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Messages of offline-only sessions older than this are pruned.
    #[serde(default = "default_offline_retention_days")]
    pub offline_retention_days: u32,

    /// Seconds between two runs of the background prune task.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_database_file() -> String {
    "chatvault.db".to_string()
}

fn default_reader_connections() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_busy_retries() -> u32 {
    3
}

fn default_offline_retention_days() -> u32 {
    90
}

fn default_prune_interval_secs() -> u64 {
    24 * 60 * 60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            reader_connections: default_reader_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            busy_retries: default_busy_retries(),
            upgrade_policy: UpgradePolicy::default(),
            integrity_mode: IntegrityMode::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            offline_retention_days: default_offline_retention_days(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}
