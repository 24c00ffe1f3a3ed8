//! Store configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.chatvault/` in
//! production) and deserializes it into [`StoreConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use chatvault_types::config::StoreConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CHATVAULT_DATA_DIR";

/// Load store configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`StoreConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_store_config(data_dir: &Path) -> StoreConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return StoreConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return StoreConfig::default();
        }
    };

    match toml::from_str::<StoreConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            StoreConfig::default()
        }
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CHATVAULT_DATA_DIR` environment variable
/// 2. `~/.chatvault`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatvault");
    }

    // Last resort: current directory
    PathBuf::from(".chatvault")
}

/// Full path of the database file for `config` inside `data_dir`.
///
/// An absolute `database_file` is used as is.
pub fn database_path(data_dir: &Path, config: &StoreConfig) -> PathBuf {
    data_dir.join(&config.database_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatvault_types::config::{IntegrityMode, UpgradePolicy};
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_store_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_store_config(tmp.path()).await;
        assert_eq!(config.database_file, "chatvault.db");
        assert_eq!(config.busy_retries, 3);
        assert_eq!(config.upgrade_policy, UpgradePolicy::DestructiveReset);
    }

    #[tokio::test]
    async fn load_store_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
database_file = "chats.db"
upgrade_policy = "fail"
integrity_mode = "disabled"

[retention]
offline_retention_days = 30
"#,
        )
        .await
        .unwrap();

        let config = load_store_config(tmp.path()).await;
        assert_eq!(config.database_file, "chats.db");
        assert_eq!(config.upgrade_policy, UpgradePolicy::Fail);
        assert_eq!(config.integrity_mode, IntegrityMode::Disabled);
        assert_eq!(config.retention.offline_retention_days, 30);
        assert_eq!(config.retention.prune_interval_secs, 86_400);
    }

    #[tokio::test]
    async fn load_store_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_store_config(tmp.path()).await;
        assert_eq!(config.database_file, "chatvault.db");
        assert_eq!(config.reader_connections, 8);
    }

    #[test]
    fn database_path_joins_data_dir() {
        let config = StoreConfig::default();
        let path = database_path(Path::new("/data"), &config);
        assert_eq!(path, PathBuf::from("/data/chatvault.db"));
    }
}
