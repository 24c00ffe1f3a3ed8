//! Application state: the opened chat store and where it lives.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chatvault_core::event::EventBus;
use chatvault_infra::ChatStore;
use chatvault_infra::config::{database_path, load_store_config, resolve_data_dir};

/// State shared by every command.
pub struct AppState {
    pub store: ChatStore,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load configuration from the data directory and open the store.
    ///
    /// `db_override` replaces the configured database file.
    pub async fn init(db_override: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_store_config(&data_dir).await;
        let path = match db_override {
            Some(path) => path.to_path_buf(),
            None => database_path(&data_dir, &config),
        };

        let store = ChatStore::open(&path, config, EventBus::default())
            .await
            .with_context(|| format!("failed to open chat store at {}", path.display()))?;

        Ok(Self { store, data_dir })
    }
}
