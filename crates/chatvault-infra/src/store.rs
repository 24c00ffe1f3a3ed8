//! `ChatStore`: the explicitly constructed handle to one chat database.
//!
//! Opening a store connects the pools, brings the schema up to date, and
//! wires the repositories to a shared write coordinator and event bus.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chatvault_core::chat::ChatService;
use chatvault_core::event::EventBus;
use chatvault_core::retention::{Pruner, RetentionPolicy, spawn_prune_task};
use chatvault_types::config::StoreConfig;
use chatvault_types::error::RepositoryError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::sqlite::coordinator::TxCoordinator;
use crate::sqlite::maintenance::SqliteMaintenanceRepository;
use crate::sqlite::message::SqliteMessageRepository;
use crate::sqlite::pool::DatabasePool;
use crate::sqlite::schema::SchemaManager;
use crate::sqlite::session::SqliteSessionRepository;

/// Chat service over the SQLite repositories.
pub type SqliteChatService = ChatService<SqliteSessionRepository, SqliteMessageRepository>;

/// Handle to an open chat database.
pub struct ChatStore {
    path: PathBuf,
    config: StoreConfig,
    pool: DatabasePool,
    schema: SchemaManager,
    events: EventBus,
    sessions: SqliteSessionRepository,
    messages: Arc<SqliteMessageRepository>,
    maintenance: SqliteMaintenanceRepository,
}

impl ChatStore {
    /// Open (or create) the store at `path`.
    ///
    /// Fails with `SchemaMismatch` when the file holds an incompatible schema
    /// that the configured upgrade policy does not allow replacing.
    pub async fn open(
        path: impl AsRef<Path>,
        config: StoreConfig,
        events: EventBus,
    ) -> Result<Self, RepositoryError> {
        let schema = SchemaManager::new(config.upgrade_policy).with_events(events.clone());
        Self::open_with_schema(path, config, events, schema).await
    }

    /// Open the store with a custom `SchemaManager`, e.g. one carrying
    /// registered migrations.
    pub async fn open_with_schema(
        path: impl AsRef<Path>,
        config: StoreConfig,
        events: EventBus,
        schema: SchemaManager,
    ) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        let pool = DatabasePool::open(&path, &config, &schema).await?;
        let tx = TxCoordinator::new(pool.writer.clone(), config.busy_retries);

        let sessions = SqliteSessionRepository::new(pool.clone(), tx.clone());
        let messages = Arc::new(SqliteMessageRepository::new(pool.clone(), tx.clone()));
        let maintenance = SqliteMaintenanceRepository::new(pool.clone(), tx, config.integrity_mode)
            .with_events(events.clone());

        info!(path = %path.display(), "chat store opened");
        Ok(Self {
            path,
            config,
            pool,
            schema,
            events,
            sessions,
            messages,
            maintenance,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn sessions(&self) -> &SqliteSessionRepository {
        &self.sessions
    }

    pub fn messages(&self) -> &SqliteMessageRepository {
        &self.messages
    }

    pub fn maintenance(&self) -> &SqliteMaintenanceRepository {
        &self.maintenance
    }

    /// Chat service sharing this store's connections.
    pub fn chat_service(&self) -> SqliteChatService {
        ChatService::new(self.sessions.clone(), self.messages.as_ref().clone())
    }

    /// Validate the live schema against the declared one.
    pub async fn validate_schema(&self) -> Result<(), RepositoryError> {
        self.schema.validate(&self.pool.reader).await
    }

    /// Pruner applying `policy` to this store's messages.
    pub fn pruner(&self, policy: RetentionPolicy) -> Pruner<SqliteMessageRepository> {
        Pruner::new(self.messages.clone(), policy).with_events(self.events.clone())
    }

    /// Spawn the background prune task configured by `retention`.
    ///
    /// The first run happens immediately. The task stops when `cancel` fires.
    pub fn spawn_pruner(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let retention = &self.config.retention;
        let pruner = Arc::new(self.pruner(RetentionPolicy::from_config(retention)));
        let every = Duration::from_secs(retention.prune_interval_secs.max(1));
        spawn_prune_task(pruner, every, cancel)
    }

    /// Close the underlying pools.
    pub async fn close(&self) {
        self.pool.close().await;
        info!(path = %self.path.display(), "chat store closed");
    }
}
