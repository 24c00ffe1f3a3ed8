//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. This module provides a `DatabasePool`
//! with a multi-connection reader pool for concurrent reads and a single-connection
//! writer pool for serialized writes. Both use WAL journal mode and enforce foreign keys.

use std::path::Path;
use std::time::Duration;

use chatvault_types::config::StoreConfig;
use chatvault_types::error::RepositoryError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::error::map_sqlx_error;
use super::schema::SchemaManager;

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection, read-only pool for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open the database file at `path` with split reader/writer connections.
    ///
    /// The schema is brought up to date on the writer before the reader pool
    /// is opened, so no read can observe a half-built schema.
    pub async fn open(
        path: &Path,
        config: &StoreConfig,
        schema: &SchemaManager,
    ) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RepositoryError::Connection(format!("{}: {e}", parent.display())))?;
        }

        let base_opts = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(write_opts)
            .await
            .map_err(map_sqlx_error)?;

        // Bring the schema up to date on the writer before opening the reader pool
        if let Err(err) = schema.ensure(&writer).await {
            writer.close().await;
            return Err(err);
        }

        let reader = SqlitePoolOptions::new()
            .max_connections(config.reader_connections.max(1))
            .connect_with(read_opts)
            .await
            .map_err(map_sqlx_error)?;

        debug!(path = %path.display(), "opened database pools");
        Ok(Self { reader, writer })
    }

    /// Close both pools, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.reader.close().await;
        self.writer.close().await;
    }
}
