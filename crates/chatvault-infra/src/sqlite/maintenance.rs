//! SQLite maintenance repository: full reset and integrity checks.

use chatvault_core::event::EventBus;
use chatvault_core::repository::{IntegrityReport, MaintenanceRepository};
use chatvault_types::config::IntegrityMode;
use chatvault_types::error::RepositoryError;
use chatvault_types::event::StoreEvent;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, Row};
use tracing::{error, info, warn};

use super::coordinator::TxCoordinator;
use super::error::map_sqlx_error;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `MaintenanceRepository`.
#[derive(Clone)]
pub struct SqliteMaintenanceRepository {
    pool: DatabasePool,
    tx: TxCoordinator,
    mode: IntegrityMode,
    events: Option<EventBus>,
}

impl SqliteMaintenanceRepository {
    pub fn new(pool: DatabasePool, tx: TxCoordinator, mode: IntegrityMode) -> Self {
        Self {
            pool,
            tx,
            mode,
            events: None,
        }
    }

    /// Publish `StoreEvent::Cleared` after every successful clear.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }
}

/// Delete every row in one transaction on `conn`.
async fn delete_all(conn: &mut SqliteConnection, mode: IntegrityMode) -> Result<(), RepositoryError> {
    let mut tx = Connection::begin(conn).await.map_err(map_sqlx_error)?;
    if mode == IntegrityMode::Deferred {
        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }
    sqlx::query("DELETE FROM messages")
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
    sqlx::query("DELETE FROM chat_sessions")
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
    tx.commit().await.map_err(map_sqlx_error)
}

impl MaintenanceRepository for SqliteMaintenanceRepository {
    async fn clear_all_tables(&self) -> Result<(), RepositoryError> {
        let mode = self.mode;
        self.tx
            .on_writer("clear_all_tables", move |conn| {
                Box::pin(async move {
                    if mode == IntegrityMode::Disabled {
                        sqlx::query("PRAGMA foreign_keys = OFF")
                            .execute(&mut *conn)
                            .await
                            .map_err(map_sqlx_error)?;
                    }

                    let cleared = delete_all(&mut *conn, mode).await;

                    if mode == IntegrityMode::Disabled {
                        // Enforcement must come back on even when the delete failed.
                        if let Err(err) = sqlx::query("PRAGMA foreign_keys = ON")
                            .execute(&mut *conn)
                            .await
                        {
                            error!(%err, "failed to re-enable foreign keys");
                            return Err(map_sqlx_error(err));
                        }
                    }
                    cleared
                })
            })
            .await?;

        let reclaimed = self
            .tx
            .on_writer("reclaim_space", |conn| {
                Box::pin(async move {
                    sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                        .execute(&mut *conn)
                        .await
                        .map_err(map_sqlx_error)?;
                    sqlx::query("VACUUM")
                        .execute(&mut *conn)
                        .await
                        .map_err(map_sqlx_error)?;
                    Ok(())
                })
            })
            .await;
        if let Err(err) = reclaimed {
            warn!(%err, "space reclamation after clear failed");
        }

        info!(mode = ?self.mode, "cleared all tables");
        if let Some(events) = &self.events {
            events.publish(StoreEvent::Cleared);
        }
        Ok(())
    }

    async fn integrity_check(&self) -> Result<IntegrityReport, RepositoryError> {
        let mut problems: Vec<String> = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;
        problems.retain(|line| line != "ok");

        let rows = sqlx::query("PRAGMA foreign_key_check")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;
        for row in &rows {
            let table: String = row.try_get(0).map_err(map_sqlx_error)?;
            let rowid: Option<i64> = row.try_get(1).map_err(map_sqlx_error)?;
            let parent: String = row.try_get(2).map_err(map_sqlx_error)?;
            problems.push(match rowid {
                Some(rowid) => format!("{table} row {rowid} references a missing {parent} row"),
                None => format!("{table} references a missing {parent} row"),
            });
        }

        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&self.pool.writer)
            .await
            .map_err(map_sqlx_error)?;

        Ok(IntegrityReport {
            problems,
            foreign_keys_enabled: foreign_keys == 1,
        })
    }
}
