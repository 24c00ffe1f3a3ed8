//! SQLite session repository implementation.
//!
//! Implements `SessionRepository` from `chatvault-core`. Reads go to the
//! reader pool; writes go through the `TxCoordinator`.

use chatvault_core::repository::SessionRepository;
use chatvault_types::chat::ChatSession;
use chatvault_types::error::RepositoryError;
use sqlx::Row;
use tracing::debug;

use super::coordinator::TxCoordinator;
use super::error::map_sqlx_error;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionRepository`.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: DatabasePool,
    tx: TxCoordinator,
}

impl SqliteSessionRepository {
    pub fn new(pool: DatabasePool, tx: TxCoordinator) -> Self {
        Self { pool, tx }
    }
}

/// Internal row type for mapping SQLite rows to domain ChatSession.
struct SessionRow {
    id: String,
    user_id: String,
    title: String,
    is_offline_only: bool,
    last_updated: i64,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            is_offline_only: row.try_get("is_offline_only")?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    fn into_session(self) -> ChatSession {
        ChatSession {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            is_offline_only: self.is_offline_only,
            last_updated: self.last_updated,
        }
    }
}

impl SessionRepository for SqliteSessionRepository {
    async fn insert_session(&self, session: &ChatSession) -> Result<(), RepositoryError> {
        let owned = session.clone();
        self.tx
            .run("insert_session", move |conn| {
                let session = owned.clone();
                Box::pin(async move {
                    sqlx::query(
                        r#"INSERT INTO chat_sessions (id, user_id, title, is_offline_only, last_updated)
                           VALUES (?, ?, ?, ?, ?)
                           ON CONFLICT(id) DO UPDATE SET
                               user_id = excluded.user_id,
                               title = excluded.title,
                               is_offline_only = excluded.is_offline_only,
                               last_updated = excluded.last_updated"#,
                    )
                    .bind(&session.id)
                    .bind(&session.user_id)
                    .bind(&session.title)
                    .bind(session.is_offline_only)
                    .bind(session.last_updated)
                    .execute(&mut *conn)
                    .await
                    .map_err(map_sqlx_error)?;
                    Ok(())
                })
            })
            .await?;
        debug!(session_id = %session.id, "upserted session");
        Ok(())
    }

    async fn update_session(&self, session: &ChatSession) -> Result<u64, RepositoryError> {
        let session = session.clone();
        self.tx
            .run("update_session", move |conn| {
                let session = session.clone();
                Box::pin(async move {
                    let result = sqlx::query(
                        r#"UPDATE chat_sessions
                           SET user_id = ?, title = ?, is_offline_only = ?, last_updated = ?
                           WHERE id = ?"#,
                    )
                    .bind(&session.user_id)
                    .bind(&session.title)
                    .bind(session.is_offline_only)
                    .bind(session.last_updated)
                    .bind(&session.id)
                    .execute(&mut *conn)
                    .await
                    .map_err(map_sqlx_error)?;
                    Ok(result.rows_affected())
                })
            })
            .await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let session_row = SessionRow::from_row(&row).map_err(map_sqlx_error)?;
                Ok(Some(session_row.into_session()))
            }
            None => Ok(None),
        }
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_sessions WHERE user_id = ? ORDER BY last_updated DESC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = SessionRow::from_row(row).map_err(map_sqlx_error)?;
            sessions.push(session_row.into_session());
        }

        Ok(sessions)
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let user_id = user_id.to_string();
        let deleted = self
            .tx
            .run("delete_sessions_for_user", move |conn| {
                let user_id = user_id.clone();
                Box::pin(async move {
                    // Messages follow through ON DELETE CASCADE.
                    let result = sqlx::query("DELETE FROM chat_sessions WHERE user_id = ?")
                        .bind(&user_id)
                        .execute(&mut *conn)
                        .await
                        .map_err(map_sqlx_error)?;
                    Ok(result.rows_affected())
                })
            })
            .await?;
        debug!(deleted, "deleted sessions of user");
        Ok(deleted)
    }
}
