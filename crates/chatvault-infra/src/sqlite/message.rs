//! SQLite message repository implementation.
//!
//! Implements `MessageRepository` from `chatvault-core`, including the
//! retention prune of offline-only sessions.

use chatvault_core::repository::MessageRepository;
use chatvault_types::chat::{Message, MessageRole};
use chatvault_types::error::RepositoryError;
use sqlx::Row;
use tracing::debug;

use super::coordinator::TxCoordinator;
use super::error::map_sqlx_error;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageRepository`.
#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: DatabasePool,
    tx: TxCoordinator,
}

impl SqliteMessageRepository {
    pub fn new(pool: DatabasePool, tx: TxCoordinator) -> Self {
        Self { pool, tx }
    }
}

/// Internal row type for mapping SQLite rows to domain Message.
struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    timestamp: i64,
    image_path: Option<String>,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            timestamp: row.try_get("timestamp")?,
            image_path: row.try_get("image_path")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(RepositoryError::Query)?;

        Ok(Message {
            id: self.id,
            session_id: self.session_id,
            role,
            content: self.content,
            timestamp: self.timestamp,
            image_path: self.image_path,
        })
    }
}

impl MessageRepository for SqliteMessageRepository {
    async fn insert_message(&self, message: &Message) -> Result<(), RepositoryError> {
        let owned = message.clone();
        self.tx
            .run("insert_message", move |conn| {
                let message = owned.clone();
                Box::pin(async move {
                    sqlx::query(
                        r#"INSERT INTO messages (id, session_id, role, content, timestamp, image_path)
                           VALUES (?, ?, ?, ?, ?, ?)
                           ON CONFLICT(id) DO UPDATE SET
                               session_id = excluded.session_id,
                               role = excluded.role,
                               content = excluded.content,
                               timestamp = excluded.timestamp,
                               image_path = excluded.image_path"#,
                    )
                    .bind(&message.id)
                    .bind(&message.session_id)
                    .bind(message.role.to_string())
                    .bind(&message.content)
                    .bind(message.timestamp)
                    .bind(&message.image_path)
                    .execute(&mut *conn)
                    .await
                    .map_err(map_sqlx_error)?;
                    Ok(())
                })
            })
            .await?;
        debug!(message_id = %message.id, session_id = %message.session_id, "upserted message");
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE session_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row = MessageRow::from_row(row).map_err(map_sqlx_error)?;
            messages.push(msg_row.into_message()?);
        }

        Ok(messages)
    }

    async fn count_messages(&self, session_id: &str) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM messages WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let count: i64 = row.try_get("cnt").map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn prune_offline_messages(&self, threshold: i64) -> Result<u64, RepositoryError> {
        self.tx
            .run("prune_offline_messages", move |conn| {
                Box::pin(async move {
                    let result = sqlx::query(
                        r#"DELETE FROM messages
                           WHERE timestamp < ?
                             AND session_id IN (SELECT id FROM chat_sessions WHERE is_offline_only = 1)"#,
                    )
                    .bind(threshold)
                    .execute(&mut *conn)
                    .await
                    .map_err(map_sqlx_error)?;
                    Ok(result.rows_affected())
                })
            })
            .await
    }
}
