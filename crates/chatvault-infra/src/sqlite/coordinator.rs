//! Write transaction coordinator.
//!
//! Every mutation runs through `TxCoordinator::run` on the single writer
//! connection: one transaction per call, committed on success and rolled
//! back on any error. The work runs on its own tokio task, so a caller that
//! drops its future never leaves a write half-applied. Transactions failing
//! with `ResourceBusy` are retried with a linear backoff.

use std::time::Duration;

use chatvault_types::error::RepositoryError;
use futures_util::future::BoxFuture;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Connection;
use tracing::{debug, warn};

use super::error::{map_sqlx_error, transaction_failure};

/// Default pause before the first busy retry. Later retries wait longer.
pub const DEFAULT_BUSY_BACKOFF: Duration = Duration::from_millis(50);

/// Serializes writes onto the writer pool.
#[derive(Clone)]
pub struct TxCoordinator {
    writer: SqlitePool,
    busy_retries: u32,
    backoff: Duration,
}

impl TxCoordinator {
    pub fn new(writer: SqlitePool, busy_retries: u32) -> Self {
        Self {
            writer,
            busy_retries,
            backoff: DEFAULT_BUSY_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn busy_retries(&self) -> u32 {
        self.busy_retries
    }

    /// Run `body` inside one write transaction.
    ///
    /// `body` may be called more than once when the transaction is retried,
    /// so it must not consume what it captures.
    pub async fn run<T, F>(&self, operation: &'static str, body: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: for<'c> FnMut(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, RepositoryError>>
            + Send
            + 'static,
    {
        self.detached(operation, true, body).await
    }

    /// Run `body` directly on the writer connection, outside any transaction.
    ///
    /// For work that has to happen around a transaction, such as connection
    /// pragmas or `VACUUM`. Retries and detachment behave as in [`run`](Self::run).
    pub async fn on_writer<T, F>(&self, operation: &'static str, body: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: for<'c> FnMut(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, RepositoryError>>
            + Send
            + 'static,
    {
        self.detached(operation, false, body).await
    }

    async fn detached<T, F>(
        &self,
        operation: &'static str,
        transactional: bool,
        mut body: F,
    ) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: for<'c> FnMut(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, RepositoryError>>
            + Send
            + 'static,
    {
        let writer = self.writer.clone();
        let retries = self.busy_retries;
        let backoff = self.backoff;

        let task = tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                let result = async {
                    let mut conn = writer.acquire().await.map_err(map_sqlx_error)?;
                    if transactional {
                        in_transaction(&mut *conn, &mut body).await
                    } else {
                        body(&mut *conn).await
                    }
                }
                .await;

                match result {
                    Err(err) if err.is_retryable() && attempt < retries => {
                        attempt += 1;
                        warn!(operation, attempt, %err, "writer busy, retrying");
                        tokio::time::sleep(backoff * attempt).await;
                    }
                    other => return other,
                }
            }
        });

        let result = task.await.map_err(|e| RepositoryError::TransactionFailure {
            operation: operation.to_string(),
            reason: e.to_string(),
        })?;

        match result {
            Ok(value) => {
                debug!(operation, "write completed");
                Ok(value)
            }
            Err(err) => Err(transaction_failure(operation, err)),
        }
    }
}

/// Begin a transaction on `conn`, run `body`, and commit or roll back.
async fn in_transaction<T, F>(
    conn: &mut SqliteConnection,
    body: &mut F,
) -> Result<T, RepositoryError>
where
    F: for<'t> FnMut(&'t mut SqliteConnection) -> BoxFuture<'t, Result<T, RepositoryError>>,
{
    let mut tx = Connection::begin(conn).await.map_err(map_sqlx_error)?;
    match body(&mut *tx).await {
        Ok(value) => {
            tx.commit().await.map_err(map_sqlx_error)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(%rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;
    use crate::sqlite::schema::SchemaManager;
    use chatvault_types::config::StoreConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::open(&db_path, &StoreConfig::default(), &SchemaManager::default())
            .await
            .unwrap()
    }

    async fn session_count(pool: &DatabasePool) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_sessions")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn commits_all_statements() {
        let pool = test_pool().await;
        let tx = TxCoordinator::new(pool.writer.clone(), 0);

        tx.run("seed", |conn| {
            Box::pin(async move {
                for id in ["a", "b"] {
                    sqlx::query(
                        "INSERT INTO chat_sessions (id, user_id, title, is_offline_only, last_updated) VALUES (?, 'u', 't', 0, 1)",
                    )
                    .bind(id)
                    .execute(&mut *conn)
                    .await
                    .map_err(map_sqlx_error)?;
                }
                Ok(())
            })
        })
        .await
        .unwrap();

        assert_eq!(session_count(&pool).await, 2);
    }

    #[tokio::test]
    async fn failure_rolls_back_earlier_statements() {
        let pool = test_pool().await;
        let tx = TxCoordinator::new(pool.writer.clone(), 0);

        let err = tx
            .run("half", |conn| {
                Box::pin(async move {
                    sqlx::query(
                        "INSERT INTO chat_sessions (id, user_id, title, is_offline_only, last_updated) VALUES ('a', 'u', 't', 0, 1)",
                    )
                    .execute(&mut *conn)
                    .await
                    .map_err(map_sqlx_error)?;
                    Err::<(), _>(RepositoryError::Query("boom".into()))
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::TransactionFailure { ref operation, .. } if operation == "half"
        ));
        assert_eq!(session_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn busy_is_retried_up_to_the_bound() {
        let pool = test_pool().await;
        let tx = TxCoordinator::new(pool.writer.clone(), 2).with_backoff(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));

        let seen = calls.clone();
        let err = tx
            .run("busy", move |_conn| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(RepositoryError::ResourceBusy("database is locked".into()))
                })
            })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn busy_then_success_commits() {
        let pool = test_pool().await;
        let tx = TxCoordinator::new(pool.writer.clone(), 3).with_backoff(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));

        let seen = calls.clone();
        let value = tx
            .run("flaky", move |_conn| {
                let seen = seen.clone();
                Box::pin(async move {
                    if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(RepositoryError::ResourceBusy("database is locked".into()))
                    } else {
                        Ok(42)
                    }
                })
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_abort_write() {
        let pool = test_pool().await;
        let tx = TxCoordinator::new(pool.writer.clone(), 0);

        let fut = tx.run("slow", |conn| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                sqlx::query(
                    "INSERT INTO chat_sessions (id, user_id, title, is_offline_only, last_updated) VALUES ('late', 'u', 't', 0, 1)",
                )
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
                Ok(())
            })
        });
        // Poll long enough to spawn the write, then abandon it.
        let _ = tokio::time::timeout(Duration::from_millis(5), fut).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(session_count(&pool).await, 1);
    }
}
