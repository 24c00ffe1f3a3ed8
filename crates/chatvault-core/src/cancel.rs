//! Caller-driven cancellation of read operations.
//!
//! Reads run on the reader pool and hold no write state, so abandoning one
//! midway cannot corrupt anything. Writes are not wrapped: the storage layer
//! runs them to completion even when the caller goes away.

use std::future::Future;

use chatvault_types::error::RepositoryError;
use tokio_util::sync::CancellationToken;

/// Run `read` until it completes or `token` is cancelled.
///
/// Returns `RepositoryError::Cancelled` if the token fires first. A token
/// that is already cancelled short-circuits without polling `read`.
pub async fn with_cancellation<T, F>(token: &CancellationToken, read: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(RepositoryError::Cancelled),
        result = read => result,
    }
}
