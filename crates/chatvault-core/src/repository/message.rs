//! Message repository trait definition.

use chatvault_types::chat::Message;
use chatvault_types::error::RepositoryError;

/// Repository trait for chat message persistence.
pub trait MessageRepository: Send + Sync {
    /// Insert a message, or overwrite the message with the same id.
    ///
    /// Fails with `ConstraintViolation` when `message.session_id` does not
    /// reference an existing session.
    fn insert_message(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get the messages of a session in chronological order.
    fn list_messages(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Count the messages of a session.
    fn count_messages(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete messages older than `threshold` (epoch millis, exclusive)
    /// that belong to offline-only sessions. Sessions themselves are kept.
    ///
    /// Returns the number of messages deleted.
    fn prune_offline_messages(
        &self,
        threshold: i64,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
