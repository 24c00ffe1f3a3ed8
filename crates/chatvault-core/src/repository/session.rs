//! Session repository trait definition.

use chatvault_types::chat::ChatSession;
use chatvault_types::error::RepositoryError;

/// Repository trait for chat session persistence.
///
/// Implementations live in chatvault-infra (e.g., `SqliteSessionRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionRepository: Send + Sync {
    /// Insert a session, or overwrite every field of the session with the
    /// same id. Inserting identical values twice leaves one unchanged row,
    /// and an existing session's messages are kept.
    fn insert_session(
        &self,
        session: &ChatSession,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite all fields of the session with `session.id`.
    ///
    /// Returns the number of rows affected; `0` means no such session.
    fn update_session(
        &self,
        session: &ChatSession,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Get a session by id.
    fn get_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ChatSession>, RepositoryError>> + Send;

    /// List a user's sessions, newest `last_updated` first.
    fn list_sessions(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// Delete every session of a user together with all of their messages.
    ///
    /// Returns the number of sessions deleted.
    fn delete_sessions_for_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
