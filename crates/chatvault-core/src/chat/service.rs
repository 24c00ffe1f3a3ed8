//! Chat service orchestrating session lifecycle and message persistence.
//!
//! ChatService coordinates the session and message repositories for a
//! conversation: starting sessions, recording the user's turn, recording the
//! model's reply and keeping the session's title, recency and offline flag
//! up to date.

use chatvault_types::chat::{ChatSession, DEFAULT_SESSION_TITLE, Message, MessageRole, now_millis};
use chatvault_types::error::RepositoryError;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::title::derive_title;
use crate::repository::{MessageRepository, SessionRepository};

/// Errors surfaced by `ChatService`.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The session does not exist or belongs to another user.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Orchestrates chat session lifecycle and message persistence.
///
/// Generic over the repository traits so chatvault-core never depends on
/// chatvault-infra.
pub struct ChatService<S: SessionRepository, M: MessageRepository> {
    sessions: S,
    messages: M,
}

impl<S: SessionRepository, M: MessageRepository> ChatService<S, M> {
    pub fn new(sessions: S, messages: M) -> Self {
        Self { sessions, messages }
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub fn messages(&self) -> &M {
        &self.messages
    }

    // --- Session lifecycle ---

    /// Start a new session for `user_id`.
    ///
    /// Sessions without an explicit title get the default one, which the
    /// first user turn replaces.
    pub async fn start_session(
        &self,
        user_id: &str,
        title: Option<&str>,
        offline_only: bool,
    ) -> Result<ChatSession, ChatError> {
        let session = ChatSession::new(
            Uuid::now_v7().to_string(),
            user_id,
            title.unwrap_or(DEFAULT_SESSION_TITLE),
            offline_only,
            now_millis(),
        );
        self.sessions.insert_session(&session).await?;
        info!(session_id = %session.id, offline_only, "started chat session");
        Ok(session)
    }

    /// Sessions of a user, most recently updated first.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ChatError> {
        Ok(self.sessions.list_sessions(user_id).await?)
    }

    /// Messages of a session in chronological order.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Message>, ChatError> {
        Ok(self.messages.list_messages(session_id).await?)
    }

    /// Delete every chat of a user. Returns the number of sessions removed.
    pub async fn delete_all_user_chats(&self, user_id: &str) -> Result<u64, ChatError> {
        let deleted = self.sessions.delete_sessions_for_user(user_id).await?;
        info!(user_id, deleted, "deleted all chats of user");
        Ok(deleted)
    }

    // --- Turns ---

    /// Record the user's side of a turn.
    pub async fn save_user_message(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
        image_path: Option<String>,
    ) -> Result<Message, ChatError> {
        self.owned_session(user_id, session_id).await?;

        let message = Message {
            image_path,
            ..Message::new(
                Uuid::now_v7().to_string(),
                session_id,
                MessageRole::User,
                content,
                now_millis(),
            )
        };
        self.messages.insert_message(&message).await?;
        debug!(session_id, message_id = %message.id, "saved user message");
        Ok(message)
    }

    /// Record the model's reply and refresh the session.
    ///
    /// The session is renamed from the default title using `prompt`, its
    /// `last_updated` moves to now, and it becomes offline-only if the reply
    /// was produced while offline. A session never goes back online.
    pub async fn record_reply(
        &self,
        user_id: &str,
        session_id: &str,
        prompt: &str,
        reply: &str,
        online: bool,
    ) -> Result<Message, ChatError> {
        let session = self.owned_session(user_id, session_id).await?;

        let message = Message::new(
            Uuid::now_v7().to_string(),
            session_id,
            MessageRole::Model,
            reply,
            now_millis(),
        );
        self.messages.insert_message(&message).await?;

        let updated = ChatSession {
            title: derive_title(&session.title, prompt),
            last_updated: now_millis(),
            is_offline_only: session.is_offline_only || !online,
            ..session
        };
        if self.sessions.update_session(&updated).await? == 0 {
            return Err(ChatError::SessionNotFound(session_id.to_string()));
        }

        debug!(session_id, offline_only = updated.is_offline_only, "recorded model reply");
        Ok(message)
    }

    async fn owned_session(&self, user_id: &str, session_id: &str) -> Result<ChatSession, ChatError> {
        match self.sessions.get_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(ChatError::SessionNotFound(session_id.to_string())),
        }
    }
}
