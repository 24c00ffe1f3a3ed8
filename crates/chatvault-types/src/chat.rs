//! Chat session and message types.
//!
//! A session is owned by exactly one user and holds an ordered list of
//! messages. Sessions flagged `is_offline_only` never leave the device and
//! are subject to retention pruning.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Title given to sessions before the first user turn names them.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Sender of a chat message.
///
/// Stored as lowercase text in the `messages.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    /// Reply produced by a language model (on-device or remote).
    Model,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Model => write!(f, "model"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "model" => Ok(MessageRole::Model),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A chat session.
///
/// `id` is assigned by the caller. `last_updated` is epoch milliseconds and
/// drives the newest-first ordering of session lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub is_offline_only: bool,
    pub last_updated: i64,
}

impl ChatSession {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        title: impl Into<String>,
        is_offline_only: bool,
        last_updated: i64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            is_offline_only,
            last_updated,
        }
    }
}

/// A single message within a chat session.
///
/// Messages are immutable once written and ordered by `timestamp`
/// (epoch milliseconds) within their session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
    /// Path to an image stored outside the database, if the turn had one.
    pub image_path: Option<String>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            timestamp,
            image_path: None,
        }
    }

    pub fn with_image(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = Some(image_path.into());
        self
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [
            MessageRole::User,
            MessageRole::Model,
            MessageRole::Assistant,
            MessageRole::System,
        ] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_message_role_parse_is_lenient_on_case() {
        assert_eq!(" Model ".parse::<MessageRole>().unwrap(), MessageRole::Model);
        assert!("robot".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_message_role_serde() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_message_with_image() {
        let msg = Message::new("m1", "s1", MessageRole::User, "look", 10).with_image("/img/a.jpg");
        assert_eq!(msg.image_path.as_deref(), Some("/img/a.jpg"));
    }

    #[test]
    fn test_chat_session_serialize() {
        let session = ChatSession::new("s1", "u1", DEFAULT_SESSION_TITLE, true, 42);
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"is_offline_only\":true"));
        assert!(json.contains("\"last_updated\":42"));
    }
}
