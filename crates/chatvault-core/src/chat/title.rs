//! Session title derivation from the first user turn.

use chatvault_types::chat::DEFAULT_SESSION_TITLE;

/// Maximum number of words carried over from the user's message.
const TITLE_WORD_LIMIT: usize = 10;

/// Title a session should carry after a turn with `user_message`.
///
/// Only sessions still holding the default title are renamed. A message of
/// up to ten words becomes the title verbatim; longer ones are cut to their
/// first ten words followed by `...`.
pub fn derive_title(current: &str, user_message: &str) -> String {
    let trimmed = user_message.trim();
    if current != DEFAULT_SESSION_TITLE || trimmed.is_empty() {
        return current.to_string();
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() > TITLE_WORD_LIMIT {
        format!("{}...", words[..TITLE_WORD_LIMIT].join(" "))
    } else {
        user_message.to_string()
    }
}
