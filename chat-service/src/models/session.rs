//! Session record, created once per conversation.

use serde::{Deserialize, Serialize};

/// Maximum number of characters of the opening prompt kept as the title.
pub const TITLE_MAX_CHARS: usize = 60;

/// A conversation owned by a single user.
///
/// Written once, with a conditional insert keyed on `session_id`, and never
/// updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
    /// First [`TITLE_MAX_CHARS`] characters of the opening prompt.
    pub title: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl Session {
    pub fn new(user_id: &str, session_id: &str, first_prompt: &str, created_at: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            title: title_from_prompt(first_prompt),
            created_at,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Truncate on character boundaries, never inside a multi-byte character.
pub fn title_from_prompt(prompt: &str) -> String {
    prompt.chars().take(TITLE_MAX_CHARS).collect()
}
