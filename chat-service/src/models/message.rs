//! Message record, append-only and ordered by `timestamp` within a session.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn of a conversation.
///
/// `(session_id, timestamp)` is the primary key: `session_id` partitions,
/// `timestamp` (epoch milliseconds) sorts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub session_id: String,
    pub timestamp: i64,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(session_id: &str, timestamp: i64, content: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp,
            role: Role::User,
            content: content.to_string(),
        }
    }

    /// The reply to the user message written at `user_timestamp`.
    ///
    /// Stored one millisecond later so the pair sorts deterministically even
    /// when both land in the same millisecond.
    pub fn assistant_reply(session_id: &str, user_timestamp: i64, content: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp: user_timestamp + 1,
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}
