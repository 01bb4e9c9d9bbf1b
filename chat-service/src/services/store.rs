//! Storage abstraction for sessions and messages.
//!
//! The store is a key-value table pair: sessions keyed by `sessionId`, and
//! messages partitioned by `sessionId` and sorted by `timestamp`.

use crate::models::{Message, Session};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a conditional session insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInsert {
    Created,
    /// A session with the same id was already present; nothing was written.
    AlreadyExists,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert `session` only if no record with its `session_id` exists.
    /// This is the only concurrency guard the service relies on.
    async fn create_session_if_absent(&self, session: &Session)
        -> Result<SessionInsert, StoreError>;

    /// Unconditional put; a message with the same key is replaced.
    async fn put_message(&self, message: &Message) -> Result<(), StoreError>;

    /// All messages of a session, oldest first.
    async fn query_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Sessions owned by `user_id`, oldest first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
