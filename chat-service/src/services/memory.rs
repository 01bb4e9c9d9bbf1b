//! In-process store backed by `DashMap`, for local runs and tests.

use super::store::{ChatStore, SessionInsert, StoreError};
use crate::models::{Message, Session};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct InMemoryChatStore {
    sessions: DashMap<String, Session>,
    messages: DashMap<String, BTreeMap<i64, Message>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn create_session_if_absent(
        &self,
        session: &Session,
    ) -> Result<SessionInsert, StoreError> {
        match self.sessions.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Ok(SessionInsert::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(SessionInsert::Created)
            }
        }
    }

    async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages
            .entry(message.session_id.clone())
            .or_default()
            .insert(message.timestamp, message.clone());
        Ok(())
    }

    async fn query_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages
            .get(session_id)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(session_id).map(|s| s.value().clone()))
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_owned_by(user_id))
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(sessions)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
