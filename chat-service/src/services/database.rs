//! MongoDB-backed session and message store.
//!
//! Sessions live in one collection with a unique index on `sessionId`, which
//! turns a plain insert into an insert-if-absent. Messages live in a second
//! collection keyed by the unique compound index `{sessionId, timestamp}`.

use super::store::{ChatStore, SessionInsert, StoreError};
use crate::config::StoreConfig;
use crate::models::{Message, Session};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteError, WriteFailure},
    options::{FindOptions, IndexOptions, ReplaceOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoChatStore {
    client: MongoClient,
    db: Database,
    sessions_collection: String,
    messages_collection: String,
}

impl MongoChatStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let uri = config.mongodb_uri.as_deref().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("MONGODB_URI is required for the mongodb backend"))
        })?;

        tracing::info!(database = %config.database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to MongoDB");
            AppError::from(e)
        })?;
        let db = client.database(&config.database);
        tracing::info!(database = %config.database, "Successfully connected to MongoDB database");

        Ok(Self {
            client,
            db,
            sessions_collection: config.sessions_collection.clone(),
            messages_collection: config.messages_collection.clone(),
        })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for chat-service");

        let session_id_index = IndexModel::builder()
            .keys(doc! { "sessionId": 1 })
            .options(
                IndexOptions::builder()
                    .name("session_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.sessions()
            .create_index(session_id_index, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create sessionId index");
                AppError::from(e)
            })?;

        let owner_index = IndexModel::builder()
            .keys(doc! { "userId": 1, "createdAt": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_created_idx".to_string())
                    .build(),
            )
            .build();

        self.sessions()
            .create_index(owner_index, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create userId index");
                AppError::from(e)
            })?;

        let message_key_index = IndexModel::builder()
            .keys(doc! { "sessionId": 1, "timestamp": 1 })
            .options(
                IndexOptions::builder()
                    .name("session_timestamp_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.messages()
            .create_index(message_key_index, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create message key index");
                AppError::from(e)
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn sessions(&self) -> Collection<Session> {
        self.db.collection(&self.sessions_collection)
    }

    pub fn messages(&self) -> Collection<Message> {
        self.db.collection(&self.messages_collection)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY_CODE,
            ..
        }))
    )
}

fn database_error(operation: &str, err: mongodb::error::Error) -> StoreError {
    tracing::error!(operation, error = %err, "MongoDB operation failed");
    StoreError::Database(err.to_string())
}

#[async_trait]
impl ChatStore for MongoChatStore {
    async fn create_session_if_absent(
        &self,
        session: &Session,
    ) -> Result<SessionInsert, StoreError> {
        match self.sessions().insert_one(session, None).await {
            Ok(_) => Ok(SessionInsert::Created),
            Err(e) if is_duplicate_key(&e) => Ok(SessionInsert::AlreadyExists),
            Err(e) => Err(database_error("insert_session", e)),
        }
    }

    async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.messages()
            .replace_one(
                doc! { "sessionId": &message.session_id, "timestamp": message.timestamp },
                message,
                options,
            )
            .await
            .map_err(|e| database_error("put_message", e))?;
        Ok(())
    }

    async fn query_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": 1 })
            .build();

        let cursor = self
            .messages()
            .find(doc! { "sessionId": session_id }, options)
            .await
            .map_err(|e| database_error("query_messages", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| database_error("collect_messages", e))
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        self.sessions()
            .find_one(doc! { "sessionId": session_id }, None)
            .await
            .map_err(|e| database_error("get_session", e))
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1, "sessionId": 1 })
            .build();

        let cursor = self
            .sessions()
            .find(doc! { "userId": user_id }, options)
            .await
            .map_err(|e| database_error("list_sessions", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| database_error("collect_sessions", e))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "MongoDB health check failed");
                StoreError::Unavailable(e.to_string())
            })?;
        Ok(())
    }
}
