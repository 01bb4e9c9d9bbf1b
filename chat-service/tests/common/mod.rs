//! Shared fixtures for the chat-service integration tests.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`;
//! the store, generator and identity provider are in-process doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chat_service::config::{
    AuthConfig, ChatConfig, KnowledgeBaseConfig, StoreBackend, StoreConfig, TokenVerification,
    DEFAULT_ANONYMOUS_USER_ID, DEFAULT_FALLBACK_ANSWER,
};
use chat_service::middleware::TokenVerifier;
use chat_service::models::{Message, Session};
use chat_service::services::providers::mock::MockGenerator;
use chat_service::services::{
    AnswerGenerator, AuthTokens, ChatStore, IdentityError, IdentityProvider, InMemoryChatStore,
    SessionInsert, StoreError,
};
use chat_service::startup::{router, AppState};
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const JWT_SECRET: &str = "chat-service-test-secret";
pub const VALID_USERNAME: &str = "alice";
pub const VALID_PASSWORD: &str = "correct horse battery staple";

pub fn test_config() -> ChatConfig {
    ChatConfig {
        common: service_core::config::Config { port: 0 },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            mongodb_uri: None,
            database: "chat_test_db".to_string(),
            sessions_collection: "ChatSessions".to_string(),
            messages_collection: "ChatMessages".to_string(),
        },
        knowledge_base: KnowledgeBaseConfig {
            knowledge_base_id: "KB123".to_string(),
            model_arn: "arn:aws:bedrock:us-east-1::foundation-model/test".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
            api_key: None,
            timeout_secs: 5,
            fallback_answer: DEFAULT_FALLBACK_ANSWER.to_string(),
        },
        auth: AuthConfig {
            verification: TokenVerification::SharedSecret(SecretString::new(
                JWT_SECRET.to_string(),
            )),
            issuer: None,
            audience: None,
            anonymous_user_id: DEFAULT_ANONYMOUS_USER_ID.to_string(),
            enforce_session_ownership: true,
        },
        cognito: None,
    }
}

/// Store wrapper that counts every call and can be switched to fail.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: InMemoryChatStore,
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation returns a database error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Database("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for RecordingStore {
    async fn create_session_if_absent(
        &self,
        session: &Session,
    ) -> Result<SessionInsert, StoreError> {
        self.record()?;
        self.inner.create_session_if_absent(session).await
    }

    async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        self.record()?;
        self.inner.put_message(message).await
    }

    async fn query_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        self.record()?;
        self.inner.query_messages(session_id).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        self.record()?;
        self.inner.get_session(session_id).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        self.record()?;
        self.inner.list_sessions(user_id).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.record()?;
        self.inner.health_check().await
    }
}

/// Accepts exactly one username/password pair.
pub struct StaticIdentityProvider;

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
        _request_id: Option<&str>,
    ) -> Result<AuthTokens, IdentityError> {
        if username == VALID_USERNAME && password.expose_secret() == VALID_PASSWORD {
            Ok(AuthTokens {
                access_token: "access-token".to_string(),
                id_token: "id-token".to_string(),
                refresh_token: Some("refresh-token".to_string()),
                expires_in: 3600,
            })
        } else {
            Err(IdentityError::Rejected("NotAuthorizedException".to_string()))
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<RecordingStore>,
    pub generator: Arc<MockGenerator>,
}

pub struct TestAppBuilder {
    config: ChatConfig,
    store: RecordingStore,
    generator: MockGenerator,
    with_login: bool,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            store: RecordingStore::new(),
            generator: MockGenerator::echo(),
            with_login: false,
        }
    }

    pub fn store(mut self, store: RecordingStore) -> Self {
        self.store = store;
        self
    }

    pub fn generator(mut self, generator: MockGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn enforce_ownership(mut self, enforce: bool) -> Self {
        self.config.auth.enforce_session_ownership = enforce;
        self
    }

    pub fn with_login(mut self) -> Self {
        self.with_login = true;
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(self.store);
        let generator = Arc::new(self.generator);
        let verifier = TokenVerifier::from_config(&self.config.auth).unwrap();
        let identity_provider = self
            .with_login
            .then(|| Arc::new(StaticIdentityProvider) as Arc<dyn IdentityProvider>);

        let state = AppState {
            config: self.config,
            store: store.clone() as Arc<dyn ChatStore>,
            generator: generator.clone() as Arc<dyn AnswerGenerator>,
            identity_provider,
            verifier,
        };

        TestApp {
            router: router(state),
            store,
            generator,
        }
    }
}

pub fn spawn_app() -> TestApp {
    TestAppBuilder::new().build()
}

/// HS256 token for `sub`, valid for an hour.
pub fn token_for(sub: &str) -> String {
    let claims = json!({
        "sub": sub,
        "cognito:username": sub,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn post_json(uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn cors_origin(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok())
}
