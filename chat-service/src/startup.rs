//! Application startup and lifecycle management.
//!
//! Managed-service clients (store, generator, identity provider, token
//! verifier) are built once here and shared with every request through
//! [`AppState`].

use crate::config::{ChatConfig, StoreBackend};
use crate::error::ChatError;
use crate::handlers::{
    health::{health_check, metrics_endpoint, readiness_check},
    history::get_messages,
    login::login,
    prompt::submit_prompt,
    sessions::list_sessions,
};
use crate::middleware::{identity_middleware, metrics_middleware, TokenVerifier};
use crate::services::providers::knowledge_base::KnowledgeBaseGenerator;
use crate::services::{
    AnswerGenerator, ChatStore, CognitoIdentityProvider, IdentityProvider, InMemoryChatStore,
    MongoChatStore,
};
use axum::{
    body::Body,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub store: Arc<dyn ChatStore>,
    pub generator: Arc<dyn AnswerGenerator>,
    /// Present only when login is configured.
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
    pub verifier: TokenVerifier,
}

/// Build the HTTP router over `state`.
///
/// Token verification runs only on the chat API routes. Login and the
/// health endpoints never look at `Authorization`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/prompt", post(submit_prompt))
        .route("/messages", get(get_messages))
        .route("/sessions", get(list_sessions))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            identity_middleware,
        ));

    let mut routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint));

    if state.identity_provider.is_some() {
        routes = routes.route("/login", post(login));
    }

    api.merge(routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Last-resort boundary: a panicking handler still yields a JSON 500.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "Handler panicked");

    ChatError::Internal(anyhow::anyhow!("Internal server error")).into_response()
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let store: Arc<dyn ChatStore> = match config.store.backend {
            StoreBackend::MongoDb => {
                let db = MongoChatStore::connect(&config.store).await.map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                Arc::new(db)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; history is lost on restart");
                Arc::new(InMemoryChatStore::new())
            }
        };

        let generator: Arc<dyn AnswerGenerator> = Arc::new(
            KnowledgeBaseGenerator::new(&config.knowledge_base)
                .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?,
        );
        tracing::info!(
            knowledge_base_id = %config.knowledge_base.knowledge_base_id,
            endpoint = %config.knowledge_base.endpoint,
            "Initialized knowledge-base generator"
        );

        let identity_provider = match &config.cognito {
            Some(cognito) => {
                let provider = CognitoIdentityProvider::new(cognito)
                    .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
                tracing::info!(region = %cognito.region, "Initialized Cognito login");
                Some(Arc::new(provider) as Arc<dyn IdentityProvider>)
            }
            None => {
                tracing::info!("COGNITO_CLIENT_ID not set, /login is disabled");
                None
            }
        };

        let verifier = TokenVerifier::from_config(&config.auth)?;

        let state = AppState {
            config: config.clone(),
            store,
            generator,
            identity_provider,
            verifier,
        };

        // Port 0 binds a random port, used by tests.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Chat service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
