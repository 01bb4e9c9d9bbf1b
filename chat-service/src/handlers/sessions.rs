use crate::error::ChatError;
use crate::handlers::cors_json;
use crate::middleware::AuthenticatedUser;
use crate::services::metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::Response};

/// `GET /sessions`: the caller's session records, oldest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, ChatError> {
    let sessions = state
        .store
        .list_sessions(&user.user_id)
        .await
        .inspect_err(|_| metrics::record_store_error("list_sessions"))?;

    Ok(cors_json(StatusCode::OK, sessions))
}
