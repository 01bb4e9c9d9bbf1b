//! HTTP handlers for the chat service.

pub mod health;
pub mod history;
pub mod login;
pub mod prompt;
pub mod sessions;

use crate::error::ChatError;
use crate::services::{metrics, StoreError};
use crate::startup::AppState;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON response open to any origin.
pub(crate) fn cors_json<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(body),
    )
        .into_response()
}

/// Reject `user_id` when the session record exists and names another owner.
/// Sessions started without `isFirstMessage` have no record and pass.
pub(crate) async fn ensure_session_owner(
    state: &AppState,
    session_id: &str,
    user_id: &str,
    on_store_error: fn(StoreError) -> ChatError,
) -> Result<(), ChatError> {
    if !state.config.auth.enforce_session_ownership {
        return Ok(());
    }

    let session = state.store.get_session(session_id).await.map_err(|e| {
        metrics::record_store_error("get_session");
        on_store_error(e)
    })?;

    match session {
        Some(session) if !session.is_owned_by(user_id) => {
            tracing::warn!(
                session_id = %session_id,
                user_id = %user_id,
                "Rejected access to another user's session"
            );
            Err(ChatError::Forbidden(
                "session belongs to another user".to_string(),
            ))
        }
        _ => Ok(()),
    }
}
