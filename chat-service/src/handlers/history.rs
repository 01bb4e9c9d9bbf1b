use crate::dtos::{HistoryEntry, HistoryParams};
use crate::error::ChatError;
use crate::handlers::{cors_json, ensure_session_owner};
use crate::middleware::AuthenticatedUser;
use crate::services::metrics;
use crate::startup::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::Response,
};

/// `GET /messages?sessionId=...`: the session's messages, oldest first.
///
/// Identity is checked before the query parameter, and both before any store
/// access.
pub async fn get_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Response, ChatError> {
    // An unreadable query string (repeated key, bad encoding) counts as a
    // missing id so the answer keeps the JSON body and CORS header.
    let Query(params) = query.map_err(|e| {
        tracing::info!(error = %e, "Unreadable history query string");
        ChatError::MissingSessionId
    })?;

    let session_id = params
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or(ChatError::MissingSessionId)?;

    ensure_session_owner(&state, &session_id, &user.user_id, ChatError::MessageQuery).await?;

    let messages = state
        .store
        .query_messages(&session_id)
        .await
        .map_err(|e| {
            metrics::record_store_error("query_messages");
            ChatError::MessageQuery(e)
        })?;

    let history: Vec<HistoryEntry> = messages
        .into_iter()
        .map(|m| HistoryEntry {
            role: m.role.to_string(),
            message: m.content,
        })
        .collect();

    tracing::debug!(session_id = %session_id, count = history.len(), "History fetched");

    Ok(cors_json(StatusCode::OK, history))
}
