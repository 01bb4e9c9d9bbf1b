//! Error union shared by the chat handlers.
//!
//! Every variant maps to one HTTP status and a JSON body. Generation failures
//! have no variant: they are replaced by the fallback answer before they
//! reach a handler's return value.

use crate::services::StoreError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const MISSING_PROMPT_FIELDS: &str = "prompt and sessionId required";
pub const MISSING_SESSION_ID: &str = "sessionId is required";
pub const MISSING_CLAIMS: &str = "Unauthorized - missing Cognito claims";
pub const INVALID_TOKEN: &str = "Invalid or expired token";
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const MESSAGE_QUERY_FAILED: &str = "Failed to query messages";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("prompt and sessionId required")]
    MissingPromptFields,

    #[error("sessionId is required")]
    MissingSessionId,

    #[error("Unauthorized - missing Cognito claims")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Forbidden - {0}")]
    Forbidden(String),

    #[error("Failed to query messages: {0}")]
    MessageQuery(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    MalformedBody(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::MissingPromptFields | ChatError::MissingSessionId => {
                StatusCode::BAD_REQUEST
            }
            ChatError::Unauthorized | ChatError::InvalidToken | ChatError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::MessageQuery(_)
            | ChatError::Store(_)
            | ChatError::MalformedBody(_)
            | ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the response body. Query failures are reported
    /// generically; other server errors carry the underlying error text.
    fn public_message(&self) -> String {
        match self {
            ChatError::MessageQuery(_) => MESSAGE_QUERY_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let mut response = match &self {
            ChatError::InvalidCredentials => {
                (status, Json(json!({ "message": INVALID_CREDENTIALS }))).into_response()
            }
            other => (status, Json(json!({ "error": other.public_message() }))).into_response(),
        };

        // The prompt endpoint's validation response has never carried CORS.
        if !matches!(self, ChatError::MissingPromptFields) {
            response.headers_mut().insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_prompt_fields_has_no_cors_header() {
        let response = ChatError::MissingPromptFields.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
        assert_eq!(body_json(response).await["error"], MISSING_PROMPT_FIELDS);
    }

    #[tokio::test]
    async fn unauthorized_carries_cors_header() {
        let response = ChatError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body_json(response).await["error"], MISSING_CLAIMS);
    }

    #[tokio::test]
    async fn message_query_hides_store_details() {
        let err = ChatError::MessageQuery(StoreError::Database("socket closed".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], MESSAGE_QUERY_FAILED);
    }

    #[tokio::test]
    async fn store_error_exposes_error_text() {
        let err = ChatError::Store(StoreError::Database("socket closed".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Database error: socket closed"
        );
    }

    #[tokio::test]
    async fn invalid_credentials_uses_message_key() {
        let response = ChatError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], INVALID_CREDENTIALS);
    }
}
