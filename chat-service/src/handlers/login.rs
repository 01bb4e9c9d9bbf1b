use crate::dtos::{LoginRequest, LoginResponse};
use crate::error::ChatError;
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use service_core::observability::extract_request_id;
use validator::Validate;

/// `POST /login`: exchange a username and password for user-pool tokens.
///
/// Every failure, including a malformed body, answers with the same 401 so
/// callers cannot tell which part was wrong.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ChatError> {
    let Some(provider) = state.identity_provider.as_ref() else {
        tracing::warn!("Login attempted but no identity provider is configured");
        return Err(ChatError::InvalidCredentials);
    };

    let request: LoginRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::info!(error = %e, "Unreadable login body");
        ChatError::InvalidCredentials
    })?;
    request.validate().map_err(|e| {
        tracing::info!(error = %e, "Incomplete login body");
        ChatError::InvalidCredentials
    })?;

    let LoginRequest { username, password } = request;
    let password = SecretString::new(password);

    let tokens = provider
        .authenticate(
            &username,
            &password,
            extract_request_id(&headers).as_deref(),
        )
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Login failed");
            ChatError::InvalidCredentials
        })?;

    Ok((
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST,OPTIONS"),
        ],
        Json(LoginResponse {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        }),
    )
        .into_response())
}
