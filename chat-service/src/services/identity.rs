//! User-pool login: exchanges a username and password for tokens.

use crate::config::CognitoConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;
use thiserror::Error;

const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Authentication rejected: {0}")]
    Rejected(String),

    #[error("Additional challenge required: {0}")]
    ChallengeRequired(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `request_id` is forwarded as `x-request-id` when present.
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
        request_id: Option<&str>,
    ) -> Result<AuthTokens, IdentityError>;
}

/// `InitiateAuth` with the `USER_PASSWORD_AUTH` flow against a user pool app
/// client. The call is unsigned; the app client must allow this flow and have
/// no client secret.
pub struct CognitoIdentityProvider {
    client: Client,
    endpoint: String,
    client_id: String,
}

impl CognitoIdentityProvider {
    pub fn new(config: &CognitoConfig) -> Result<Self, IdentityError> {
        let endpoint = format!("https://cognito-idp.{}.amazonaws.com/", config.region);
        Self::with_endpoint(config, endpoint)
    }

    pub fn with_endpoint(config: &CognitoConfig, endpoint: String) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| IdentityError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            client_id: config.client_id.clone(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: AuthParameters<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct AuthParameters<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
        request_id: Option<&str>,
    ) -> Result<AuthTokens, IdentityError> {
        let request = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.client_id,
            auth_parameters: AuthParameters {
                username,
                password: password.expose_secret(),
            },
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| IdentityError::MalformedResponse(e.to_string()))?;

        let builder = self
            .client
            .traced_post(&self.endpoint)
            .header("content-type", AMZ_JSON)
            .header("x-amz-target", INITIATE_AUTH_TARGET)
            .body(body);

        let response = match request_id {
            Some(id) => builder.send_with_request_id(id).await,
            None => builder.send().await,
        }
        .map_err(|e| IdentityError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected(format!("{}: {}", status, error_text)));
        }

        let parsed: InitiateAuthResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::MalformedResponse(e.to_string()))?;

        match (parsed.authentication_result, parsed.challenge_name) {
            (Some(result), _) => Ok(AuthTokens {
                access_token: result.access_token,
                id_token: result.id_token,
                refresh_token: result.refresh_token,
                expires_in: result.expires_in,
            }),
            (None, Some(challenge)) => Err(IdentityError::ChallengeRequired(challenge)),
            (None, None) => Err(IdentityError::MalformedResponse(
                "missing AuthenticationResult".to_string(),
            )),
        }
    }
}
