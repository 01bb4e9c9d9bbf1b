//! Caller identity from a verified bearer token.
//!
//! The middleware verifies `Authorization: Bearer <jwt>` and stores the
//! claims in request extensions. A request without the header passes through
//! with no identity; each handler decides what an anonymous caller may do.

use crate::config::{AuthConfig, TokenVerification};
use crate::error::ChatError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fs;

/// Claims read from an identity-provider token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "cognito:username")]
    pub username: Option<String>,
    pub exp: i64,
}

impl IdentityClaims {
    /// The subject, when present and non-empty.
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        let (decoding_key, algorithm) = match &config.verification {
            TokenVerification::SharedSecret(secret) => (
                DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                Algorithm::HS256,
            ),
            TokenVerification::PublicKeyPath(path) => {
                let pem = fs::read_to_string(path).map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "Failed to read JWT public key from {}: {}",
                        path,
                        e
                    ))
                })?;
                let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Failed to parse JWT public key: {}", e))
                })?;
                (key, Algorithm::RS256)
            }
        };

        tracing::info!(algorithm = ?algorithm, "Token verifier initialized");

        Ok(Self::new(
            decoding_key,
            algorithm,
            config.issuer.as_deref(),
            config.audience.as_deref(),
        ))
    }

    pub fn new(
        decoding_key: DecodingKey,
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }

        Self {
            decoding_key,
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, jsonwebtoken::errors::Error> {
        decode::<IdentityClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
    }
}

/// Verify the bearer token, if any, and attach its claims to the request.
pub async fn identity_middleware(
    State(verifier): State<TokenVerifier>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return next.run(req).await;
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let claims = match token.map(|t| verifier.verify(t)) {
        Some(Ok(claims)) => claims,
        Some(Err(e)) => {
            tracing::info!(error = %e, "Rejected bearer token");
            return ChatError::InvalidToken.into_response();
        }
        None => return ChatError::InvalidToken.into_response(),
    };

    if let Some(sub) = claims.subject() {
        tracing::Span::current().record("user_id", sub);
    }
    req.extensions_mut().insert(claims);

    next.run(req).await
}

/// Identity that may be absent.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<IdentityClaims>);

impl Caller {
    /// The caller's subject, or `placeholder` when there is none.
    pub fn user_id_or(&self, placeholder: &str) -> String {
        self.0
            .as_ref()
            .and_then(|c| c.subject())
            .unwrap_or(placeholder)
            .to_string()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<IdentityClaims>().cloned()))
    }
}

/// Identity that must be present; rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub claims: IdentityClaims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<IdentityClaims>()
            .ok_or(ChatError::Unauthorized)?;
        let user_id = claims.subject().ok_or(ChatError::Unauthorized)?.to_string();

        Ok(AuthenticatedUser {
            user_id,
            claims: claims.clone(),
        })
    }
}
