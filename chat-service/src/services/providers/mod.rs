//! Answer generation backends.
//!
//! A generator takes the user's prompt plus a knowledge-base reference and
//! returns the generated answer. Retrieval and model serving are owned by the
//! backend; this service only forwards the request.

pub mod knowledge_base;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Generator returned no text")]
    EmptyResponse,
}

impl GeneratorError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GeneratorError::NotConfigured(_) => "not_configured",
            GeneratorError::ApiError(_) => "api_error",
            GeneratorError::RateLimited => "rate_limited",
            GeneratorError::NetworkError(_) => "network_error",
            GeneratorError::EmptyResponse => "empty_response",
        }
    }
}

/// Which knowledge base to retrieve from and which model answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseRef {
    pub knowledge_base_id: String,
    pub model_arn: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    /// Backend-side conversation id, when the backend returns one.
    pub backend_session_id: Option<String>,
    /// Number of retrieved passages cited by the answer.
    pub citation_count: usize,
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// `request_id` is forwarded as `x-request-id` when present.
    async fn retrieve_and_generate(
        &self,
        input: &str,
        knowledge_base: &KnowledgeBaseRef,
        request_id: Option<&str>,
    ) -> Result<GeneratedAnswer, GeneratorError>;

    /// Name reported in logs and metrics.
    fn name(&self) -> &'static str;
}
