//! Retrieve-and-generate client for a managed knowledge-base service.
//!
//! Sends the prompt together with the knowledge base id and model ARN and
//! reads the generated answer from `output.text`.

use super::{AnswerGenerator, GeneratedAnswer, GeneratorError, KnowledgeBaseRef};
use crate::config::KnowledgeBaseConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;

pub struct KnowledgeBaseGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl KnowledgeBaseGenerator {
    pub fn new(config: &KnowledgeBaseConfig) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeneratorError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn api_url(&self) -> String {
        format!("{}/retrieveAndGenerate", self.endpoint)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveAndGenerateRequest<'a> {
    input: TextInput<'a>,
    retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration<'a>,
}

#[derive(Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveAndGenerateConfiguration<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    knowledge_base_configuration: KnowledgeBaseConfiguration<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseConfiguration<'a> {
    knowledge_base_id: &'a str,
    model_arn: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveAndGenerateResponse {
    output: Option<GenerationOutput>,
    session_id: Option<String>,
    #[serde(default)]
    citations: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct GenerationOutput {
    text: Option<String>,
}

#[async_trait]
impl AnswerGenerator for KnowledgeBaseGenerator {
    async fn retrieve_and_generate(
        &self,
        input: &str,
        knowledge_base: &KnowledgeBaseRef,
        request_id: Option<&str>,
    ) -> Result<GeneratedAnswer, GeneratorError> {
        let request = RetrieveAndGenerateRequest {
            input: TextInput { text: input },
            retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration {
                kind: "KNOWLEDGE_BASE",
                knowledge_base_configuration: KnowledgeBaseConfiguration {
                    knowledge_base_id: &knowledge_base.knowledge_base_id,
                    model_arn: &knowledge_base.model_arn,
                },
            },
        };

        tracing::debug!(
            knowledge_base_id = %knowledge_base.knowledge_base_id,
            prompt_len = input.len(),
            "Sending retrieve-and-generate request"
        );

        let mut builder = self.client.traced_post(&self.api_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = match request_id {
            Some(id) => builder.send_with_request_id(id).await,
            None => builder.send().await,
        }
        .map_err(|e| GeneratorError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(GeneratorError::RateLimited);
            }

            return Err(GeneratorError::ApiError(format!(
                "retrieve-and-generate error {}: {}",
                status, error_text
            )));
        }

        let body: RetrieveAndGenerateResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = body
            .output
            .and_then(|o| o.text)
            .ok_or(GeneratorError::EmptyResponse)?;

        Ok(GeneratedAnswer {
            text,
            backend_session_id: body.session_id,
            citation_count: body.citations.len(),
        })
    }

    fn name(&self) -> &'static str {
        "knowledge_base"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    fn kb() -> KnowledgeBaseRef {
        KnowledgeBaseRef {
            knowledge_base_id: "KB123".to_string(),
            model_arn: "arn:aws:bedrock:us-east-1::foundation-model/test".to_string(),
        }
    }

    fn config(endpoint: String) -> KnowledgeBaseConfig {
        KnowledgeBaseConfig {
            knowledge_base_id: "KB123".to_string(),
            model_arn: "arn:aws:bedrock:us-east-1::foundation-model/test".to_string(),
            endpoint,
            api_key: Some(SecretString::new("secret-key".to_string())),
            timeout_secs: 5,
            fallback_answer: "fallback".to_string(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn sends_knowledge_base_request_and_reads_output_text() {
        type Captured = (Value, Option<String>, Option<String>);
        let captured: Arc<Mutex<Option<Captured>>> = Arc::new(Mutex::new(None));
        let sink = captured.clone();

        let router = Router::new().route(
            "/retrieveAndGenerate",
            post(move |headers: axum::http::HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    let header = |name: &str| {
                        headers
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string)
                    };
                    *sink.lock().unwrap() =
                        Some((body, header("authorization"), header("x-request-id")));
                    Json(json!({
                        "output": { "text": "Refunds are issued within 30 days." },
                        "sessionId": "backend-1",
                        "citations": [{}, {}]
                    }))
                }
            }),
        );
        let endpoint = serve(router).await;

        let generator = KnowledgeBaseGenerator::new(&config(format!("{}/", endpoint))).unwrap();
        let answer = generator
            .retrieve_and_generate("What is the refund policy?", &kb(), Some("req-7"))
            .await
            .unwrap();

        assert_eq!(answer.text, "Refunds are issued within 30 days.");
        assert_eq!(answer.backend_session_id.as_deref(), Some("backend-1"));
        assert_eq!(answer.citation_count, 2);

        let (body, auth, request_id) = captured.lock().unwrap().take().unwrap();
        assert_eq!(body["input"]["text"], "What is the refund policy?");
        let cfg = &body["retrieveAndGenerateConfiguration"];
        assert_eq!(cfg["type"], "KNOWLEDGE_BASE");
        assert_eq!(cfg["knowledgeBaseConfiguration"]["knowledgeBaseId"], "KB123");
        assert_eq!(
            cfg["knowledgeBaseConfiguration"]["modelArn"],
            "arn:aws:bedrock:us-east-1::foundation-model/test"
        );
        assert_eq!(auth.as_deref(), Some("Bearer secret-key"));
        assert_eq!(request_id.as_deref(), Some("req-7"));
    }

    #[tokio::test]
    async fn maps_429_to_rate_limited() {
        let router = Router::new().route(
            "/retrieveAndGenerate",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let endpoint = serve(router).await;

        let generator = KnowledgeBaseGenerator::new(&config(endpoint)).unwrap();
        let err = generator
            .retrieve_and_generate("hi", &kb(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::RateLimited));
    }

    #[tokio::test]
    async fn missing_output_text_is_an_error() {
        let router = Router::new().route(
            "/retrieveAndGenerate",
            post(|| async { Json(json!({ "output": {} })) }),
        );
        let endpoint = serve(router).await;

        let generator = KnowledgeBaseGenerator::new(&config(endpoint)).unwrap();
        let err = generator
            .retrieve_and_generate("hi", &kb(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::EmptyResponse));
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let router = Router::new().route(
            "/retrieveAndGenerate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let endpoint = serve(router).await;

        let generator = KnowledgeBaseGenerator::new(&config(endpoint)).unwrap();
        let err = generator
            .retrieve_and_generate("hi", &kb(), None)
            .await
            .unwrap_err();
        match err {
            GeneratorError::ApiError(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
