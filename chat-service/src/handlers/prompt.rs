use crate::dtos::{PromptRequest, PromptResponse};
use crate::error::ChatError;
use crate::handlers::{cors_json, ensure_session_owner};
use crate::middleware::Caller;
use crate::models::{Message, Session};
use crate::services::metrics;
use crate::services::SessionInsert;
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use chrono::Utc;
use service_core::observability::extract_request_id;
use std::time::Instant;

/// `POST /prompt`: store the prompt, answer it from the knowledge base, store
/// and return the answer.
pub async fn submit_prompt(
    State(state): State<AppState>,
    caller: Caller,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ChatError> {
    let request = parse_body(&body)?;

    let (prompt, session_id) = match (
        non_empty(request.prompt),
        non_empty(request.session_id),
    ) {
        (Some(prompt), Some(session_id)) => (prompt, session_id),
        _ => return Err(ChatError::MissingPromptFields),
    };
    let user_id = caller.user_id_or(&state.config.auth.anonymous_user_id);
    ensure_session_owner(&state, &session_id, &user_id, ChatError::Store).await?;

    let now = Utc::now().timestamp_millis();

    if request.is_first_message.unwrap_or(false) {
        let session = Session::new(&user_id, &session_id, &prompt, now);
        let outcome = state
            .store
            .create_session_if_absent(&session)
            .await
            .inspect_err(|_| metrics::record_store_error("create_session"))?;

        match outcome {
            SessionInsert::Created => tracing::info!(
                session_id = %session_id,
                user_id = %user_id,
                "Session created"
            ),
            SessionInsert::AlreadyExists => tracing::info!(
                session_id = %session_id,
                "Session already exists, keeping the original record"
            ),
        }
    }

    let user_message = Message::user(&session_id, now, &prompt);
    state
        .store
        .put_message(&user_message)
        .await
        .inspect_err(|_| metrics::record_store_error("put_message"))?;

    let request_id = extract_request_id(&headers);
    let answer = generate_answer(&state, &prompt, request_id.as_deref()).await;

    let reply = Message::assistant_reply(&session_id, user_message.timestamp, &answer);
    state
        .store
        .put_message(&reply)
        .await
        .inspect_err(|_| metrics::record_store_error("put_message"))?;

    tracing::info!(
        session_id = %session_id,
        user_timestamp = user_message.timestamp,
        "Prompt answered"
    );

    Ok(cors_json(
        StatusCode::OK,
        PromptResponse {
            response: reply.content,
        },
    ))
}

/// Ask the generator; any failure yields the configured fallback answer.
async fn generate_answer(state: &AppState, prompt: &str, request_id: Option<&str>) -> String {
    let generator = state.generator.name();
    let started = Instant::now();
    let result = state
        .generator
        .retrieve_and_generate(
            prompt,
            &state.config.knowledge_base.reference(),
            request_id,
        )
        .await;
    metrics::record_generation_latency(generator, started.elapsed());

    match result {
        Ok(answer) => {
            tracing::debug!(
                generator,
                citations = answer.citation_count,
                "Generated answer"
            );
            metrics::record_prompt("answered");
            answer.text
        }
        Err(e) => {
            tracing::warn!(generator, error = %e, "Generation failed, using fallback answer");
            metrics::record_generation_fallback(generator, e.kind());
            metrics::record_prompt("fallback");
            state.config.knowledge_base.fallback_answer.clone()
        }
    }
}

fn parse_body(body: &[u8]) -> Result<PromptRequest, ChatError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PromptRequest::default());
    }
    Ok(serde_json::from_slice(body)?)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
