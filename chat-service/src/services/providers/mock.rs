//! Mock generator for local runs and tests.

use super::{AnswerGenerator, GeneratedAnswer, GeneratorError, KnowledgeBaseRef};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum Behavior {
    Echo,
    Fixed(String),
    Fail,
}

pub struct MockGenerator {
    behavior: Behavior,
    calls: AtomicUsize,
    last_request_id: Mutex<Option<String>>,
}

impl MockGenerator {
    /// Answers `Mock answer for: <prompt>`.
    pub fn echo() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    pub fn answering(text: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fixed(text.into()))
    }

    /// Every call fails with an API error.
    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_request_id: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request id passed to the most recent call.
    pub fn last_request_id(&self) -> Option<String> {
        self.last_request_id
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl AnswerGenerator for MockGenerator {
    async fn retrieve_and_generate(
        &self,
        input: &str,
        _knowledge_base: &KnowledgeBaseRef,
        request_id: Option<&str>,
    ) -> Result<GeneratedAnswer, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request_id.lock() {
            *last = request_id.map(str::to_string);
        }

        let text = match &self.behavior {
            Behavior::Echo => format!("Mock answer for: {}", input),
            Behavior::Fixed(text) => text.clone(),
            Behavior::Fail => {
                return Err(GeneratorError::ApiError(
                    "mock generator configured to fail".to_string(),
                ))
            }
        };

        Ok(GeneratedAnswer {
            text,
            backend_session_id: None,
            citation_count: 0,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
