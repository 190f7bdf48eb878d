//! Scripted provider - replays canned responses in order
//!
//! Every request is recorded so callers can inspect exactly what was sent.
//! Used by tests and by `grocer run --dry-run`.

use super::*;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Deterministic provider backed by a queue of responses
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    model: String,
    responses: Mutex<VecDeque<std::result::Result<CompletionResponse, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            model: "scripted".into(),
            ..Default::default()
        }
    }

    /// Queue a plain text answer
    pub fn push_text(&self, content: impl Into<String>) -> &Self {
        self.push(Ok(CompletionResponse::text(self.model.clone(), content)))
    }

    /// Queue a turn that requests tool calls
    pub fn push_tool_calls(&self, tool_calls: Vec<ToolCall>) -> &Self {
        self.push(Ok(CompletionResponse::tool_calls(self.model.clone(), tool_calls)))
    }

    /// Queue a fully specified response
    pub fn push_response(&self, response: CompletionResponse) -> &Self {
        self.push(Ok(response))
    }

    /// Queue a failure
    pub fn push_error(&self, error: ProviderError) -> &Self {
        self.push(Err(error))
    }

    fn push(&self, item: std::result::Result<CompletionResponse, ProviderError>) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(item);
        self
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Responses still queued
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Other("scripted responses exhausted".into())))
    }
}
