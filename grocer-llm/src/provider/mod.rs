//! # Chat completion providers
//!
//! Agents talk to a model through [`LlmProvider`]. Two implementations:
//! [`OpenAIProvider`] for any OpenAI-compatible `/chat/completions`
//! endpoint, and [`ScriptedProvider`] which replays queued answers.

pub mod openai;
pub mod scripted;

pub use openai::OpenAIProvider;
pub use scripted::ScriptedProvider;

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn of a conversation.
///
/// Assistant turns that asked for tools carry `tool_calls`; the answers to
/// them are `Tool` turns pointing back through `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Echo of a model turn that asked for tools
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls: Some(tool_calls),
            ..Self::plain(Role::Assistant, "")
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// A function the model may call, with a JSON Schema for its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// A tool that takes no arguments until `with_parameters` says otherwise
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A call the model asked for. `arguments` is raw JSON text, unvalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

// ============================================================================
// Request / Response
// ============================================================================

/// Unset fields fall back to the provider's defaults
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub tools: Option<Vec<ToolDefinition>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(self, model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..self
        }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..self
        }
    }

    pub fn with_max_tokens(self, max_tokens: usize) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..self
        }
    }

    /// An empty list leaves the request tool-free
    pub fn with_tools(self, tools: Vec<ToolDefinition>) -> Self {
        Self {
            tools: (!tools.is_empty()).then_some(tools),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            model: model.into(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    pub fn tool_calls(model: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: FinishReason::ToolCalls,
            ..Self::text(model, "")
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Cut off by `max_tokens`
    Length,
    ToolCalls,
    ContentFilter,
    Unknown,
}

impl FinishReason {
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason.unwrap_or_default() {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Running token totals for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;
        tracing::trace!(model, tokens = usage.total_tokens, "usage recorded");
    }

    pub fn total_tokens(&self) -> usize {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Failures as the backend reports them; converted into
/// [`grocer_error::Error`] at the crate boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("unreadable response: {0}")]
    Parse(String),
    #[error("rate limited{}", .retry_after.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("{0}")]
    Other(String),
}

/// A chat completion backend.
///
/// Not object safe (async fn); callers are generic over `P: LlmProvider`.
#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Single user message in, text out
    async fn prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .complete(CompletionRequest::new(vec![ChatMessage::user(prompt)]))
            .await?;
        response
            .content
            .ok_or_else(|| ProviderError::Other("response had no text content".into()))
    }
}

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Clone)]
pub struct ProviderConfig {
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub const OPENAI_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: Self::OPENAI_BASE_URL.into(),
            default_model: "gpt-4o".into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point at another OpenAI-compatible server (Azure, vLLM, Ollama)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
