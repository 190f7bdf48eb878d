//! # grocer-llm
//!
//! Trait-based communication with LLM backends.
//!
//! ## Core Concepts
//! - **Provider**: `LlmProvider` sends a `CompletionRequest` and returns a `CompletionResponse`
//! - **Tools**: function definitions the model may call, and the calls it makes
//! - **Scripted**: a deterministic provider that replays canned responses
//! - **Usage**: token accounting across calls

pub mod error;
pub mod provider;

pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use provider::{
    LlmProvider, ProviderConfig, ProviderError,
    ChatMessage, Role, CompletionRequest, CompletionResponse,
    ToolDefinition, ToolCall,
    FinishReason, Usage, UsageTracker,
    OpenAIProvider, ScriptedProvider,
};
