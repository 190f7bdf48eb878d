//! Agent - a persona that drives the model through a tool-calling loop

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use grocer_error::{Error, ErrorKind, Result};
use grocer_llm::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, UsageTracker,
};

use crate::tool::{Tool, ToolSet};

/// Limits and model parameters for one agent run
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model override; the provider default otherwise
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Model turns allowed before a final answer is required
    pub max_iterations: usize,
    /// Retries for temporary provider failures
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            max_iterations: 10,
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Outcome of one agent run
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// The final text answer
    pub answer: String,
    /// Full conversation including the final answer
    pub transcript: Vec<ChatMessage>,
    pub iterations: usize,
    pub tool_calls: usize,
    /// The answer stopped at the token limit
    pub truncated: bool,
}

/// An agent persona
#[derive(Debug, Clone)]
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub personality: Option<String>,
    tools: ToolSet,
}

impl Agent {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: String::new(),
            personality: None,
            tools: ToolSet::new(),
        }
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are {}. {}", self.role, self.backstory.trim());
        if let Some(personality) = &self.personality {
            prompt.push_str(&format!("\nYour personality: {}", personality.trim()));
        }
        prompt.push_str(&format!("\n\nYour personal goal is: {}", self.goal.trim()));
        if !self.tools.is_empty() {
            prompt.push_str(
                "\n\nUse the tools available to you when they help. \
                 Cite what you found rather than guessing.",
            );
        }
        prompt.push_str(
            "\n\nWhen you have the final answer, reply with it alone and make no further tool calls.",
        );
        prompt
    }

    /// Drive the model until it answers without calling tools.
    ///
    /// `messages` is the conversation so far (without the system prompt).
    /// Every tool call is answered before the next model turn.
    #[instrument(skip_all, fields(agent = %self.role))]
    pub async fn execute<P: LlmProvider>(
        &self,
        provider: &P,
        settings: &AgentSettings,
        messages: Vec<ChatMessage>,
        usage: &mut UsageTracker,
    ) -> Result<AgentRun> {
        let mut transcript = Vec::with_capacity(messages.len() + 1);
        transcript.push(ChatMessage::system(self.system_prompt()));
        transcript.extend(messages);

        let mut tool_calls = 0;

        for iteration in 1..=settings.max_iterations {
            let mut request =
                CompletionRequest::new(transcript.clone()).with_tools(self.tools.definitions());
            if let Some(model) = &settings.model {
                request = request.with_model(model.clone());
            }
            if let Some(temp) = settings.temperature {
                request = request.with_temperature(temp);
            }
            if let Some(max) = settings.max_tokens {
                request = request.with_max_tokens(max);
            }

            let response = complete_with_retry(provider, request, settings).await?;
            usage.track(&response.model, &response.usage);

            if response.wants_tools() {
                debug!(iteration, calls = response.tool_calls.len(), "model requested tools");
                transcript.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    response.tool_calls.clone(),
                ));
                for call in &response.tool_calls {
                    info!(tool = %call.name, "calling tool");
                    debug!(tool = %call.name, arguments = %call.arguments, "tool arguments");
                    let output = self.tools.invoke(call).await;
                    transcript.push(ChatMessage::tool_result(call.id.clone(), output));
                    tool_calls += 1;
                }
                continue;
            }

            let truncated = response.finish_reason == FinishReason::Length;
            if truncated {
                warn!(iteration, max_tokens = ?settings.max_tokens, "answer was cut off at the token limit");
            }
            let answer = response.content.unwrap_or_default();
            if answer.trim().is_empty() {
                return Err(Error::inference_failed(format!("agent '{}' returned an empty answer", self.role))
                    .with_operation("agent::execute"));
            }

            info!(iterations = iteration, tool_calls, "agent answered");
            debug!(answer = %answer, "final answer");
            transcript.push(ChatMessage::assistant(answer.clone()));
            return Ok(AgentRun {
                answer,
                transcript,
                iterations: iteration,
                tool_calls,
                truncated,
            });
        }

        Err(Error::iteration_limit(self.role.clone(), settings.max_iterations))
    }
}

/// Call the provider, retrying temporary failures with linear backoff.
///
/// Exhausted retries come back as persistent errors.
pub async fn complete_with_retry<P: LlmProvider>(
    provider: &P,
    request: CompletionRequest,
    settings: &AgentSettings,
) -> Result<CompletionResponse> {
    let mut attempt = 0;
    loop {
        let err: Error = match provider.complete(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(e) => e.into(),
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= settings.max_retries {
            warn!(attempts = attempt + 1, error = %err, "giving up on provider");
            return Err(err.persist());
        }

        attempt += 1;
        let delay = retry_delay(&err, settings.retry_backoff, attempt);
        warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying provider call");
        tokio::time::sleep(delay).await;
    }
}

fn retry_delay(err: &Error, backoff: Duration, attempt: u32) -> Duration {
    let linear = backoff * attempt;
    if err.kind() != ErrorKind::RateLimited {
        return linear;
    }
    // Honour the server's hint, but never wait less than the backoff.
    err.context_value("retry_after")
        .and_then(|s| s.parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).max(linear))
        .unwrap_or(linear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grocer_error::ErrorStatus;
    use grocer_llm::{CompletionResponse, ProviderError, Role, ScriptedProvider, ToolCall, ToolDefinition};

    struct ShelfLife;

    #[async_trait]
    impl Tool for ShelfLife {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("shelf_life", "Look up shelf life")
        }

        async fn call(&self, _arguments: &str) -> Result<String> {
            Ok("Milk: 7 days refrigerated".into())
        }
    }

    fn fast() -> AgentSettings {
        AgentSettings {
            retry_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    fn estimator() -> Agent {
        Agent::new("Expiration Date Estimation Expert", "Estimate expiration dates")
            .with_backstory("You know how long food keeps.")
            .with_tool(Arc::new(ShelfLife))
    }

    #[test]
    fn system_prompt_carries_persona() {
        let agent = Agent::new("Recipe Recommender", "Suggest recipes")
            .with_backstory("A chef.")
            .with_personality("Creative");
        let prompt = agent.system_prompt();
        assert!(prompt.starts_with("You are Recipe Recommender. A chef."));
        assert!(prompt.contains("Your personality: Creative"));
        assert!(prompt.contains("Your personal goal is: Suggest recipes"));
        assert!(!prompt.contains("tools available"));
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let provider = ScriptedProvider::new();
        provider
            .push_tool_calls(vec![ToolCall::new("call_1", "shelf_life", r#"{"search_query":"milk"}"#)])
            .push_text(r#"{"items": []}"#);

        let mut usage = UsageTracker::new();
        let run = estimator()
            .execute(&provider, &fast(), vec![ChatMessage::user("estimate")], &mut usage)
            .await
            .unwrap();

        assert_eq!(run.answer, r#"{"items": []}"#);
        assert_eq!(run.iterations, 2);
        assert_eq!(run.tool_calls, 1);
        assert_eq!(usage.total_calls, 2);

        let requests = provider.requests();
        assert_eq!(requests[0].tools.as_ref().map(|t| t.len()), Some(1));
        let second = &requests[1].messages;
        let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_msg.text(), "Milk: 7 days refrigerated");
    }

    #[tokio::test]
    async fn iteration_limit_is_enforced() {
        let provider = ScriptedProvider::new();
        for i in 0..3 {
            provider.push_tool_calls(vec![ToolCall::new(format!("c{}", i), "shelf_life", "{}")]);
        }

        let settings = AgentSettings {
            max_iterations: 3,
            ..fast()
        };
        let err = estimator()
            .execute(&provider, &settings, vec![ChatMessage::user("x")], &mut UsageTracker::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IterationLimit);
        assert_eq!(err.context_value("max_iterations"), Some("3"));
    }

    #[tokio::test]
    async fn answer_cut_at_token_limit_is_flagged() {
        let provider = ScriptedProvider::new();
        provider.push_response(CompletionResponse {
            finish_reason: FinishReason::Length,
            ..CompletionResponse::text("scripted", r#"{"items": [{"item_name": "mi"#)
        });

        let settings = AgentSettings {
            max_tokens: Some(16),
            ..fast()
        };
        let run = estimator()
            .execute(&provider, &settings, vec![ChatMessage::user("x")], &mut UsageTracker::new())
            .await
            .unwrap();

        assert!(run.truncated);
        assert_eq!(provider.requests()[0].max_tokens, Some(16));
    }

    #[tokio::test]
    async fn complete_answer_is_not_flagged() {
        let provider = ScriptedProvider::new();
        provider.push_text(r#"{"items": []}"#);

        let run = estimator()
            .execute(&provider, &fast(), vec![ChatMessage::user("x")], &mut UsageTracker::new())
            .await
            .unwrap();
        assert!(!run.truncated);
        assert_eq!(provider.requests()[0].max_tokens, None);
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let provider = ScriptedProvider::new();
        provider.push_text("   ");

        let err = estimator()
            .execute(&provider, &fast(), vec![ChatMessage::user("x")], &mut UsageTracker::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
    }

    #[tokio::test]
    async fn temporary_failures_are_retried() {
        let provider = ScriptedProvider::new();
        provider
            .push_error(ProviderError::RateLimited { retry_after: None })
            .push_error(ProviderError::Network("reset".into()))
            .push_text("ok");

        let request = CompletionRequest::new(vec![ChatMessage::user("x")]);
        let response = complete_with_retry(&provider, request, &fast()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("ok"));
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_persist() {
        let provider = ScriptedProvider::new();
        for _ in 0..3 {
            provider.push_error(ProviderError::Network("down".into()));
        }

        let request = CompletionRequest::new(vec![ChatMessage::user("x")]);
        let err = complete_with_retry(&provider, request, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailed);
        assert_eq!(err.status(), ErrorStatus::Persistent);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let provider = ScriptedProvider::new();
        provider.push_error(ProviderError::AuthenticationFailed).push_text("never");

        let request = CompletionRequest::new(vec![ChatMessage::user("x")]);
        let err = complete_with_retry(&provider, request, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(provider.remaining(), 1);
    }

    #[test]
    fn rate_limit_hint_extends_delay() {
        let err: Error = ProviderError::RateLimited { retry_after: Some(3) }.into();
        assert_eq!(retry_delay(&err, Duration::from_secs(1), 1), Duration::from_secs(3));

        let err = Error::network_failed("x");
        assert_eq!(retry_delay(&err, Duration::from_millis(10), 2), Duration::from_millis(20));
    }
}
