//! OpenAI-compatible `/chat/completions` client
//!
//! Also fits Azure OpenAI, vLLM, Ollama and anything else speaking the
//! same wire format; point `ProviderConfig::base_url` at it.

use super::*;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn rejection(response: Response, model: &str) -> ProviderError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        warn!(status, body = %truncate(&body, 200), "chat completion rejected");

        match status {
            401 | 403 => ProviderError::AuthenticationFailed,
            404 => ProviderError::ModelNotFound(model.to_string()),
            429 => ProviderError::RateLimited { retry_after },
            _ => ProviderError::Api { status, message: body },
        }
    }
}

impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip_all, fields(messages = request.messages.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(&self.config.default_model);
        let body = WireRequest::new(model, &request);

        let mut http = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::rejection(response, model).await);
        }

        let reply: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let usage = reply.usage.unwrap_or_default();
        let choice = reply
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("response carried no choices".into()))?;

        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("none"),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "chat completion received"
        );

        Ok(CompletionResponse {
            id: reply.id,
            model: reply.model,
            content: choice.message.content,
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                .collect(),
            finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

impl<'a> WireRequest<'a> {
    fn new(model: &'a str, request: &'a CompletionRequest) -> Self {
        Self {
            model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: request
                .tools
                .iter()
                .flatten()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.as_deref(),
            tool_calls: msg
                .tool_calls
                .iter()
                .flatten()
                .map(|tc| WireToolCall {
                    id: &tc.id,
                    kind: "function",
                    function: WireCall {
                        name: &tc.name,
                        arguments: &tc.arguments,
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireCall<'a>,
}

#[derive(Serialize)]
struct WireCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireReply,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireReplyCall>,
}

#[derive(Deserialize)]
struct WireReplyCall {
    id: String,
    function: WireReplyFunction,
}

#[derive(Deserialize)]
struct WireReplyFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new(ProviderConfig::openai("sk-test").with_base_url(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn text_answer_is_returned() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({ "model": "gpt-4o" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o",
                "choices": [{
                    "message": { "role": "assistant", "content": "{\"items\": []}" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16 }
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let response = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("parse this receipt")]))
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("{\"items\": []}"));
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.total_tokens, 16);
        assert!(!response.wants_tools());
    }

    #[tokio::test]
    async fn tool_calls_are_returned() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "tools": [{ "type": "function", "function": { "name": "search_stilltasty_com" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-2",
                "model": "gpt-4o",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "search_stilltasty_com", "arguments": "{\"query\":\"milk\"}" }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = CompletionRequest::new(vec![ChatMessage::user("how long does milk keep?")])
            .with_tools(vec![ToolDefinition::new("search_stilltasty_com", "shelf life search")]);
        let response = provider.complete(request).await.unwrap();

        assert!(response.wants_tools());
        assert_eq!(response.tool_calls[0].name, "search_stilltasty_com");
        assert_eq!(response.tool_calls[0].arguments, "{\"query\":\"milk\"}");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage, Usage::default());
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.prompt("hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after: Some(7) }));
    }

    #[tokio::test]
    async fn unauthorized_is_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.prompt("hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed));
    }

    #[test]
    fn tool_turns_serialize_in_wire_shape() {
        let msg = ChatMessage::assistant_tool_calls(
            None,
            vec![ToolCall::new("call_9", "search_americastestkitchen_com", "{}")],
        );
        let json = serde_json::to_value(WireMessage::from(&msg)).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json["content"].is_null());
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "search_americastestkitchen_com");

        let msg = ChatMessage::tool_result("call_9", "no recipes");
        let json = serde_json::to_value(WireMessage::from(&msg)).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_9");
        assert!(json.get("tool_calls").is_none());
    }
}
