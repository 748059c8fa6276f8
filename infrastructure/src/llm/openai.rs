//! OpenAI-compatible chat-completions gateway.
//!
//! Speaks `POST {base_url}/chat/completions` with function tools, so it works
//! against OpenAI itself and any server exposing the same wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use suna_application::{
    Completion, CompletionRequest, GatewayError, LlmGateway, ModelMessage, ModelRole,
    ModelToolCall, Usage,
};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Aliases resolved before every request.
pub fn default_model_aliases() -> HashMap<String, String> {
    [
        ("gpt-4", "gpt-4o"),
        ("gpt-4-turbo", "gpt-4o"),
        ("claude-3", "claude-3-5-sonnet-20241022"),
        ("claude-3-sonnet", "claude-3-5-sonnet-20241022"),
        ("claude-3-haiku", "claude-3-5-haiku-20241022"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [Value],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: ModelRole,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

fn no_tools(tools: &&[Value]) -> bool {
    tools.is_empty()
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded argument object
    arguments: String,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

fn to_wire(message: &ModelMessage) -> WireMessage {
    WireMessage {
        role: message.role,
        content: Some(message.content.clone()),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.id.clone(),
                kind: function_type(),
                function: WireFunction {
                    name: call.name.clone(),
                    arguments: call.arguments.to_string(),
                },
            })
            .collect(),
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Arguments that are not valid JSON are passed through as a string, so
/// parameter validation reports them to the model.
fn from_wire_call(call: WireToolCall) -> ModelToolCall {
    let arguments = if call.function.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&call.function.arguments)
            .unwrap_or(Value::String(call.function.arguments))
    };
    ModelToolCall {
        id: call.id,
        name: call.function.name,
        arguments,
    }
}

fn into_completion(response: WireResponse) -> Result<Completion, GatewayError> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Err(GatewayError::InvalidResponse("No choices in response".into()));
    };
    let tool_calls: Vec<ModelToolCall> =
        choice.message.tool_calls.into_iter().map(from_wire_call).collect();
    let default_reason = if tool_calls.is_empty() { "stop" } else { "tool_calls" };
    let finish_reason = choice
        .finish_reason
        .unwrap_or_else(|| default_reason.to_string());

    Ok(Completion {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason,
        usage: response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

/// [`LlmGateway`] over an OpenAI-compatible HTTP endpoint.
pub struct OpenAiGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    aliases: HashMap<String, String>,
}

impl OpenAiGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            aliases: default_model_aliases(),
        })
    }

    /// Extra aliases; entries here override the built-in ones.
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases.extend(aliases);
        self
    }

    pub fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.aliases.get(model).map_or(model, String::as_str)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::RequestFailed("API key not configured".into()))?;

        let model = self.resolve_model(&request.model);
        let body = WireRequest {
            model,
            messages: request.messages.iter().map(to_wire).collect(),
            tools: &request.tools,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::ConnectionError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::ModelNotAvailable(model.to_string()));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, model, "Completion request rejected");
            return Err(GatewayError::RequestFailed(format!(
                "API returned status: {status} - {}",
                detail.chars().take(500).collect::<String>()
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let completion = into_completion(parsed)?;

        debug!(
            model,
            duration_ms = start.elapsed().as_millis() as u64,
            tool_calls = completion.tool_calls.len(),
            finish_reason = %completion.finish_reason,
            "Completion received"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alias_resolution() {
        let gateway = OpenAiGateway::new(DEFAULT_BASE_URL, None, Duration::from_secs(5))
            .unwrap()
            .with_aliases(HashMap::from([("fast".to_string(), "gpt-4o-mini".to_string())]));
        assert_eq!(gateway.resolve_model("gpt-4"), "gpt-4o");
        assert_eq!(gateway.resolve_model("claude-3"), "claude-3-5-sonnet-20241022");
        assert_eq!(gateway.resolve_model("fast"), "gpt-4o-mini");
        assert_eq!(gateway.resolve_model("o3-mini"), "o3-mini");
    }

    #[test]
    fn test_request_wire_shape() {
        let message = ModelMessage::assistant_with_calls(
            "",
            vec![ModelToolCall {
                id: "call_1".into(),
                name: "execute".into(),
                arguments: json!({"command": "ls"}),
            }],
        );
        let wire = serde_json::to_value(to_wire(&message)).unwrap();
        assert_eq!(wire["role"], "assistant");
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"command":"ls"}"#);

        let result = serde_json::to_value(to_wire(&ModelMessage::tool_result("call_1", "{}"))).unwrap();
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_1");
    }

    #[test]
    fn test_response_parsing() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "c1", "type": "function", "function": {"name": "read_file", "arguments": "{\"path\":\"a.txt\"}"}},
                        {"id": "c2", "type": "function", "function": {"name": "read_file", "arguments": "{broken"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let completion = into_completion(serde_json::from_value(raw).unwrap()).unwrap();
        assert_eq!(completion.text, "");
        assert_eq!(completion.tool_calls[0].arguments, json!({"path": "a.txt"}));
        assert_eq!(completion.tool_calls[1].arguments, json!("{broken"));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
        assert_eq!(completion.finish_reason, "tool_calls");

        let empty = into_completion(serde_json::from_value(json!({"choices": []})).unwrap());
        assert!(matches!(empty, Err(GatewayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let gateway =
            OpenAiGateway::new("http://127.0.0.1:9", Some("  ".into()), Duration::from_secs(1))
                .unwrap();
        assert!(!gateway.has_api_key());
        let err = gateway
            .complete(CompletionRequest {
                model: "gpt-4o".into(),
                messages: vec![ModelMessage::system("hi")],
                tools: vec![],
                max_tokens: 16,
                temperature: 0.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RequestFailed(_)));
    }
}
