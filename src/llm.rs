//! OpenAI-compatible chat completions client
//!
//! Shared by the planner (tool calling) and the research client (plain text).
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::ResearchError;
use crate::models::ToolCallRequest;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

//
// ================= Conversation types =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub struct CompletionRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<String>,
}

//
// ================= Client =================
//

/// Reusable chat-completions client (connection-pooled)
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Run one chat completion, optionally advertising tools.
    pub async fn complete(&self, request: CompletionRequest<'_>) -> crate::Result<Completion> {
        if !self.config.is_configured() {
            return Err(ResearchError::ConfigError(
                "LLM API key not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );

        let body = WireRequest {
            model: &self.config.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: (!request.tools.is_empty())
                .then(|| request.tools.iter().map(WireTool::from).collect()),
        };

        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling chat completions API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Chat completions request failed: {}", e);
                ResearchError::LlmError(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Chat completions error response: {}", error_text);
            return Err(ResearchError::LlmError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let parsed: WireResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat completions response: {}", e);
            ResearchError::LlmError(format!("parse error: {}", e))
        })?;

        let completion = parse_completion(parsed)?;

        info!(
            tool_calls = completion.tool_calls.len(),
            finish_reason = ?completion.finish_reason,
            "Chat completion received"
        );

        Ok(completion)
    }

    /// Plain text generation with a system prompt.
    pub async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> crate::Result<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        let completion = self
            .complete(CompletionRequest {
                messages: &messages,
                tools: &[],
                max_tokens,
                temperature,
            })
            .await?;

        completion
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ResearchError::LlmError("Empty response from model".to_string()))
    }
}

fn parse_completion(response: WireResponse) -> crate::Result<Completion> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ResearchError::LlmError("No choices in response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest {
            id: call.id,
            name: call.function.name,
            // Unparsable argument text is kept verbatim; the tool's decode step reports it.
            arguments: serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments)),
        })
        .collect();

    Ok(Completion {
        content: choice.message.content,
        tool_calls,
        finish_reason: choice.finish_reason,
    })
}

//
// ================= Wire types =================
//

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        let tool_calls = (!msg.tool_calls.is_empty()).then(|| {
            msg.tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    tool_type: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: match &call.arguments {
                            Value::String(raw) => raw.clone(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect()
        });

        Self {
            role: msg.role,
            content: msg.content.clone(),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            tool_type: "function",
            function: WireFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default)]
    tool_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let messages = vec![
            ChatMessage::system("You are a research assistant"),
            ChatMessage::user("Show me Apple"),
            ChatMessage::assistant_tool_calls(vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "search_companies".to_string(),
                arguments: json!({"query": "Apple"}),
            }]),
            ChatMessage::tool_result("call_1", "[]"),
        ];
        let tools = vec![ToolSpec {
            name: "search_companies".to_string(),
            description: "Search the company database".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let body = WireRequest {
            model: "gpt-4o",
            messages: messages.iter().map(WireMessage::from).collect(),
            max_tokens: 256,
            temperature: 0.2,
            tools: Some(tools.iter().map(WireTool::from).collect()),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(
            value["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"query\":\"Apple\"}"
        );
        assert_eq!(value["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(value["tools"][0]["type"], "function");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "get_company_news", "arguments": "{\"company_name\":\"Tesla\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "get_company_news", "arguments": "not json"}}
                    ]
                }
            }]
        });

        let response: WireResponse = serde_json::from_value(raw).unwrap();
        let completion = parse_completion(response).unwrap();

        assert_eq!(completion.tool_calls.len(), 2);
        assert_eq!(completion.tool_calls[0].arguments["company_name"], "Tesla");
        assert_eq!(
            completion.tool_calls[1].arguments,
            Value::String("not json".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = LlmClient::new(LlmConfig::new("")).unwrap();
        let result = client.generate("system", "hello", 16, 0.0).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().to_lowercase().contains("api key"));
    }
}
