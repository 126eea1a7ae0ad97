//! Ollama chat backend (`POST /api/chat`, non-streaming, native tool calls).

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ToolCall};
use crate::config::{CallPolicy, LlmConfig};
use crate::error::LlmError;
use crate::retry::with_retry;

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    policy: CallPolicy,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            policy: config.policy,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_json).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        if !request.tools.is_empty() {
            body["tools"] = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
        }
        if let Some(temperature) = request.temperature {
            body["options"] = json!({ "temperature": temperature });
        }
        body
    }

    async fn send_once(&self, body: &Value) -> Result<CompletionResponse, LlmError> {
        let resp = self
            .client
            .post(self.chat_url())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Unavailable {
                        url: self.base_url.clone(),
                        message: e.to_string(),
                    }
                } else {
                    LlmError::RequestFailed {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                message: format!("HTTP {}: {}", status, text.trim()),
            });
        }

        let json: Value = resp.json().await.map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;
        parse_chat_response(&json)
    }
}

fn message_json(m: &ChatMessage) -> Value {
    let mut v = json!({ "role": m.role, "content": m.content });
    if !m.tool_calls.is_empty() {
        v["tool_calls"] = m
            .tool_calls
            .iter()
            .map(|c| json!({ "function": { "name": c.name, "arguments": c.arguments } }))
            .collect();
    }
    if let Some(name) = &m.tool_name {
        v["tool_name"] = json!(name);
    }
    v
}

/// Extract content and tool calls from an `/api/chat` response body.
fn parse_chat_response(json: &Value) -> Result<CompletionResponse, LlmError> {
    if let Some(err) = json["error"].as_str() {
        return Err(LlmError::RequestFailed {
            message: err.to_string(),
        });
    }
    let message = json.get("message").ok_or_else(|| LlmError::ParseError {
        message: "missing 'message' field".into(),
    })?;

    let content = message["content"].as_str().unwrap_or("").to_string();
    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let function = &c["function"];
                    let name = function["name"].as_str()?.to_string();
                    // Some models emit arguments as a JSON string.
                    let arguments = match &function["arguments"] {
                        Value::String(s) => serde_json::from_str(s).unwrap_or(json!({})),
                        Value::Null => json!({}),
                        other => other.clone(),
                    };
                    Some(ToolCall { name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        tool_calls,
    })
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.request_body(&request);
        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat request"
        );
        with_retry("chat", self.policy, || self.send_once(&body)).await
    }
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}
