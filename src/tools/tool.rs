//! The tool abstraction shared by wallet actions and the general toolkit.

use std::time::Duration;

use async_trait::async_trait;

use crate::llm::ToolDefinition;

/// Errors a tool can report back to the agent loop.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Blocked: {0}")]
    Blocked(String),

    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            content: content.into(),
            elapsed,
        }
    }
}

/// Per-call context.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Wallet id of the agent making the call, for audit logs.
    pub wallet_id: String,
}

impl ToolContext {
    pub fn for_wallet(wallet_id: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the parameters object.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;

    /// Output comes from outside the process (web pages, shell output) and
    /// is cleaned before it is shown to the model.
    fn requires_sanitization(&self) -> bool {
        true
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Longest tool output handed back to the model.
pub const MAX_OUTPUT_CHARS: usize = 8_000;

/// Strip control characters and cap the length of untrusted output.
pub fn sanitize_output(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    if cleaned.chars().count() <= MAX_OUTPUT_CHARS {
        return cleaned;
    }
    let mut truncated: String = cleaned.chars().take(MAX_OUTPUT_CHARS).collect();
    truncated.push_str("\n[output truncated]");
    truncated
}

/// Required string parameter.
pub fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{}'", key)))
}

/// Required numeric parameter; numeric strings are accepted since models
/// often quote numbers.
pub fn require_f64(params: &serde_json::Value, key: &str) -> Result<f64, ToolError> {
    match params.get(key) {
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ToolError::InvalidParameters(format!("'{}' is not a number", key))),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| ToolError::InvalidParameters(format!("'{}' is not a number", key))),
        _ => Err(ToolError::InvalidParameters(format!("missing '{}'", key))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn require_helpers() {
        let params = json!({"a": "x", "n": 2.5, "s": " 3 "});
        assert_eq!(require_str(&params, "a").unwrap(), "x");
        assert!(require_str(&params, "missing").is_err());
        assert_eq!(require_f64(&params, "n").unwrap(), 2.5);
        assert_eq!(require_f64(&params, "s").unwrap(), 3.0);
        assert!(require_f64(&params, "a").is_err());
    }

    #[test]
    fn sanitize_strips_control_and_truncates() {
        assert_eq!(sanitize_output("a\u{7}b\nc"), "ab\nc");
        let long = "x".repeat(MAX_OUTPUT_CHARS + 10);
        let out = sanitize_output(&long);
        assert!(out.ends_with("[output truncated]"));
        assert!(out.len() < long.len() + 20);
    }
}
