//! Web search through the Exa API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_str};

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";
const SNIPPET_CHARS: usize = 1_000;

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

pub struct ExaSearchTool {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    num_results: u32,
    endpoint: String,
}

impl ExaSearchTool {
    pub fn new(client: reqwest::Client, api_key: Option<SecretString>, num_results: u32) -> Self {
        Self {
            client,
            api_key,
            num_results: num_results.max(1),
            endpoint: EXA_SEARCH_URL.to_string(),
        }
    }

    fn format(results: &[ExaResult]) -> String {
        if results.is_empty() {
            return "No results found.".to_string();
        }
        results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut entry = format!(
                    "{}. {}\n   {}",
                    i + 1,
                    r.title.as_deref().unwrap_or("(untitled)"),
                    r.url
                );
                if let Some(date) = &r.published_date {
                    entry.push_str(&format!("\n   Published: {}", date));
                }
                if let Some(text) = &r.text {
                    let snippet: String = text.chars().take(SNIPPET_CHARS).collect();
                    entry.push_str(&format!("\n   {}", snippet.trim()));
                }
                entry
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl Tool for ExaSearchTool {
    fn name(&self) -> &str {
        "search_exa"
    }

    fn description(&self) -> &str {
        "Search the web with Exa and return titles, URLs and text snippets of the best matches."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "num_results": { "type": "integer", "description": "How many results to return" }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let query = require_str(&params, "query")?;
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ToolError::NotConfigured("EXA_API_KEY is not set".into()))?;
        let num_results = params
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| n.clamp(1, 25) as u32)
            .unwrap_or(self.num_results);

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key.expose_secret())
            .timeout(Duration::from_secs(30))
            .json(&json!({
                "query": query,
                "numResults": num_results,
                "contents": { "text": { "maxCharacters": SNIPPET_CHARS } }
            }))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Exa request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed(format!(
                "Exa returned HTTP {}: {}",
                status,
                body.trim()
            )));
        }
        let parsed: ExaResponse = resp
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Invalid Exa response: {}", e)))?;

        tracing::debug!(query, results = parsed.results.len(), "Exa search");
        Ok(ToolOutput::text(Self::format(&parsed.results), start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let tool = ExaSearchTool::new(reqwest::Client::new(), None, 5);
        let err = tool
            .execute(json!({"query": "rust"}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured(_)));
    }

    #[test]
    fn formats_results() {
        let parsed: ExaResponse = serde_json::from_value(json!({
            "results": [
                {"title": "Rust", "url": "https://rust-lang.org", "publishedDate": "2024-01-01", "text": "A language"},
                {"url": "https://example.com"}
            ]
        }))
        .unwrap();
        let out = ExaSearchTool::format(&parsed.results);
        assert!(out.starts_with("1. Rust\n   https://rust-lang.org"));
        assert!(out.contains("Published: 2024-01-01"));
        assert!(out.contains("2. (untitled)"));
        assert_eq!(ExaSearchTool::format(&[]), "No results found.");
    }
}
