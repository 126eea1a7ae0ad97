//! Google Custom Search JSON API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_str};

const CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

pub struct GoogleSearchTool {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    engine_id: Option<String>,
    max_results: u32,
}

impl GoogleSearchTool {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<SecretString>,
        engine_id: Option<String>,
        max_results: u32,
    ) -> Self {
        Self {
            client,
            api_key,
            engine_id,
            // The API caps `num` at 10.
            max_results: max_results.clamp(1, 10),
        }
    }
}

fn format_items(body: &serde_json::Value) -> String {
    let Some(items) = body["items"].as_array().filter(|a| !a.is_empty()) else {
        return "No results found.".to_string();
    };
    items
        .iter()
        .map(|item| {
            json!({
                "title": item["title"],
                "url": item["link"],
                "description": item["snippet"],
            })
        })
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for GoogleSearchTool {
    fn name(&self) -> &str {
        "google_search"
    }

    fn description(&self) -> &str {
        "Search Google and return the title, URL and description of each result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "max_results": { "type": "integer", "description": "At most 10" }
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
        let (Some(key), Some(cx)) = (&self.api_key, &self.engine_id) else {
            return Err(ToolError::NotConfigured(
                "GOOGLE_API_KEY and GOOGLE_CSE_ID must both be set".into(),
            ));
        };
        let num = params
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n.clamp(1, 10) as u32)
            .unwrap_or(self.max_results);

        let url = format!(
            "{}?key={}&cx={}&q={}&num={}",
            CSE_URL,
            urlencoding::encode(key.expose_secret()),
            urlencoding::encode(cx),
            urlencoding::encode(query),
            num
        );
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Google search failed: {}", e.without_url())))?;
        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Invalid search response: {}", e.without_url())))?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(ToolError::ExecutionFailed(format!(
                "Google returned HTTP {}: {}",
                status, message
            )));
        }

        Ok(ToolOutput::text(format_items(&body), start.elapsed()))
    }
}
