//! Wikipedia lookup: search for the best-matching page, then fetch its summary.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_str};

const DEFAULT_BASE: &str = "https://en.wikipedia.org";
const USER_AGENT: &str = concat!("onchain-agents/", env!("CARGO_PKG_VERSION"));

pub struct WikipediaTool {
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE.to_string(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, ToolError> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Wikipedia request failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Wikipedia returned HTTP {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Invalid Wikipedia response: {}", e)))
    }

    async fn best_title(&self, query: &str) -> Result<Option<String>, ToolError> {
        let url = format!(
            "{}/w/api.php?action=query&list=search&format=json&srlimit=1&srsearch={}",
            self.base_url,
            urlencoding::encode(query)
        );
        let body = self.get_json(&url).await?;
        Ok(body["query"]["search"][0]["title"].as_str().map(String::from))
    }
}

fn format_summary(summary: &serde_json::Value) -> String {
    let title = summary["title"].as_str().unwrap_or("");
    let extract = summary["extract"].as_str().unwrap_or("");
    let mut out = format!("{}\n\n{}", title, extract.trim());
    if let Some(page) = summary["content_urls"]["desktop"]["page"].as_str() {
        out.push_str(&format!("\n\nSource: {}", page));
    }
    out
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "search_wikipedia"
    }

    fn description(&self) -> &str {
        "Look up a topic on Wikipedia and return the summary of the best-matching article."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Topic to look up" }
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

        let Some(title) = self.best_title(query).await? else {
            return Ok(ToolOutput::text(
                format!("No Wikipedia article found for '{}'.", query),
                start.elapsed(),
            ));
        };
        let url = format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url,
            urlencoding::encode(&title.replace(' ', "_"))
        );
        let summary = self.get_json(&url).await?;
        Ok(ToolOutput::text(format_summary(&summary), start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_format() {
        let out = format_summary(&json!({
            "title": "Alan Turing",
            "extract": " English mathematician. ",
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Alan_Turing"}}
        }));
        assert_eq!(
            out,
            "Alan Turing\n\nEnglish mathematician.\n\nSource: https://en.wikipedia.org/wiki/Alan_Turing"
        );
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let tool = WikipediaTool::new(reqwest::Client::new());
        assert!(matches!(
            tool.execute(json!({}), &ToolContext::default()).await,
            Err(ToolError::InvalidParameters(_))
        ));
    }
}
