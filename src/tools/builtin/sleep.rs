//! Pause for a bounded number of seconds.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_f64};

pub struct SleepTool {
    max: Duration,
}

impl SleepTool {
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Pause execution for the given number of seconds."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "seconds": { "type": "number", "description": "How long to sleep" }
            },
            "required": ["seconds"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let seconds = require_f64(&params, "seconds")?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ToolError::InvalidParameters(
                "'seconds' must be a non-negative number".into(),
            ));
        }
        if seconds > self.max.as_secs_f64() {
            return Err(ToolError::InvalidParameters(format!(
                "'seconds' may be at most {}",
                self.max.as_secs()
            )));
        }
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        Ok(ToolOutput::text(
            format!("Slept for {} seconds", seconds),
            start.elapsed(),
        ))
    }

    fn requires_sanitization(&self) -> bool {
        false
    }
}
