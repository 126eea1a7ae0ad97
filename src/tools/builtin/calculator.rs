//! Arithmetic tool.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_f64, require_str};

/// Largest n accepted by `factorial` (21! overflows u64).
const MAX_FACTORIAL: u64 = 20;

pub struct CalculatorTool;

fn as_whole(value: f64, key: &str) -> Result<u64, ToolError> {
    if value.fract() != 0.0 || value < 0.0 {
        return Err(ToolError::InvalidParameters(format!(
            "'{}' must be a non-negative integer",
            key
        )));
    }
    Ok(value as u64)
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn evaluate(operation: &str, params: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
    let result = match operation {
        "add" => json!(require_f64(params, "a")? + require_f64(params, "b")?),
        "subtract" => json!(require_f64(params, "a")? - require_f64(params, "b")?),
        "multiply" => json!(require_f64(params, "a")? * require_f64(params, "b")?),
        "divide" => {
            let b = require_f64(params, "b")?;
            if b == 0.0 {
                return Err(ToolError::ExecutionFailed(
                    "Division by zero is undefined".into(),
                ));
            }
            json!(require_f64(params, "a")? / b)
        }
        "exponentiate" => json!(require_f64(params, "a")?.powf(require_f64(params, "b")?)),
        "factorial" => {
            let n = as_whole(require_f64(params, "a")?, "a")?;
            if n > MAX_FACTORIAL {
                return Err(ToolError::ExecutionFailed(format!(
                    "factorial is limited to n <= {}",
                    MAX_FACTORIAL
                )));
            }
            json!((1..=n).product::<u64>())
        }
        "is_prime" => json!(is_prime(as_whole(require_f64(params, "a")?, "a")?)),
        "square_root" => {
            let a = require_f64(params, "a")?;
            if a < 0.0 {
                return Err(ToolError::ExecutionFailed(
                    "Square root of a negative number is undefined".into(),
                ));
            }
            json!(a.sqrt())
        }
        other => {
            return Err(ToolError::InvalidParameters(format!(
                "unknown operation '{}'",
                other
            )));
        }
    };
    if result.is_null() {
        return Err(ToolError::ExecutionFailed("result is not a finite number".into()));
    }
    Ok(result)
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform a calculation. Binary operations (add, subtract, multiply, divide, \
         exponentiate) use 'a' and 'b'; factorial, is_prime and square_root use 'a' only."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide", "exponentiate",
                             "factorial", "is_prime", "square_root"]
                },
                "a": { "type": "number", "description": "First operand" },
                "b": { "type": "number", "description": "Second operand (binary operations)" }
            },
            "required": ["operation", "a"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let operation = require_str(&params, "operation")?;
        let result = evaluate(operation, &params)?;
        let output = json!({ "operation": operation, "result": result });
        Ok(ToolOutput::text(output.to_string(), start.elapsed()))
    }

    fn requires_sanitization(&self) -> bool {
        false
    }
}
