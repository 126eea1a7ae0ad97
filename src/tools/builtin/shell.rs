//! Shell command execution behind the command guard.
//!
//! Commands run in the workspace with a cleared environment. Besides the
//! text patterns of [`CommandGuard`], every word is expanded against the
//! filesystem (globs, `~/`, symlinks) and the command is refused when one
//! lands on wallet secrets or on a directory holding them.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

use crate::safety::command_guard::{command_words, is_glob};
use crate::safety::{CommandGuard, GuardVerdict, holds_secrets, is_protected_path, real_path, workspace_root};
use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_str};

/// Variables passed through to commands; API keys and the seed key are not.
const PASSED_ENV: &[&str] = &["PATH", "HOME", "LANG", "TERM"];

/// Upper bound on paths checked per glob word.
const MAX_EXPANSION: usize = 1_000;

pub struct ShellTool {
    workdir: PathBuf,
    timeout: Duration,
    guard: CommandGuard,
}

impl ShellTool {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration, guard: CommandGuard) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
            guard,
        }
    }
}

fn expand(base: &Path, word: &str) -> Vec<PathBuf> {
    if !is_glob(word) {
        return vec![base.join(word)];
    }
    let pattern = if Path::new(word).is_absolute() {
        word.to_string()
    } else {
        format!("{}/{}", glob::Pattern::escape(&base.to_string_lossy()), word)
    };
    match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).take(MAX_EXPANSION).collect(),
        Err(_) => Vec::new(),
    }
}

fn touches_secrets(path: &Path) -> bool {
    if path.symlink_metadata().is_err() {
        return false;
    }
    match real_path(path) {
        Ok(real) => is_protected_path(&real) || (real.is_dir() && holds_secrets(&real)),
        Err(_) => true,
    }
}

/// First word of `command` that reaches wallet secrets on disk when read
/// relative to `workdir`.
fn word_touching_secrets(command: &str, workdir: &Path) -> Option<String> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    command_words(command).into_iter().find(|word| {
        let paths = match (word.as_str(), &home) {
            ("~", Some(home)) => vec![home.clone()],
            (w, Some(home)) if w.starts_with("~/") => expand(home, &w[2..]),
            (w, _) => expand(workdir, w),
        };
        paths.iter().any(|p| touches_secrets(p))
    })
}

fn combine_output(stdout: &[u8], stderr: &[u8], code: Option<i32>) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let mut result = stdout.trim_end().to_string();
    if !stderr.trim().is_empty() {
        if !result.is_empty() {
            result.push_str("\n--- stderr ---\n");
        }
        result.push_str(stderr.trim_end());
    }
    if result.is_empty() {
        result = format!("(exit code: {})", code.unwrap_or(-1));
    } else if code != Some(0) {
        result.push_str(&format!("\n(exit code: {})", code.unwrap_or(-1)));
    }
    result
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_shell_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace directory and return its output. \
         Destructive commands and access to wallet files are refused."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Command line passed to sh -c" }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let command = require_str(&params, "command")?;

        if let GuardVerdict::Block { reason, pack, .. } = self.guard.check(command) {
            return Err(ToolError::Blocked(format!("{} ({})", reason, pack)));
        }
        let workdir = workspace_root(&self.workdir).map_err(|e| {
            ToolError::ExecutionFailed(format!(
                "Workspace {} is unavailable: {}",
                self.workdir.display(),
                e
            ))
        })?;
        if self.guard.is_enabled() {
            if let Some(word) = word_touching_secrets(command, &workdir) {
                tracing::info!(target: "audit", command_guard = "block", path = %word, "Shell path reaches wallet secrets");
                return Err(ToolError::Blocked(format!(
                    "'{}' resolves to wallet records or seed files (wallet_secrets)",
                    word
                )));
            }
        }
        tracing::info!(
            target: "audit",
            wallet_id = %ctx.wallet_id,
            command = command,
            "Running shell command"
        );

        let mut shell = Command::new("sh");
        shell.args(["-c", command]).current_dir(&workdir).env_clear();
        for key in PASSED_ENV {
            if let Some(value) = std::env::var_os(key) {
                shell.env(key, value);
            }
        }
        let child = shell
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to spawn shell: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout(self.timeout))?
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        Ok(ToolOutput::text(
            combine_output(&output.stdout, &output.stderr, output.status.code()),
            start.elapsed(),
        ))
    }
}
