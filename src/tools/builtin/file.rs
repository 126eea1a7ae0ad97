//! File tools confined to the workspace directory.
//!
//! Paths are resolved relative to the workspace and then canonicalized;
//! the real location must stay inside the workspace and never name wallet
//! secrets, whatever symlinks lie along the way.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::safety::{confine, is_protected_path, real_path, workspace_root};
use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_str};

/// Largest file `read_file` returns.
const MAX_READ_BYTES: u64 = 256 * 1024;

/// A workspace path after symlink resolution.
struct Target {
    path: PathBuf,
    is_root: bool,
}

fn outside(requested: &str) -> ToolError {
    ToolError::InvalidParameters(format!("'{}' is outside the workspace", requested))
}

fn blocked(requested: &str) -> ToolError {
    tracing::info!(target: "audit", file_tool = "block", path = requested);
    ToolError::Blocked(format!(
        "'{}' holds wallet secrets and cannot be accessed",
        requested
    ))
}

fn resolve(root: &Path, requested: &str) -> Result<Target, ToolError> {
    let lexical = confine(root, requested).ok_or_else(|| outside(requested))?;
    let real_root = workspace_root(root).map_err(|e| {
        ToolError::ExecutionFailed(format!("Workspace {} is unavailable: {}", root.display(), e))
    })?;
    let relative = lexical.strip_prefix(root).unwrap_or(&lexical);
    if is_protected_path(relative) {
        return Err(blocked(requested));
    }

    let real = real_path(&real_root.join(relative))
        .map_err(|e| ToolError::Blocked(format!("Cannot resolve '{}': {}", requested, e)))?;
    let Ok(real_relative) = real.strip_prefix(&real_root) else {
        tracing::info!(target: "audit", file_tool = "escape", path = requested);
        return Err(outside(requested));
    };
    if is_protected_path(real_relative) {
        return Err(blocked(requested));
    }
    Ok(Target {
        is_root: real_relative.as_os_str().is_empty(),
        path: real,
    })
}

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": { "type": "string", "description": "Path relative to the workspace" }
            },
            "required": ["file_name"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let name = require_str(&params, "file_name")?;
        let path = resolve(&self.root, name)?.path;

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Cannot read '{}': {}", name, e)))?;
        if meta.len() > MAX_READ_BYTES {
            return Err(ToolError::ExecutionFailed(format!(
                "'{}' is {} bytes; the limit is {}",
                name,
                meta.len(),
                MAX_READ_BYTES
            )));
        }
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Cannot read '{}': {}", name, e)))?;
        Ok(ToolOutput::text(contents, start.elapsed()))
    }
}

pub struct SaveFileTool {
    root: PathBuf,
}

impl SaveFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for SaveFileTool {
    fn name(&self) -> &str {
        "save_file"
    }

    fn description(&self) -> &str {
        "Write text to a file in the workspace, creating parent directories and replacing any existing file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": { "type": "string", "description": "Path relative to the workspace" },
                "contents": { "type": "string", "description": "Text to write" }
            },
            "required": ["file_name", "contents"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let name = require_str(&params, "file_name")?;
        let contents = require_str(&params, "contents")?;
        let Target { path, is_root } = resolve(&self.root, name)?;
        if is_root {
            return Err(ToolError::InvalidParameters("'file_name' is empty".into()));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("Cannot create directory: {}", e)))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Cannot write '{}': {}", name, e)))?;
        Ok(ToolOutput::text(
            format!("Saved {} bytes to {}", contents.len(), name),
            start.elapsed(),
        ))
    }

    fn requires_sanitization(&self) -> bool {
        false
    }
}

pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory (the workspace root by default)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "directory": { "type": "string", "description": "Directory relative to the workspace" }
            }
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let dir_name = params
            .get("directory")
            .and_then(|v| v.as_str())
            .unwrap_or(".");
        let dir = resolve(&self.root, dir_name)?.path;

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Cannot list '{}': {}", dir_name, e)))?;
        let mut names = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_protected_path(Path::new(&name)) {
                continue;
            }
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            names.push(if is_dir { format!("{}/", name) } else { name });
        }
        names.sort();
        Ok(ToolOutput::text(names.join("\n"), start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_read_list() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::default();

        SaveFileTool::new(dir.path())
            .execute(json!({"file_name": "notes/a.txt", "contents": "hello"}), &ctx)
            .await
            .unwrap();
        let read = ReadFileTool::new(dir.path())
            .execute(json!({"file_name": "notes/a.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(read.content, "hello");

        std::fs::create_dir(dir.path().join("wallet_storage")).unwrap();
        let listing = ListFilesTool::new(dir.path())
            .execute(json!({}), &ctx)
            .await
            .unwrap();
        assert_eq!(listing.content, "notes/");
    }

    #[tokio::test]
    async fn refuses_secrets_and_escapes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("my_seed.json"), "{}").unwrap();
        let ctx = ToolContext::default();
        let read = ReadFileTool::new(dir.path());

        assert!(matches!(
            read.execute(json!({"file_name": "my_seed.json"}), &ctx).await,
            Err(ToolError::Blocked(_))
        ));
        assert!(matches!(
            read.execute(json!({"file_name": "wallet_storage/w.json"}), &ctx).await,
            Err(ToolError::Blocked(_))
        ));
        assert!(matches!(
            read.execute(json!({"file_name": "../outside.txt"}), &ctx).await,
            Err(ToolError::InvalidParameters(_))
        ));
        assert!(matches!(
            SaveFileTool::new(dir.path())
                .execute(json!({"file_name": ".env", "contents": "X=1"}), &ctx)
                .await,
            Err(ToolError::Blocked(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_directories_cannot_reach_secrets() {
        let storage = tempfile::tempdir().unwrap();
        let wallets = storage.path().join("wallet_storage");
        std::fs::create_dir(&wallets).unwrap();
        std::fs::write(wallets.join("w.json"), r#"{"seed":"0xSECRET"}"#).unwrap();
        let ctx = ToolContext::default();

        // Workspace is the storage root: the alias resolves to wallet_storage.
        std::os::unix::fs::symlink(&wallets, storage.path().join("alias")).unwrap();
        let read = ReadFileTool::new(storage.path());
        assert!(matches!(
            read.execute(json!({"file_name": "alias/w.json"}), &ctx).await,
            Err(ToolError::Blocked(_))
        ));

        // Dedicated workspace: the alias resolves outside it.
        let workspace = storage.path().join("workspace");
        std::fs::create_dir(&workspace).unwrap();
        std::os::unix::fs::symlink(&wallets, workspace.join("alias")).unwrap();
        let read = ReadFileTool::new(&workspace);
        assert!(matches!(
            read.execute(json!({"file_name": "alias/w.json"}), &ctx).await,
            Err(ToolError::InvalidParameters(_))
        ));
        assert!(
            SaveFileTool::new(&workspace)
                .execute(json!({"file_name": "alias/new.json", "contents": "x"}), &ctx)
                .await
                .is_err()
        );
        assert!(!wallets.join("new.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_inside_the_workspace_still_work() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes").join("a.txt"), "hello").unwrap();
        std::os::unix::fs::symlink(dir.path().join("notes"), dir.path().join("n")).unwrap();

        let read = ReadFileTool::new(dir.path())
            .execute(json!({"file_name": "n/a.txt"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(read.content, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_symlink_is_not_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("planted.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let result = SaveFileTool::new(dir.path())
            .execute(
                json!({"file_name": "link.txt", "contents": "x"}),
                &ToolContext::default(),
            )
            .await;
        assert!(matches!(result, Err(ToolError::Blocked(_))));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn missing_workspace_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("workspace");
        let listing = ListFilesTool::new(&workspace)
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(listing.content, "");
        assert!(workspace.is_dir());
    }
}
