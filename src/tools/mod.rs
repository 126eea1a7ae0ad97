//! Tools the agent can call.
//!
//! [`catalog`] names what a profile may select; [`instantiate`] turns one of
//! those names into live [`Tool`]s.

pub mod builtin;
pub mod catalog;
pub mod tool;

use std::sync::Arc;

pub use catalog::{CatalogEntry, ToolkitCatalog};
pub use tool::{Tool, ToolContext, ToolError, ToolOutput};

use crate::config::ToolsConfig;
use crate::safety::CommandGuard;
use builtin::{
    CalculatorTool, ExaSearchTool, GoogleSearchTool, ListFilesTool, ReadFileTool, SaveFileTool,
    ShellTool, SleepTool, WikipediaTool,
};

/// Live tools for one catalog name, or `None` when this build has no
/// implementation for it.
pub fn instantiate(
    name: &str,
    config: &ToolsConfig,
    client: &reqwest::Client,
) -> Option<Vec<Arc<dyn Tool>>> {
    let tools: Vec<Arc<dyn Tool>> = match name {
        "Calculator" => vec![Arc::new(CalculatorTool)],
        "Exa" => vec![Arc::new(ExaSearchTool::new(
            client.clone(),
            config.exa_api_key.clone(),
            config.search_results,
        ))],
        "File" => vec![
            Arc::new(ReadFileTool::new(&config.workspace_dir)),
            Arc::new(SaveFileTool::new(&config.workspace_dir)),
            Arc::new(ListFilesTool::new(&config.workspace_dir)),
        ],
        "GoogleSearch" => vec![Arc::new(GoogleSearchTool::new(
            client.clone(),
            config.google_api_key.clone(),
            config.google_cse_id.clone(),
            config.search_results,
        ))],
        "Shell" => vec![Arc::new(ShellTool::new(
            &config.workspace_dir,
            config.shell_timeout,
            CommandGuard::new(config.command_guard),
        ))],
        "Wikipedia" => vec![Arc::new(WikipediaTool::new(client.clone()))],
        "Sleep" => vec![Arc::new(SleepTool::new(config.max_sleep))],
        "Pandas" => {
            tracing::warn!(toolkit = name, "No dataframe toolkit in this build, skipping");
            return None;
        }
        other => {
            tracing::warn!(toolkit = other, "Unknown toolkit name, skipping");
            return None;
        }
    };
    Some(tools)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn tools_config(workspace: &std::path::Path) -> ToolsConfig {
        ToolsConfig {
            workspace_dir: workspace.to_path_buf(),
            shell_timeout: Duration::from_secs(5),
            command_guard: true,
            max_sleep: Duration::from_secs(10),
            search_results: 3,
            exa_api_key: None,
            google_api_key: None,
            google_cse_id: None,
        }
    }

    fn names(tools: &[Arc<dyn Tool>]) -> Vec<String> {
        tools.iter().map(|t| t.name().to_string()).collect()
    }

    #[test]
    fn every_implemented_catalog_name_instantiates() {
        let dir = tempfile::tempdir().unwrap();
        let config = tools_config(dir.path());
        let client = reqwest::Client::new();
        let catalog = ToolkitCatalog::standard();
        for name in catalog.names() {
            let tools = instantiate(name, &config, &client);
            assert_eq!(tools.is_none(), name == "Pandas", "{}", name);
        }
        assert_eq!(
            names(&instantiate("File", &config, &client).unwrap()),
            vec!["read_file", "save_file", "list_files"]
        );
    }

    #[test]
    fn unknown_names_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = tools_config(dir.path());
        assert!(instantiate("Teleport", &config, &reqwest::Client::new()).is_none());
        assert!(instantiate("calculator", &config, &reqwest::Client::new()).is_none());
    }
}
