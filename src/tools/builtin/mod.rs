//! Built-in tools that come with the agent.

mod calculator;
mod exa;
mod file;
mod google_search;
pub(crate) mod shell;
mod sleep;
pub mod wallet_actions;
mod wikipedia;

pub use calculator::CalculatorTool;
pub use exa::ExaSearchTool;
pub use file::{ListFilesTool, ReadFileTool, SaveFileTool};
pub use google_search::GoogleSearchTool;
pub use shell::ShellTool;
pub use sleep::SleepTool;
pub use wallet_actions::{
    CreateTokenTool, GetBalanceTool, MintNftTool, TransferAssetTool, wallet_tools,
};
pub use wikipedia::WikipediaTool;
