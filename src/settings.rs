//! User settings persistence.
//!
//! Stores user preferences in ~/.onchain-agents/settings.json.
//! Settings are loaded with env var > settings.json > default priority
//! (env overlay happens in [`crate::config`]).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// User settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Local storage layout (wallet records, registry, profiles).
    #[serde(default)]
    pub storage: StorageSettings,

    /// Language model backend used by the analyzer and the chat agent.
    #[serde(default)]
    pub llm: LlmSettings,

    /// Chain/wallet backend.
    #[serde(default)]
    pub wallet: WalletSettings,

    /// General-purpose toolkit configuration.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Conversational agent behavior.
    #[serde(default)]
    pub agent: AgentSettings,
}

/// Where the seed encryption output is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeedFileMode {
    /// One encrypted seed file per wallet id.
    #[default]
    PerIdentity,
    /// Single `my_seed.json` shared by every wallet (last writer wins).
    /// Kept for compatibility with existing storage directories.
    Shared,
}

impl std::str::FromStr for SeedFileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per_identity" | "per-identity" | "identity" => Ok(Self::PerIdentity),
            "shared" | "legacy" => Ok(Self::Shared),
            _ => Err(format!(
                "invalid seed file mode '{}', expected: per_identity, shared",
                s
            )),
        }
    }
}

/// Storage layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root directory; every other path is relative to it.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Directory (under root) holding `<wallet_id>.json` records.
    #[serde(default = "default_wallet_dir")]
    pub wallet_dir: String,

    /// Registry file (under root) listing known wallet ids.
    #[serde(default = "default_registry_file")]
    pub registry_file: String,

    /// Directory (under root) holding `<address>.json` profiles.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,

    /// Seed file layout.
    #[serde(default)]
    pub seed_file_mode: SeedFileMode,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_wallet_dir() -> String {
    "wallet_storage".to_string()
}

fn default_registry_file() -> String {
    "wallet_ids.txt".to_string()
}

fn default_profile_dir() -> String {
    "DB".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            wallet_dir: default_wallet_dir(),
            registry_file: default_registry_file(),
            profile_dir: default_profile_dir(),
            seed_file_mode: SeedFileMode::default(),
        }
    }
}

/// Language model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Ollama base URL.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used for both profile synthesis and chat.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Retries after a transient failure (timeouts, connection errors).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    1
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Chain/wallet backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Network id, e.g. "base-sepolia" or "base-mainnet".
    #[serde(default = "default_network_id")]
    pub network_id: String,

    /// JSON-RPC endpoint. Defaults to the public endpoint of `network_id`.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Hex file with ERC-20 creation bytecode (constructor: string, string, uint256).
    #[serde(default)]
    pub token_bytecode_path: Option<PathBuf>,

    /// Timeout for a backend call, including waiting for confirmation.
    #[serde(default = "default_wallet_timeout")]
    pub timeout_secs: u64,

    /// Retries for read-only backend calls.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_network_id() -> String {
    "base-sepolia".to_string()
}

fn default_wallet_timeout() -> u64 {
    180
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            network_id: default_network_id(),
            rpc_url: None,
            token_bytecode_path: None,
            timeout_secs: default_wallet_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// General-purpose toolkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Directory the File and Shell tools are confined to. Defaults to
    /// `<storage root>/workspace`, which holds no wallet files.
    #[serde(default)]
    pub workspace_dir: Option<PathBuf>,

    /// Shell command timeout in seconds.
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,

    /// Whether the shell command guard is enabled.
    #[serde(default = "default_true")]
    pub command_guard: bool,

    /// Upper bound for a single Sleep call.
    #[serde(default = "default_max_sleep")]
    pub max_sleep_secs: u64,

    /// Number of results requested from search tools.
    #[serde(default = "default_search_results")]
    pub search_results: u32,
}

fn default_shell_timeout() -> u64 {
    30
}

fn default_max_sleep() -> u64 {
    300
}

fn default_search_results() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            shell_timeout_secs: default_shell_timeout(),
            command_guard: true,
            max_sleep_secs: default_max_sleep(),
            search_results: default_search_results(),
        }
    }
}

/// Conversational agent behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum model/tool round trips per user question.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Render answers as markdown in the terminal.
    #[serde(default = "default_true")]
    pub render_markdown: bool,
}

fn default_max_tool_iterations() -> u32 {
    8
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            render_markdown: true,
        }
    }
}

impl Settings {
    /// Get the default settings file path (~/.onchain-agents/settings.json).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".onchain-agents")
            .join("settings.json")
    }

    /// Load settings from disk, returning default if not found.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Ignoring malformed settings file: {}", e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Write settings to a specific path, creating the parent directory.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }

    /// Get a setting value by dotted path (e.g., "llm.model").
    pub fn get(&self, path: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;

        for part in path.split('.') {
            current = current.get(part)?;
        }

        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Null => Some("null".to_string()),
            serde_json::Value::Array(arr) => Some(serde_json::to_string(arr).unwrap_or_default()),
            serde_json::Value::Object(obj) => Some(serde_json::to_string(obj).unwrap_or_default()),
        }
    }

    /// Set a setting value by dotted path.
    ///
    /// Returns error if path is invalid or value cannot be parsed.
    pub fn set(&mut self, path: &str, value: &str) -> Result<(), String> {
        let mut json = serde_json::to_value(&self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        let parts: Vec<&str> = path.split('.').collect();
        let Some((final_key, parents)) = parts.split_last() else {
            return Err("Empty path".to_string());
        };

        let mut current = &mut json;
        for part in parents {
            current = current
                .get_mut(*part)
                .ok_or_else(|| format!("Path not found: {}", path))?;
        }

        let obj = current
            .as_object_mut()
            .ok_or_else(|| format!("Parent is not an object: {}", path))?;

        // Infer the type from the existing value
        let new_value = match obj.get(*final_key) {
            Some(serde_json::Value::Bool(_)) => {
                let b = value
                    .parse::<bool>()
                    .map_err(|_| format!("Expected boolean for {}, got '{}'", path, value))?;
                serde_json::Value::Bool(b)
            }
            Some(serde_json::Value::Number(_)) => {
                let n = value
                    .parse::<u64>()
                    .map_err(|_| format!("Expected integer for {}, got '{}'", path, value))?;
                serde_json::Value::Number(n.into())
            }
            Some(serde_json::Value::Null) => {
                serde_json::from_str(value).unwrap_or(serde_json::Value::String(value.to_string()))
            }
            Some(serde_json::Value::String(_)) => serde_json::Value::String(value.to_string()),
            Some(_) => serde_json::from_str(value)
                .map_err(|e| format!("Invalid JSON for {}: {}", path, e))?,
            None => return Err(format!("Path not found: {}", path)),
        };

        obj.insert((*final_key).to_string(), new_value);

        *self =
            serde_json::from_value(json).map_err(|e| format!("Failed to apply setting: {}", e))?;

        Ok(())
    }

    /// Reset a setting to its default value.
    pub fn reset(&mut self, path: &str) -> Result<(), String> {
        let default = Self::default();
        let default_value = default
            .get(path)
            .ok_or_else(|| format!("Unknown setting: {}", path))?;

        self.set(path, &default_value)
    }

    /// List all settings as (path, value) pairs.
    pub fn list(&self) -> Vec<(String, String)> {
        let json = match serde_json::to_value(self) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let mut results = Vec::new();
        collect_settings(&json, String::new(), &mut results);
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

/// Recursively collect settings paths and values.
fn collect_settings(
    value: &serde_json::Value,
    prefix: String,
    results: &mut Vec<(String, String)>,
) {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_settings(val, path, results);
            }
        }
        serde_json::Value::String(s) => results.push((prefix, s.clone())),
        serde_json::Value::Null => results.push((prefix, "null".to_string())),
        other => results.push((prefix, other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_setting() {
        let settings = Settings::default();

        assert_eq!(settings.get("llm.model"), Some("llama3.2".to_string()));
        assert_eq!(settings.get("llm.timeout_secs"), Some("120".to_string()));
        assert_eq!(
            settings.get("storage.seed_file_mode"),
            Some("per_identity".to_string())
        );
        assert_eq!(settings.get("wallet.rpc_url"), Some("null".to_string()));
        assert_eq!(settings.get("nonexistent"), None);
    }

    #[test]
    fn test_set_setting() {
        let mut settings = Settings::default();

        settings.set("llm.model", "qwen3").unwrap();
        assert_eq!(settings.llm.model, "qwen3");

        settings.set("agent.max_tool_iterations", "3").unwrap();
        assert_eq!(settings.agent.max_tool_iterations, 3);

        settings.set("tools.command_guard", "false").unwrap();
        assert!(!settings.tools.command_guard);

        settings.set("storage.seed_file_mode", "shared").unwrap();
        assert_eq!(settings.storage.seed_file_mode, SeedFileMode::Shared);

        settings
            .set("wallet.rpc_url", "http://127.0.0.1:8545")
            .unwrap();
        assert_eq!(
            settings.wallet.rpc_url.as_deref(),
            Some("http://127.0.0.1:8545")
        );
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut settings = Settings::default();
        assert!(settings.set("llm.timeout_secs", "soon").is_err());
        assert!(settings.set("tools.command_guard", "maybe").is_err());
        assert!(settings.set("storage.seed_file_mode", "everywhere").is_err());
        assert!(settings.set("llm.nope", "x").is_err());
        assert!(settings.set("nope.model", "x").is_err());
    }

    #[test]
    fn test_reset_setting() {
        let mut settings = Settings::default();

        settings.llm.model = "custom".to_string();
        settings.reset("llm.model").unwrap();
        assert_eq!(settings.llm.model, "llama3.2");
    }

    #[test]
    fn test_list_settings() {
        let settings = Settings::default();
        let list = settings.list();

        assert!(list.iter().any(|(k, _)| k == "llm.base_url"));
        assert!(list.iter().any(|(k, _)| k == "storage.profile_dir"));
        assert!(list.iter().any(|(k, v)| k == "wallet.network_id" && v == "base-sepolia"));
    }

    #[test]
    fn test_seed_file_mode_parse() {
        assert_eq!("shared".parse::<SeedFileMode>(), Ok(SeedFileMode::Shared));
        assert_eq!(
            "Per-Identity".parse::<SeedFileMode>(),
            Ok(SeedFileMode::PerIdentity)
        );
        assert!("both".parse::<SeedFileMode>().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.llm.base_url = "http://gpu-box:11434".to_string();
        settings.wallet.network_id = "base-mainnet".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.llm.base_url, "http://gpu-box:11434");
        assert_eq!(loaded.wallet.network_id, "base-mainnet");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"llm": {"model": "mistral"}}"#).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.llm.model, "mistral");
        assert_eq!(loaded.llm.timeout_secs, 120);
        assert_eq!(loaded.storage.wallet_dir, "wallet_storage");
    }

    #[test]
    fn test_malformed_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.llm.model, "llama3.2");
    }
}
