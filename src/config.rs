//! Runtime configuration resolved from env > settings.json > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::settings::{SeedFileMode, Settings};

/// Resolved storage layout.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub wallet_dir: PathBuf,
    pub registry_file: PathBuf,
    pub profile_dir: PathBuf,
    pub seed_file_mode: SeedFileMode,
    pub seed_encryption_key: Option<SecretString>,
}

impl StorageConfig {
    /// Layout rooted at `root` with the default file names.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let defaults = crate::settings::StorageSettings::default();
        let root = root.as_ref().to_path_buf();
        Self {
            wallet_dir: root.join(&defaults.wallet_dir),
            registry_file: root.join(&defaults.registry_file),
            profile_dir: root.join(&defaults.profile_dir),
            seed_file_mode: defaults.seed_file_mode,
            seed_encryption_key: None,
            root,
        }
    }

    /// Path of the shared (compatibility) seed file.
    pub fn shared_seed_file(&self) -> PathBuf {
        self.root.join("my_seed.json")
    }
}

/// Timeout and retry policy for one class of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl CallPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
        }
    }
}

/// Resolved language model configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub policy: CallPolicy,
}

/// Resolved wallet backend configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network_id: String,
    pub rpc_url: String,
    pub token_bytecode_path: Option<PathBuf>,
    pub policy: CallPolicy,
}

/// Resolved toolkit configuration.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub workspace_dir: PathBuf,
    pub shell_timeout: Duration,
    pub command_guard: bool,
    pub max_sleep: Duration,
    pub search_results: u32,
    pub exa_api_key: Option<SecretString>,
    pub google_api_key: Option<SecretString>,
    pub google_cse_id: Option<String>,
}

/// Resolved agent behavior.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub max_tool_iterations: u32,
    pub render_markdown: bool,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub wallet: WalletConfig,
    pub tools: ToolsConfig,
    pub agent: AgentLoopConfig,
}

/// Workspace for the file and shell tools, under the storage root but
/// separate from the wallet files.
pub const DEFAULT_WORKSPACE: &str = "workspace";

/// Public JSON-RPC endpoint for a known network id.
pub fn default_rpc_url(network_id: &str) -> Option<&'static str> {
    match network_id {
        "base-mainnet" => Some("https://mainnet.base.org"),
        "base-sepolia" => Some("https://sepolia.base.org"),
        "ethereum-mainnet" => Some("https://eth.llamarpc.com"),
        "ethereum-sepolia" => Some("https://rpc.sepolia.org"),
        _ => None,
    }
}

impl AgentConfig {
    /// Resolve against the process environment.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Self::resolve_with(settings, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit variable lookup (env var > settings > default).
    pub fn resolve_with<F>(settings: &Settings, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = env("AGENT_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| settings.storage.root.clone());

        let seed_file_mode = match env("SEED_FILE_MODE") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "SEED_FILE_MODE".to_string(),
                reason,
            })?,
            None => settings.storage.seed_file_mode,
        };
        if seed_file_mode == SeedFileMode::Shared {
            tracing::warn!(
                "Shared seed file mode is deprecated: my_seed.json only keeps the most recently saved wallet"
            );
        }

        let storage = StorageConfig {
            wallet_dir: root.join(&settings.storage.wallet_dir),
            registry_file: root.join(&settings.storage.registry_file),
            profile_dir: root.join(&settings.storage.profile_dir),
            seed_file_mode,
            seed_encryption_key: env("SEED_ENCRYPTION_KEY").map(SecretString::from),
            root: root.clone(),
        };

        let llm_timeout = parse_secs(env("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS")?
            .unwrap_or(settings.llm.timeout_secs);
        let llm = LlmConfig {
            base_url: env("OLLAMA_BASE_URL")
                .unwrap_or_else(|| settings.llm.base_url.clone())
                .trim_end_matches('/')
                .to_string(),
            model: env("AGENT_MODEL").unwrap_or_else(|| settings.llm.model.clone()),
            policy: CallPolicy::new(Duration::from_secs(llm_timeout), settings.llm.max_retries),
        };

        let network_id = env("NETWORK_ID").unwrap_or_else(|| settings.wallet.network_id.clone());
        let rpc_url = match env("RPC_URL").or_else(|| settings.wallet.rpc_url.clone()) {
            Some(url) => url,
            None => default_rpc_url(&network_id)
                .map(String::from)
                .ok_or_else(|| ConfigError::Missing {
                    key: format!("RPC_URL (no default endpoint for network '{}')", network_id),
                })?,
        };
        url::Url::parse(&rpc_url).map_err(|e| ConfigError::InvalidValue {
            key: "RPC_URL".to_string(),
            reason: e.to_string(),
        })?;
        let wallet_timeout = parse_secs(env("WALLET_TIMEOUT_SECS"), "WALLET_TIMEOUT_SECS")?
            .unwrap_or(settings.wallet.timeout_secs);
        let wallet = WalletConfig {
            network_id,
            rpc_url,
            token_bytecode_path: env("TOKEN_BYTECODE_PATH")
                .map(PathBuf::from)
                .or_else(|| settings.wallet.token_bytecode_path.clone()),
            policy: CallPolicy::new(
                Duration::from_secs(wallet_timeout),
                settings.wallet.max_retries,
            ),
        };

        let tools = ToolsConfig {
            workspace_dir: settings
                .tools
                .workspace_dir
                .clone()
                .unwrap_or_else(|| root.join(DEFAULT_WORKSPACE)),
            shell_timeout: Duration::from_secs(settings.tools.shell_timeout_secs),
            command_guard: settings.tools.command_guard,
            max_sleep: Duration::from_secs(settings.tools.max_sleep_secs),
            search_results: settings.tools.search_results,
            exa_api_key: env("EXA_API_KEY").map(SecretString::from),
            google_api_key: env("GOOGLE_API_KEY").map(SecretString::from),
            google_cse_id: env("GOOGLE_CSE_ID"),
        };

        let agent = AgentLoopConfig {
            max_tool_iterations: settings.agent.max_tool_iterations.max(1),
            render_markdown: settings.agent.render_markdown,
        };

        Ok(Self {
            storage,
            llm,
            wallet,
            tools,
            agent,
        })
    }
}

fn parse_secs(raw: Option<String>, key: &str) -> Result<Option<u64>, ConfigError> {
    raw.map(|v| {
        v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected whole seconds, got '{}'", v),
        })
    })
    .transpose()
}
