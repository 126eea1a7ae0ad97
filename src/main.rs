use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use onchain_agents::agent::AgentAssembler;
use onchain_agents::cli::{Driver, Start, TerminalConsole};
use onchain_agents::config::AgentConfig;
use onchain_agents::identity::CredentialStore;
use onchain_agents::llm::{LlmProvider, OllamaProvider};
use onchain_agents::profile::{ProfileLoadError, ProfileStore, ProfileSynthesizer};
use onchain_agents::settings::Settings;
use onchain_agents::tools::ToolkitCatalog;
use onchain_agents::wallet::{EvmBackend, GuardedBackend, WalletBackend};

/// Per-request limit for the web tools.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "onchain-agents", version, about)]
struct Cli {
    /// Load the chatbot bound to this wallet id.
    #[arg(long, conflicts_with_all = ["new", "prompt"])]
    wallet_id: Option<String>,

    /// Create a new wallet and chatbot without asking.
    #[arg(long)]
    new: bool,

    /// Description of the chatbot to create (implies --new).
    #[arg(long)]
    prompt: Option<String>,

    /// Storage root for wallet records, the registry and profiles.
    #[arg(long, env = "AGENT_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Model name served by Ollama.
    #[arg(long, env = "AGENT_MODEL")]
    model: Option<String>,

    /// Network id, e.g. base-sepolia.
    #[arg(long, env = "NETWORK_ID")]
    network: Option<String>,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load or create a chatbot and chat with it (default).
    Chat,
    /// List registered wallet ids.
    Wallets,
    /// Print the stored profile for a public address.
    Profile { address: String },
    /// Inspect or change settings.json.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show every setting.
    List,
    /// Show one setting by dotted path.
    Get { path: String },
    /// Change one setting by dotted path.
    Set { path: String, value: String },
    /// Restore one setting to its default.
    Reset { path: String },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "onchain_agents=debug"
    } else {
        "onchain_agents=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

impl Cli {
    /// Resolve configuration with command-line flags taking precedence.
    fn resolve(&self, settings: &Settings) -> anyhow::Result<AgentConfig> {
        let storage_dir = self
            .storage_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let config = AgentConfig::resolve_with(settings, |key| match key {
            "AGENT_STORAGE_DIR" => storage_dir.clone(),
            "AGENT_MODEL" => self.model.clone(),
            "NETWORK_ID" => self.network.clone(),
            _ => std::env::var(key).ok(),
        })?;
        Ok(config)
    }

    fn start(&self) -> Start {
        if let Some(id) = &self.wallet_id {
            Start::Load(Some(id.clone()))
        } else if self.new || self.prompt.is_some() {
            Start::Create(self.prompt.clone())
        } else {
            Start::Interactive
        }
    }
}

fn open_store(config: &AgentConfig) -> anyhow::Result<CredentialStore> {
    let evm: Arc<dyn WalletBackend> = Arc::new(EvmBackend::new(&config.wallet)?);
    let backend = Arc::new(GuardedBackend::new(evm, config.wallet.policy));
    Ok(CredentialStore::open(config.storage.clone(), backend)?)
}

fn config_command(settings: &mut Settings, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::List => {
            for (key, value) in settings.list() {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Get { path } => match settings.get(&path) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown setting: {}", path),
        },
        ConfigAction::Set { path, value } => {
            settings.set(&path, &value).map_err(anyhow::Error::msg)?;
            let file = Settings::default_path();
            settings.save_to(&file).map_err(anyhow::Error::msg)?;
            println!("{} = {} (saved to {})", path, value, file.display());
        }
        ConfigAction::Reset { path } => {
            settings.reset(&path).map_err(anyhow::Error::msg)?;
            let file = Settings::default_path();
            settings.save_to(&file).map_err(anyhow::Error::msg)?;
            println!("{} reset (saved to {})", path, file.display());
        }
    }
    Ok(())
}

async fn chat(cli: &Cli, config: AgentConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let profiles = ProfileStore::new(config.storage.profile_dir.clone());
    let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(&config.llm));
    let catalog = ToolkitCatalog::standard();
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("building HTTP client")?;

    let synthesizer = ProfileSynthesizer::new(provider.clone(), catalog.clone());
    let assembler = AgentAssembler::new(
        provider,
        catalog,
        config.tools.clone(),
        config.agent.clone(),
        client,
    );
    let driver = Driver::new(
        store,
        profiles,
        synthesizer,
        assembler,
        config.agent.render_markdown,
    );

    let mut console = TerminalConsole::new()?;
    driver.run(&mut console, cli.start()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let mut cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut settings = Settings::load();
    match cli.command.take() {
        Some(Command::Config { action }) => config_command(&mut settings, action),
        Some(Command::Wallets) => {
            let config = cli.resolve(&settings)?;
            for id in open_store(&config)?.registered_ids()? {
                println!("{}", id);
            }
            Ok(())
        }
        Some(Command::Profile { address }) => {
            let config = cli.resolve(&settings)?;
            let store = ProfileStore::new(config.storage.profile_dir);
            match store.try_load(&address) {
                Ok(profile) => {
                    println!("{}", serde_json::to_string_pretty(&profile)?);
                    Ok(())
                }
                Err(ProfileLoadError::Missing { path }) => {
                    anyhow::bail!("No profile stored for {} ({})", address, path.display())
                }
                Err(e) => Err(e.into()),
            }
        }
        Some(Command::Chat) | None => {
            let config = cli.resolve(&settings)?;
            chat(&cli, config).await
        }
    }
}
