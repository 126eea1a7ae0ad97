//! Interactive console driver.
//!
//! Load or create a wallet-bound chatbot, then answer `Ask:` prompts until
//! the user types `exit`, at which point the wallet is persisted.

mod console;

use std::sync::Arc;

use tracing::{error, warn};

pub use console::{Console, TerminalConsole};

use crate::agent::{Agent, AgentAssembler};
use crate::error::Result;
use crate::identity::CredentialStore;
use crate::profile::{ChatProfile, ProfileStore, ProfileSynthesizer};
use crate::wallet::Wallet;

pub const LOAD_PROMPT: &str = "Do you want to load an existing model? (yes/no): ";
pub const WALLET_ID_PROMPT: &str = "Enter your Wallet ID: ";
pub const INTENT_PROMPT: &str = "How do you want your chatbot to be:";
pub const ASK_PROMPT: &str = "Ask:";

/// How the session picks its wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Start {
    /// Ask the user whether to load or create.
    Interactive,
    /// Load this wallet id, or prompt for one.
    Load(Option<String>),
    /// Create a new wallet, using this intent or prompting for one.
    Create(Option<String>),
}

enum Choice {
    Load,
    Create,
}

pub struct Driver {
    store: CredentialStore,
    profiles: ProfileStore,
    synthesizer: ProfileSynthesizer,
    assembler: AgentAssembler,
    render_markdown: bool,
}

impl Driver {
    pub fn new(
        store: CredentialStore,
        profiles: ProfileStore,
        synthesizer: ProfileSynthesizer,
        assembler: AgentAssembler,
        render_markdown: bool,
    ) -> Self {
        Self {
            store,
            profiles,
            synthesizer,
            assembler,
            render_markdown,
        }
    }

    /// Run one session. Returns when the user exits or input ends.
    pub async fn run(&self, console: &mut dyn Console, start: Start) -> Result<()> {
        let session = match start {
            Start::Interactive => match ask_choice(console)? {
                Some(Choice::Load) => self.load(console, None).await?,
                Some(Choice::Create) => self.create(console, None).await?,
                None => None,
            },
            Start::Load(wallet_id) => self.load(console, wallet_id).await?,
            Start::Create(intent) => self.create(console, intent).await?,
        };
        let Some((wallet, profile)) = session else {
            return Ok(());
        };

        let agent = self.assembler.assemble(&profile, wallet.clone());
        self.chat(console, wallet, agent).await
    }

    async fn load(
        &self,
        console: &mut dyn Console,
        wallet_id: Option<String>,
    ) -> Result<Option<(Arc<dyn Wallet>, ChatProfile)>> {
        let wallet_id = match wallet_id {
            Some(id) => id,
            None => match console.read_line(WALLET_ID_PROMPT)? {
                Some(id) => id.trim().to_string(),
                None => return Ok(None),
            },
        };

        let wallet = self.store.reconstruct(&wallet_id).await?;
        let address = wallet.default_address();
        console.say(&format!("Wallet data for {} successfully fetched.", wallet_id));
        console.say(&format!(
            "Loaded model for Wallet ID: {} and public address {}.",
            wallet_id, address
        ));

        let profile = self.profiles.load(&address).unwrap_or_else(|| {
            warn!(%address, "No usable profile for this wallet, using an empty one");
            ChatProfile::default()
        });
        Ok(Some((wallet, profile)))
    }

    async fn create(
        &self,
        console: &mut dyn Console,
        intent: Option<String>,
    ) -> Result<Option<(Arc<dyn Wallet>, ChatProfile)>> {
        let wallet = self.store.create().await?;
        let address = wallet.default_address();
        console.say(&format!("Created a new model with public address {}.", address));

        let intent = match intent {
            Some(intent) => intent,
            None => match console.read_line(INTENT_PROMPT)? {
                Some(intent) => intent,
                None => {
                    self.save(console, wallet.as_ref())?;
                    return Ok(None);
                }
            },
        };

        let profile = self.synthesizer.synthesize(&intent).await?;
        let path = self.profiles.save(&profile, &address)?;
        console.say(&format!("Data saved to {}", path.display()));
        Ok(Some((wallet, profile)))
    }

    async fn chat(
        &self,
        console: &mut dyn Console,
        wallet: Arc<dyn Wallet>,
        mut agent: Agent,
    ) -> Result<()> {
        loop {
            let Some(line) = console.read_line(ASK_PROMPT)? else {
                self.save(console, wallet.as_ref())?;
                return Ok(());
            };
            let question = line.trim();
            if question.eq_ignore_ascii_case("exit") {
                self.save(console, wallet.as_ref())?;
                console.say("Wallet saved. Exiting...");
                return Ok(());
            }
            if question.is_empty() {
                continue;
            }

            match agent.ask(question).await {
                Ok(answer) if self.render_markdown => console.render(&answer),
                Ok(answer) => console.say(&answer),
                Err(e) => {
                    error!(error = %e, "Model call failed, saving wallet before exit");
                    self.save(console, wallet.as_ref())?;
                    return Err(e.into());
                }
            }
        }
    }

    fn save(&self, console: &mut dyn Console, wallet: &dyn Wallet) -> Result<()> {
        let wallet_id = wallet.wallet_id();
        let newly_registered = self.store.persist(wallet)?;
        console.say(&format!("Wallet data for {} successfully stored.", wallet_id));
        if newly_registered {
            console.say(&format!("Wallet ID {} saved to wallet_ids.txt.", wallet_id));
        } else {
            console.say(&format!("Wallet ID {} already exists in wallet_ids.txt.", wallet_id));
        }
        Ok(())
    }
}

/// Ask yes/no until the answer is valid. `None` when input ends.
fn ask_choice(console: &mut dyn Console) -> Result<Option<Choice>> {
    loop {
        let Some(answer) = console.read_line(LOAD_PROMPT)? else {
            return Ok(None);
        };
        match answer.trim().to_lowercase().as_str() {
            "yes" => return Ok(Some(Choice::Load)),
            "no" => return Ok(Some(Choice::Create)),
            _ => console.say("Invalid input. Please enter 'yes' or 'no'."),
        }
    }
}
