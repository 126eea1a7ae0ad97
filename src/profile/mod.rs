//! Chatbot profiles keyed by wallet address.

pub mod synthesizer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::persist::{ensure_dir, write_json_atomic};

pub use synthesizer::{Analysis, ProfileSynthesizer, parse_analysis};

/// Tools, persona and directives for one chatbot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatProfile {
    #[serde(rename = "Tools", default)]
    pub tools: Vec<String>,

    #[serde(rename = "Personality", default)]
    pub personality: String,

    #[serde(rename = "Instructions", default)]
    pub instructions: String,

    #[serde(rename = "Concepts", default)]
    pub concepts: Vec<String>,
}

/// Why a profile could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ProfileLoadError {
    #[error("no profile at {path}")]
    Missing { path: PathBuf },

    #[error("profile at {path} is not valid JSON: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `DB/<address>.json` documents.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, address: &str) -> PathBuf {
        self.dir.join(format!("{}.json", address))
    }

    /// Write the profile for `address`, replacing any earlier one.
    pub fn save(&self, profile: &ChatProfile, address: &str) -> Result<PathBuf, StoreError> {
        ensure_dir(&self.dir)?;
        let path = self.path_for(address);
        write_json_atomic(&path, profile, "chat profile")?;
        info!(address, tools = ?profile.tools, "Profile saved");
        Ok(path)
    }

    /// Read the profile for `address`, distinguishing why it is unavailable.
    pub fn try_load(&self, address: &str) -> Result<ChatProfile, ProfileLoadError> {
        let path = self.path_for(address);
        let data = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProfileLoadError::Missing { path: path.clone() }
            } else {
                ProfileLoadError::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        serde_json::from_str(&data).map_err(|e| ProfileLoadError::Malformed {
            path,
            reason: e.to_string(),
        })
    }

    /// Read the profile for `address`; any failure is logged and yields `None`.
    pub fn load(&self, address: &str) -> Option<ChatProfile> {
        match self.try_load(address) {
            Ok(profile) => Some(profile),
            Err(e @ ProfileLoadError::Missing { .. }) => {
                warn!(address, "{}", e);
                None
            }
            Err(e) => {
                warn!(address, error = %e, "Failed to load profile");
                None
            }
        }
    }
}
