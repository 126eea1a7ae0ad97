//! Console chatbots bound to an on-chain wallet.
//!
//! A chatbot is created from a free-text description: the model picks its
//! toolkits and writes its persona and instructions, the result is stored
//! under the wallet's public address, and the wallet credentials are kept
//! locally so the same chatbot can be reloaded by wallet id.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod llm;
mod persist;
pub mod profile;
pub mod retry;
pub mod safety;
pub mod settings;
pub mod tools;
pub mod wallet;

pub use error::{Error, Result};
