//! Agent assembly and the conversational tool loop.
//!
//! [`AgentAssembler`] turns a [`ChatProfile`] and a live wallet into an
//! [`Agent`]; [`Agent::ask`] runs one user turn to completion.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AgentLoopConfig, ToolsConfig};
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, ToolCall, ToolDefinition};
use crate::profile::ChatProfile;
use crate::tools::builtin::wallet_tools;
use crate::tools::tool::sanitize_output;
use crate::tools::{Tool, ToolContext, ToolkitCatalog, instantiate};
use crate::wallet::Wallet;

/// Directives every agent carries ahead of its profile instructions.
pub const FIXED_DIRECTIVES: [&str; 2] = [
    "Always display the balance when asked.",
    "Everything you do is not a simulation but instead real-life actions.",
];

/// Web search is attached to every agent regardless of its profile.
const ALWAYS_INCLUDED: &str = "Exa";

/// Builds agents from profiles. Created once at startup.
pub struct AgentAssembler {
    provider: Arc<dyn LlmProvider>,
    catalog: ToolkitCatalog,
    tools: ToolsConfig,
    loop_config: AgentLoopConfig,
    client: reqwest::Client,
}

impl AgentAssembler {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        catalog: ToolkitCatalog,
        tools: ToolsConfig,
        loop_config: AgentLoopConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            provider,
            catalog,
            tools,
            loop_config,
            client,
        }
    }

    /// Wallet actions, then the profile's toolkits, then web search.
    fn collect_tools(&self, profile: &ChatProfile, wallet: Arc<dyn Wallet>) -> Vec<Arc<dyn Tool>> {
        let mut tools = wallet_tools(wallet);
        let mut seen = HashSet::new();
        let selected = profile
            .tools
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(ALWAYS_INCLUDED));

        for name in selected {
            if !seen.insert(name) {
                continue;
            }
            if !self.catalog.contains(name) {
                warn!(toolkit = name, "Profile names a toolkit outside the catalog, skipping");
                continue;
            }
            if let Some(instances) = instantiate(name, &self.tools, &self.client) {
                tools.extend(instances);
            }
        }
        tools
    }

    pub fn assemble(&self, profile: &ChatProfile, wallet: Arc<dyn Wallet>) -> Agent {
        let ctx = ToolContext::for_wallet(wallet.wallet_id());
        let tools = self.collect_tools(profile, wallet);

        let mut instructions: Vec<String> =
            FIXED_DIRECTIVES.iter().map(|d| d.to_string()).collect();
        if !profile.instructions.trim().is_empty() {
            instructions.push(profile.instructions.clone());
        }

        info!(
            wallet_id = %ctx.wallet_id,
            tools = tools.len(),
            model = self.provider.model_name(),
            "Agent assembled"
        );
        Agent {
            provider: self.provider.clone(),
            tools,
            description: profile.personality.clone(),
            instructions,
            history: Vec::new(),
            ctx,
            max_tool_iterations: self.loop_config.max_tool_iterations.max(1),
        }
    }
}

/// A conversational agent bound to one wallet.
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Vec<Arc<dyn Tool>>,
    description: String,
    instructions: Vec<String>,
    history: Vec<ChatMessage>,
    ctx: ToolContext,
    max_tool_iterations: u32,
}

impl Agent {
    /// Persona text, taken from the profile's personality.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = String::new();
        if !self.description.trim().is_empty() {
            prompt.push_str(self.description.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str("## Instructions\n");
        for instruction in &self.instructions {
            prompt.push_str("- ");
            prompt.push_str(instruction);
            prompt.push('\n');
        }
        prompt
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    fn request(&self, with_tools: bool) -> CompletionRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(self.history.iter().cloned());
        let request = CompletionRequest::new(messages);
        if with_tools {
            request.with_tools(self.definitions())
        } else {
            request
        }
    }

    /// Run one tool call. Failures come back as text for the model.
    async fn run_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            warn!(tool = %call.name, "Model called an unknown tool");
            return format!("Error: unknown tool '{}'", call.name);
        };

        match tool.execute(call.arguments.clone(), &self.ctx).await {
            Ok(output) => {
                debug!(
                    tool = %call.name,
                    elapsed_ms = output.elapsed.as_millis() as u64,
                    "Tool call finished"
                );
                if tool.requires_sanitization() {
                    sanitize_output(&output.content)
                } else {
                    output.content
                }
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Error: {}", e)
            }
        }
    }

    /// Answer one user message, running any tool calls the model asks for.
    pub async fn ask(&mut self, question: &str) -> Result<String, LlmError> {
        self.history.push(ChatMessage::user(question));

        for round in 0..self.max_tool_iterations {
            let response = self.provider.complete(self.request(true)).await?;
            if !response.has_tool_calls() {
                self.history.push(ChatMessage::assistant(response.content.clone()));
                return Ok(response.content);
            }

            debug!(round, calls = response.tool_calls.len(), "Model requested tools");
            self.history.push(ChatMessage::assistant_with_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let result = self.run_tool(call).await;
                self.history.push(ChatMessage::tool_result(&call.name, result));
            }
        }

        warn!(
            max_tool_iterations = self.max_tool_iterations,
            "Tool budget exhausted, asking for a final answer"
        );
        let response = self.provider.complete(self.request(false)).await?;
        self.history.push(ChatMessage::assistant(response.content.clone()));
        Ok(response.content)
    }
}
