//! Derives a [`ChatProfile`] from a free-text description of the chatbot.
//!
//! Three independent assistants each see only the user's prompt:
//! an analyzer that picks tools and concepts, a personality writer and an
//! instruction writer. Their answers are stored as-is, apart from parsing
//! the analyzer's `Tools = [...], Concepts = [...]` reply.

use std::sync::Arc;

use tracing::{debug, info};

use super::ChatProfile;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::tools::catalog::ToolkitCatalog;

const CONCEPTS_MARKER: &str = "Concepts = [";

/// Parsed analyzer reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub tools: Vec<String>,
    pub concepts: Vec<String>,
}

/// Parse the analyzer's reply.
///
/// A catalog name counts as selected if it occurs anywhere in the reply, so
/// a concept spelled like a tool name selects that tool too. Concepts are
/// the comma-separated text between `Concepts = [` and the next `]`, with
/// single quotes removed. Without the marker the concept list is `[""]`;
/// an unterminated list runs to the end of the reply.
pub fn parse_analysis(response: &str, catalog: &ToolkitCatalog) -> Analysis {
    let tools = catalog
        .names()
        .filter(|name| response.contains(name))
        .map(String::from)
        .collect();

    let concepts_raw = match response.find(CONCEPTS_MARKER) {
        Some(idx) => {
            let rest = &response[idx + CONCEPTS_MARKER.len()..];
            match rest.find(']') {
                Some(end) => &rest[..end],
                None => rest,
            }
        }
        None => "",
    };
    let cleaned = concepts_raw.trim().replace('\'', "");
    let concepts = cleaned.trim().split(", ").map(String::from).collect();

    Analysis { tools, concepts }
}

fn analyzer_directives(catalog: &ToolkitCatalog) -> Vec<String> {
    vec![
        format!(
            "Based on the prompt provided, decide which tools from {} the chatbot should be equipped with and which concepts it should know.",
            catalog.render()
        ),
        "The output must have the form [Tools = [the tools required], Concepts = [the concepts required]].".to_string(),
        "Output only that structure, with no additional context or words.".to_string(),
    ]
}

const PERSONALITY_DIRECTIVES: &[&str] = &[
    "Based on the kind of chatbot the user wants to make, write a background and personality for that chatbot.",
    "Keep the background and personality concise and in a single paragraph.",
    "Output only the paragraph, written as an introduction of the character. It should start with something like 'You are ...'",
];

const INSTRUCTION_DIRECTIVES: &[&str] = &[
    "Based on the kind of chatbot the user wants to create, write a concise set of instructions describing the tasks and capabilities the chatbot should handle.",
    "Structure the output as one paragraph of actionable items, each describing a specific capability or task.",
    "Output only the paragraph without any additional context or words.",
    "Write it as if you are instructing someone.",
    "For example, if the user wants a math teacher, spell out everything the chatbot must do to fulfil the duties of a math teacher.",
    "Start with 'Instructions are ...'",
];

fn system_prompt<S: AsRef<str>>(directives: &[S]) -> String {
    let mut prompt = String::from("## Instructions\n");
    for directive in directives {
        prompt.push_str("- ");
        prompt.push_str(directive.as_ref());
        prompt.push('\n');
    }
    prompt
}

pub struct ProfileSynthesizer {
    provider: Arc<dyn LlmProvider>,
    catalog: ToolkitCatalog,
}

impl ProfileSynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>, catalog: ToolkitCatalog) -> Self {
        Self { provider, catalog }
    }

    async fn ask(&self, system: String, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(prompt),
        ]);
        let response = self.provider.complete(request).await?;
        Ok(response.content)
    }

    /// Analyzer round trip: selected catalog tools and concept list.
    pub async fn derive_tools_and_concepts(&self, prompt: &str) -> Result<Analysis, LlmError> {
        let reply = self
            .ask(system_prompt(&analyzer_directives(&self.catalog)), prompt)
            .await?;
        debug!(reply = %reply, "Analyzer reply");
        Ok(parse_analysis(&reply, &self.catalog))
    }

    /// Personality paragraph, returned verbatim.
    pub async fn derive_personality(&self, prompt: &str) -> Result<String, LlmError> {
        self.ask(system_prompt(PERSONALITY_DIRECTIVES), prompt).await
    }

    /// Instructions paragraph, returned verbatim.
    pub async fn derive_instructions(&self, prompt: &str) -> Result<String, LlmError> {
        self.ask(system_prompt(INSTRUCTION_DIRECTIVES), prompt).await
    }

    /// Run all three derivations.
    pub async fn synthesize(&self, prompt: &str) -> Result<ChatProfile, LlmError> {
        let Analysis { tools, concepts } = self.derive_tools_and_concepts(prompt).await?;
        let personality = self.derive_personality(prompt).await?;
        let instructions = self.derive_instructions(prompt).await?;
        info!(
            tools = ?tools,
            concepts = concepts.len(),
            model = self.provider.model_name(),
            "Profile synthesized"
        );
        Ok(ChatProfile {
            tools,
            personality,
            instructions,
            concepts,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::llm::CompletionResponse;
    use crate::llm::testing::{ScriptedProvider, system_prompt as request_system};

    fn catalog() -> ToolkitCatalog {
        ToolkitCatalog::standard()
    }

    #[test]
    fn parses_tools_and_concepts() {
        let analysis = parse_analysis(
            "Tools = [Calculator], Concepts = [algebra, geometry]",
            &catalog(),
        );
        assert_eq!(analysis.tools, vec!["Calculator"]);
        assert_eq!(analysis.concepts, vec!["algebra", "geometry"]);
    }

    #[test]
    fn missing_marker_yields_single_empty_concept() {
        let analysis = parse_analysis("I think a Calculator would help.", &catalog());
        assert_eq!(analysis.concepts, vec![String::new()]);
        assert_eq!(analysis.tools, vec!["Calculator"]);
    }

    #[test]
    fn unterminated_concepts_run_to_end() {
        let analysis = parse_analysis("Tools = [], Concepts = [poetry, rhyme", &catalog());
        assert_eq!(analysis.concepts, vec!["poetry", "rhyme"]);
        assert!(analysis.tools.is_empty());
    }

    #[test]
    fn quotes_are_stripped_and_tools_follow_catalog_order() {
        let analysis = parse_analysis(
            "[Tools = ['Wikipedia', 'Calculator', 'Sleep'], Concepts = ['history', 'dates']]",
            &catalog(),
        );
        assert_eq!(analysis.tools, vec!["Calculator", "Wikipedia", "Sleep"]);
        assert_eq!(analysis.concepts, vec!["history", "dates"]);
    }

    #[test]
    fn substring_matches_leak_from_concepts() {
        // "File" inside a concept still selects the File tool.
        let analysis = parse_analysis("Tools = [], Concepts = [File formats]", &catalog());
        assert_eq!(analysis.tools, vec!["File"]);
        assert_eq!(analysis.concepts, vec!["File formats"]);
    }

    #[test]
    fn concepts_split_only_on_comma_space() {
        let analysis = parse_analysis("Concepts = [a,b, c]", &catalog());
        assert_eq!(analysis.concepts, vec!["a,b", "c"]);
    }

    #[tokio::test]
    async fn synthesize_runs_three_independent_calls() {
        let provider = Arc::new(ScriptedProvider::new());
        provider
            .push(CompletionResponse::text(
                "[Tools = [Calculator], Concepts = [algebra, geometry]]",
            ))
            .push(CompletionResponse::text("You are Euclid, a calm math tutor."))
            .push(CompletionResponse::text(
                "Instructions are to solve problems step by step.",
            ));
        let synth = ProfileSynthesizer::new(provider.clone(), catalog());

        let profile = synth.synthesize("I want a math tutor").await.unwrap();
        assert_eq!(
            profile,
            ChatProfile {
                tools: vec!["Calculator".into()],
                personality: "You are Euclid, a calm math tutor.".into(),
                instructions: "Instructions are to solve problems step by step.".into(),
                concepts: vec!["algebra".into(), "geometry".into()],
            }
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_eq!(request.messages.len(), 2);
            assert_eq!(request.messages[1].content, "I want a math tutor");
        }
        assert!(request_system(&requests[0]).contains("'Pandas': "));
        assert!(request_system(&requests[1]).contains("You are ..."));
        assert!(request_system(&requests[2]).contains("Instructions are ..."));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_error(LlmError::Timeout {
            timeout: std::time::Duration::from_secs(1),
        });
        let synth = ProfileSynthesizer::new(provider, catalog());
        assert!(matches!(
            synth.synthesize("anything").await,
            Err(LlmError::Timeout { .. })
        ));
    }
}
