//! Scripted provider for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmProvider, Role};
use crate::error::LlmError;

type Responder = Box<dyn Fn(&CompletionRequest) -> CompletionResponse + Send + Sync>;

/// Pops queued responses; falls back to a responder once the queue is empty.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request by inspecting it.
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> CompletionResponse + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    pub fn push(&self, response: CompletionResponse) -> &Self {
        self.queue.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn push_error(&self, error: LlmError) -> &Self {
        self.queue.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// System prompt of a request, or an empty string.
pub fn system_prompt(request: &CompletionRequest) -> &str {
    request
        .messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let queued = self.queue.lock().unwrap().pop_front();
        let result = match (queued, &self.responder) {
            (Some(result), _) => result,
            (None, Some(responder)) => Ok(responder(&request)),
            (None, None) => Err(LlmError::RequestFailed {
                message: "script exhausted".into(),
            }),
        };
        self.requests.lock().unwrap().push(request);
        result
    }
}
