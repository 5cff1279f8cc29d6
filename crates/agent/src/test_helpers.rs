//! Scripted completion providers for tests.
//!
//! Shared with the end-to-end tests in the CLI crate, so this module is
//! public rather than `#[cfg(test)]`.

use docent_core::error::ProviderError;
use docent_core::message::{Message, MessageToolCall};
use docent_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue. Once the
/// script runs out every call fails with `InvalidResponse`. Requests are
/// recorded for inspection.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// A script that may include errors.
    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first calls a tool, then gives a final answer.
    pub fn tool_then_answer(call: MessageToolCall, thought: &str, answer: &str) -> Self {
        Self::new(vec![make_tool_call_response(call, thought), make_text_response(answer)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            requests.push(request);
            requests.len()
        };
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        if responses.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "SequentialMockProvider: no more responses (call #{call})"
            )));
        }
        responses.remove(0)
    }
}

/// A provider that asks for the same tool on every call.
pub struct AlwaysToolProvider {
    tool: String,
    arguments: serde_json::Value,
}

impl AlwaysToolProvider {
    pub fn new(tool: &str, arguments: serde_json::Value) -> Self {
        Self { tool: tool.into(), arguments }
    }
}

#[async_trait::async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if request.tools.is_empty() {
            return Ok(make_text_response("Nothing more I can do."));
        }
        let call = make_tool_call(&self.tool, self.arguments.clone());
        Ok(make_tool_call_response(call, "one more look"))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with one tool call and optional thought content.
pub fn make_tool_call_response(call: MessageToolCall, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_call(thought, call),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
