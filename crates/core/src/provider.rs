//! Provider trait - the abstraction over the completion service.
//!
//! A Provider takes the system instructions, the transcript so far, and the
//! tools an agent may call, and answers with either a final answer or a
//! tool call. It is the one dependency the reasoning loop cannot do without.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// System prompt followed by the transcript
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.2
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What the model decided to do this step.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Done: answer the user with this text
    FinalAnswer(String),

    /// Call one tool; `thought` is any text the model emitted alongside it
    ToolCall { thought: String, call: MessageToolCall },
}

impl ProviderResponse {
    /// Reduce the response to a single decision.
    ///
    /// When the model asks for several tools at once only the first is
    /// honoured; the rest are dropped and the model can ask again next step.
    pub fn decision(&self) -> Decision {
        match self.message.tool_calls.first() {
            Some(call) => {
                if self.message.tool_calls.len() > 1 {
                    tracing::warn!(
                        requested = self.message.tool_calls.len(),
                        kept = %call.name,
                        "Model requested multiple tool calls, keeping the first"
                    );
                }
                Decision::ToolCall {
                    thought: self.message.content.clone(),
                    call: call.clone(),
                }
            }
            None => Decision::FinalAnswer(self.message.content.clone()),
        }
    }
}

/// The core Provider trait.
///
/// Every completion backend implements this trait. The reasoning loop calls
/// `complete()` without knowing which provider is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "azure").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check - can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
