//! Error types for the docent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all docent operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Sandbox errors ---
    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Failures from the object store, the content index, or the graph store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage operation failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    #[error("Sandbox not configured")]
    NotConfigured,

    #[error("Sandbox unreachable: {0}")]
    Unreachable(String),

    #[error("Sandbox rejected the request: {0}")]
    Rejected(String),
}

/// The closed set of failures a tool invocation can report.
///
/// Adapters may fail in many ways; the invoker folds every one of them into
/// one of these five kinds before the reasoning loop sees it.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Upstream unavailable for {tool_name}: {reason}")]
    UpstreamUnavailable { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool failed: {tool_name}: {reason}")]
    Internal { tool_name: String, reason: String },
}

/// Wire label for a [`ToolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    NotFound,
    InvalidArgs,
    UpstreamUnavailable,
    Timeout,
    Internal,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgs => "invalid_args",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::NotFound(_) => ToolErrorKind::NotFound,
            Self::InvalidArguments(_) => ToolErrorKind::InvalidArgs,
            Self::UpstreamUnavailable { .. } => ToolErrorKind::UpstreamUnavailable,
            Self::Timeout { .. } => ToolErrorKind::Timeout,
            Self::Internal { .. } => ToolErrorKind::Internal,
        }
    }

    /// Map a storage failure raised inside a tool adapter.
    pub fn from_storage(tool_name: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::Unavailable(reason) => Self::UpstreamUnavailable {
                tool_name: tool_name.to_string(),
                reason,
            },
            StorageError::Failed(reason) => Self::Internal {
                tool_name: tool_name.to_string(),
                reason,
            },
        }
    }

    /// Map a sandbox failure raised inside a tool adapter.
    pub fn from_sandbox(tool_name: &str, err: SandboxError) -> Self {
        match err {
            SandboxError::Rejected(reason) => Self::InvalidArguments(reason),
            other => Self::UpstreamUnavailable {
                tool_name: tool_name.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
