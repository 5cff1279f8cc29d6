//! Code execution sandbox trait.
//!
//! The sandbox is an untrusted, possibly slow remote. Nothing in the engine
//! calls it directly; every call goes through the tool invoker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SandboxError;

/// Language a snippet is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    #[default]
    Python,
    Sql,
}

impl CodeLanguage {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Some(Self::Python),
            "sql" => Some(Self::Sql),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Sql => "sql",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: CodeLanguage,

    /// Files or variables the snippet may reference
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,

    /// Captured stdout or the rendered result
    #[serde(default)]
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Handle to a produced artifact (chart, table export)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

#[async_trait]
pub trait CodeSandbox: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, SandboxError>;

    /// Whether the sandbox is configured at all.
    fn is_configured(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parse() {
        assert_eq!(CodeLanguage::parse("Python"), Some(CodeLanguage::Python));
        assert_eq!(CodeLanguage::parse("py"), Some(CodeLanguage::Python));
        assert_eq!(CodeLanguage::parse("SQL"), Some(CodeLanguage::Sql));
        assert_eq!(CodeLanguage::parse("ruby"), None);
    }

    #[test]
    fn outcome_deserializes_without_optionals() {
        let outcome: ExecutionOutcome =
            serde_json::from_str(r#"{"status":"success","output":"42"}"#).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.output, "42");
        assert!(outcome.error.is_none());
    }
}
