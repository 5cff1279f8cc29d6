//! Agent kinds and execution modes.

use serde::{Deserialize, Serialize};

/// The specialized agents a query can be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Writes and runs code against the raw data in the sandbox
    Execution,
    /// Writes SQL for the user; never executes it
    StructuredQuery,
    /// Finds and summarizes documents
    Retrieval,
    /// Looks for patterns and statistics in retrieved context
    Insight,
    /// Drafts reports and summaries
    Writer,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Execution,
        AgentKind::StructuredQuery,
        AgentKind::Retrieval,
        AgentKind::Insight,
        AgentKind::Writer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::StructuredQuery => "structured_query",
            Self::Retrieval => "retrieval",
            Self::Insight => "insight",
            Self::Writer => "writer",
        }
    }

    /// Parse an agent name. Accepts the canonical names plus the common
    /// aliases clients send ("python", "sql", "researcher", "analyst").
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "execution" | "python" | "code" => Some(Self::Execution),
            "structured_query" | "sql" | "query" => Some(Self::StructuredQuery),
            "retrieval" | "researcher" | "search" => Some(Self::Retrieval),
            "insight" | "analyst" | "analysis" => Some(Self::Insight),
            "writer" | "report" => Some(Self::Writer),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether generated code should be run or only shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Code is run in the sandbox and the result reported
    #[default]
    Run,
    /// Code is returned as text, never executed
    ShowOnly,
}
