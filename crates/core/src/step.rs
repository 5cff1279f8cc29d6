//! Agent steps and the per-turn transcript.
//!
//! A step is one pass through the reasoning loop: what the model said, the
//! tool it asked for (at most one), and what came back. The transcript is the
//! append-only list of steps for a single turn and is dropped with the turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::error::{ToolError, ToolErrorKind};

/// A tool invocation as requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub call_id: String,
    pub tool: String,
    pub arguments: serde_json::Value,
}

/// The success payload of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub call_id: String,
    pub tool: String,

    /// Text fed back to the model
    pub output: String,

    /// Optional structured payload for callers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    pub duration_ms: u64,
}

/// What a step's invocation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { output: String },
    Error { kind: ToolErrorKind, message: String },
}

impl StepOutcome {
    pub fn from_result(result: &std::result::Result<Observation, ToolError>) -> Self {
        match result {
            Ok(obs) => Self::Success { output: obs.output.clone() },
            Err(e) => Self::Error { kind: e.kind(), message: e.to_string() },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// One iteration of a reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub index: usize,
    pub reasoning: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation: Option<Invocation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StepOutcome>,

    pub timestamp: DateTime<Utc>,
}

/// Append-only step log shared between the loop and the tool invoker.
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    steps: Arc<Mutex<Vec<AgentStep>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, assigning it the next index. Returns that index.
    pub fn record(
        &self,
        reasoning: impl Into<String>,
        invocation: Option<Invocation>,
        outcome: Option<StepOutcome>,
    ) -> usize {
        let mut steps = self.steps.lock().unwrap_or_else(|e| e.into_inner());
        let index = steps.len();
        steps.push(AgentStep {
            index,
            reasoning: reasoning.into(),
            invocation,
            outcome,
            timestamp: Utc::now(),
        });
        index
    }

    /// Snapshot of every step so far.
    pub fn steps(&self) -> Vec<AgentStep> {
        self.steps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.steps.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
