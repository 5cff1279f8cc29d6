//! `search_files` - reconciled search over file contents and metadata.

use async_trait::async_trait;
use docent_core::error::ToolError;
use docent_core::tool::{Tool, ToolOutput};
use docent_store::{SearchStatus, SourceOfTruthReconciler};
use std::sync::Arc;

const MAX_TOP_K: u64 = 50;

pub struct SearchFilesTool {
    reconciler: Arc<SourceOfTruthReconciler>,
    default_top_k: usize,
}

impl SearchFilesTool {
    pub fn new(reconciler: Arc<SourceOfTruthReconciler>) -> Self {
        Self { reconciler, default_top_k: 10 }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        crate::SEARCH_FILES
    }

    fn description(&self) -> &str {
        "Search uploaded files by content and by metadata (name, type). Returns scored fragments \
         for files that currently exist. Use \"*\" to match every file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Words to look for, or a file name"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of results",
                    "minimum": 1,
                    "maximum": MAX_TOP_K
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let top_k = arguments["top_k"]
            .as_u64()
            .map(|k| k.clamp(1, MAX_TOP_K) as usize)
            .unwrap_or(self.default_top_k);

        let outcome = self.reconciler.search(query, top_k).await;
        if let SearchStatus::FailedClosed { reason } = &outcome.status {
            return Err(ToolError::UpstreamUnavailable {
                tool_name: self.name().to_string(),
                reason: reason.clone(),
            });
        }
        let data = serde_json::to_value(&outcome).map_err(|e| ToolError::Internal {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        if outcome.fragments.is_empty() {
            return Ok(ToolOutput {
                output: format!("No files match '{query}'."),
                data: Some(data),
            });
        }
        Ok(ToolOutput::json(data))
    }
}
