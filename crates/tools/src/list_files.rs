//! `list_files` - the files that currently exist, as the object store sees them.

use async_trait::async_trait;
use docent_core::error::ToolError;
use docent_core::tool::{Tool, ToolOutput};
use docent_store::SourceOfTruthReconciler;
use std::sync::Arc;

pub struct ListFilesTool {
    reconciler: Arc<SourceOfTruthReconciler>,
}

impl ListFilesTool {
    pub fn new(reconciler: Arc<SourceOfTruthReconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        crate::LIST_FILES
    }

    fn description(&self) -> &str {
        "List the uploaded files with their type, size and processing status. \
         Optionally filter by file type (e.g. \"csv\")."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_type": {
                    "type": "string",
                    "description": "Only list files with this extension"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let file_type = arguments["file_type"]
            .as_str()
            .map(|t| t.trim().trim_start_matches('.').to_lowercase());

        let mut files = self
            .reconciler
            .list_files()
            .await
            .map_err(|e| ToolError::UpstreamUnavailable {
                tool_name: self.name().to_string(),
                reason: e.to_string(),
            })?;
        if let Some(file_type) = &file_type {
            files.retain(|f| &f.file_type == file_type);
        }

        if files.is_empty() {
            return Ok(ToolOutput {
                output: "No files have been uploaded.".into(),
                data: Some(serde_json::json!({"files": []})),
            });
        }

        let data = serde_json::to_value(&files).map_err(|e| ToolError::Internal {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(ToolOutput::json(serde_json::json!({ "files": data })))
    }
}
