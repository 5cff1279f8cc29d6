//! `execute_code` - run Python or SQL against the uploaded files in the
//! remote sandbox.
//!
//! The sandbox receives the code plus a context listing the files that
//! currently exist (id, name, type, location), so generated code can open
//! raw data directly. A snippet that runs but fails comes back as
//! `invalid_args` so the model can fix its code and try again.

use async_trait::async_trait;
use docent_core::error::ToolError;
use docent_core::sandbox::{CodeLanguage, CodeSandbox, ExecutionRequest, ExecutionStatus};
use docent_core::tool::{Tool, ToolOutput};
use docent_store::SourceOfTruthReconciler;
use std::sync::Arc;
use tracing::debug;

pub struct ExecuteCodeTool {
    sandbox: Arc<dyn CodeSandbox>,
    reconciler: Arc<SourceOfTruthReconciler>,
}

impl ExecuteCodeTool {
    pub fn new(sandbox: Arc<dyn CodeSandbox>, reconciler: Arc<SourceOfTruthReconciler>) -> Self {
        Self { sandbox, reconciler }
    }

    async fn file_context(&self) -> Result<serde_json::Value, ToolError> {
        let files = self.reconciler.list_files().await.map_err(|e| ToolError::UpstreamUnavailable {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let files: Vec<serde_json::Value> = files
            .iter()
            .map(|f| {
                serde_json::json!({
                    "file_id": f.id,
                    "name": f.name,
                    "file_type": f.file_type,
                    "location": f.location,
                })
            })
            .collect();
        Ok(serde_json::json!({ "files": files }))
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        crate::EXECUTE_CODE
    }

    fn description(&self) -> &str {
        "Execute Python or SQL code against the uploaded files and return its output. \
         The code runs in an isolated sandbox; print the values you want to see."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The code to run"
                },
                "language": {
                    "type": "string",
                    "enum": ["python", "sql"],
                    "description": "Language of the code (default python)"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let code = arguments["code"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'code' argument".into()))?;
        let language = match arguments["language"].as_str() {
            None => CodeLanguage::default(),
            Some(lang) => CodeLanguage::parse(lang).ok_or_else(|| {
                ToolError::InvalidArguments(format!("Unsupported language: {lang}"))
            })?,
        };

        let request = ExecutionRequest {
            code: code.to_string(),
            language,
            context: self.file_context().await?,
        };
        debug!(sandbox = self.sandbox.name(), language = language.as_str(), "Executing code");

        let outcome = self
            .sandbox
            .execute(request)
            .await
            .map_err(|e| ToolError::from_sandbox(self.name(), e))?;

        match outcome.status {
            ExecutionStatus::Success => {
                let mut output = outcome.output.clone();
                if let Some(artifact) = &outcome.artifact {
                    output.push_str(&format!("\n[artifact: {artifact}]"));
                }
                Ok(ToolOutput {
                    output,
                    data: serde_json::to_value(&outcome).ok(),
                })
            }
            ExecutionStatus::Error => Err(ToolError::InvalidArguments(format!(
                "code raised an error: {}",
                outcome.error.as_deref().unwrap_or(outcome.output.as_str())
            ))),
        }
    }
}
