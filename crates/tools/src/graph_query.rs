//! `query_graph` - entity and relation lookup in the knowledge graph.

use async_trait::async_trait;
use docent_core::error::ToolError;
use docent_core::storage::GraphStore;
use docent_core::tool::{Tool, ToolOutput};
use std::sync::Arc;

pub struct GraphQueryTool {
    graph: Arc<dyn GraphStore>,
}

impl GraphQueryTool {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Tool for GraphQueryTool {
    fn name(&self) -> &str {
        crate::QUERY_GRAPH
    }

    fn description(&self) -> &str {
        "Look up entities (people, organizations, products, ...) extracted from the uploaded \
         files and the relations between them."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Entity name fragment or entity kind"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let pattern = arguments["pattern"]
            .as_str()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?;

        let subgraph = self
            .graph
            .query(pattern)
            .await
            .map_err(|e| ToolError::from_storage(self.name(), e))?;

        if subgraph.is_empty() {
            return Ok(ToolOutput::text(format!("No entities match '{pattern}'.")));
        }
        let data = serde_json::to_value(&subgraph).map_err(|e| ToolError::Internal {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(ToolOutput::json(data))
    }
}
