//! `route_to_agent` - the orchestrator's only tool.
//!
//! The tool does not dispatch anything itself; it validates the chosen
//! agent and hands the decision back as structured data. The orchestrator
//! reads it from the observation.

use async_trait::async_trait;
use docent_core::agent::AgentKind;
use docent_core::error::ToolError;
use docent_core::tool::{Tool, ToolOutput};

pub struct RouteToAgentTool;

#[async_trait]
impl Tool for RouteToAgentTool {
    fn name(&self) -> &str {
        crate::ROUTE_TO_AGENT
    }

    fn description(&self) -> &str {
        "Hand the user's request to the specialist agent best suited to answer it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let agents: Vec<&str> = AgentKind::ALL.iter().map(|k| k.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "enum": agents,
                    "description": "execution: run code on the data; \
                                    structured_query: write SQL; retrieval: find documents; \
                                    insight: analyze patterns; writer: draft reports"
                },
                "query": {
                    "type": "string",
                    "description": "The request to forward, rephrased if helpful"
                }
            },
            "required": ["agent"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let name = arguments["agent"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'agent' argument".into()))?;
        let agent = AgentKind::parse(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("Unknown agent: {name}")))?;

        let mut decision = serde_json::json!({ "agent": agent });
        if let Some(query) = arguments["query"].as_str().filter(|q| !q.trim().is_empty()) {
            decision["query"] = serde_json::Value::String(query.to_string());
        }
        Ok(ToolOutput {
            output: format!("Routing to the {agent} agent."),
            data: Some(decision),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_known_agents() {
        let out = RouteToAgentTool
            .execute(serde_json::json!({"agent": "sql", "query": "revenue by region"}))
            .await
            .unwrap();
        let data = out.data.unwrap();
        assert_eq!(data["agent"], "structured_query");
        assert_eq!(data["query"], "revenue by region");
    }

    #[tokio::test]
    async fn rejects_unknown_agents() {
        let err = RouteToAgentTool.execute(serde_json::json!({"agent": "poet"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
