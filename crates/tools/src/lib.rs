//! Tool adapters and the invoker that runs them.
//!
//! Every tool the agents can call lives here as a thin adapter over one of
//! the external collaborators (reconciler, sandbox, graph store). The
//! [`ToolInvoker`] is the only thing that executes them: it applies the
//! per-call deadline, normalizes failures, and writes the step transcript.

pub mod execute_code;
pub mod graph_query;
pub mod invoker;
pub mod list_files;
pub mod route_to_agent;
pub mod search_files;

use docent_core::sandbox::CodeSandbox;
use docent_core::storage::GraphStore;
use docent_core::tool::ToolRegistry;
use docent_store::SourceOfTruthReconciler;
use std::sync::Arc;

pub use execute_code::ExecuteCodeTool;
pub use graph_query::GraphQueryTool;
pub use invoker::ToolInvoker;
pub use list_files::ListFilesTool;
pub use route_to_agent::RouteToAgentTool;
pub use search_files::SearchFilesTool;

pub const SEARCH_FILES: &str = "search_files";
pub const LIST_FILES: &str = "list_files";
pub const EXECUTE_CODE: &str = "execute_code";
pub const QUERY_GRAPH: &str = "query_graph";
pub const ROUTE_TO_AGENT: &str = "route_to_agent";

/// Register every built-in tool.
///
/// `query_graph` is only registered when a graph store is available.
pub fn build_registry(
    reconciler: Arc<SourceOfTruthReconciler>,
    sandbox: Arc<dyn CodeSandbox>,
    graph: Option<Arc<dyn GraphStore>>,
    search_top_k: usize,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchFilesTool::new(reconciler.clone()).with_top_k(search_top_k)));
    registry.register(Arc::new(ListFilesTool::new(reconciler.clone())));
    registry.register(Arc::new(ExecuteCodeTool::new(sandbox, reconciler)));
    if let Some(graph) = graph {
        registry.register(Arc::new(GraphQueryTool::new(graph)));
    }
    registry.register(Arc::new(RouteToAgentTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_store::{
        InMemoryContentIndex, InMemoryGraphStore, InMemoryObjectStore, MetadataStore,
    };

    struct NoSandbox;

    #[async_trait::async_trait]
    impl CodeSandbox for NoSandbox {
        fn name(&self) -> &str {
            "none"
        }

        async fn execute(
            &self,
            _request: docent_core::sandbox::ExecutionRequest,
        ) -> Result<docent_core::sandbox::ExecutionOutcome, docent_core::error::SandboxError> {
            Err(docent_core::error::SandboxError::NotConfigured)
        }
    }

    fn reconciler() -> Arc<SourceOfTruthReconciler> {
        Arc::new(SourceOfTruthReconciler::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryContentIndex::new()),
            Arc::new(MetadataStore::new()),
        ))
    }

    #[test]
    fn registry_has_all_tools() {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let registry = build_registry(reconciler(), Arc::new(NoSandbox), Some(graph), 5);
        assert_eq!(
            registry.names(),
            vec![EXECUTE_CODE, LIST_FILES, QUERY_GRAPH, ROUTE_TO_AGENT, SEARCH_FILES]
        );
    }

    #[test]
    fn graph_tool_needs_a_store() {
        let registry = build_registry(reconciler(), Arc::new(NoSandbox), None, 5);
        assert!(!registry.contains(QUERY_GRAPH));
        assert!(registry.contains(SEARCH_FILES));
    }
}
