//! End-to-end integration tests for docent.
//!
//! These tests wire the real store, tools, and engine together with
//! scripted completion providers and a stub sandbox, then check the
//! behaviors callers depend on: reconciled search, routing, the single
//! terminal event, step budgets, and cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use docent_agent::test_helpers::*;
use docent_agent::{Engine, ModelSettings, StreamEvent, TurnEvent};
use docent_config::{AgentConfig, AppConfig};
use docent_core::error::SandboxError;
use docent_core::message::SessionId;
use docent_core::provider::Provider;
use docent_core::sandbox::{CodeSandbox, ExecutionOutcome, ExecutionRequest, ExecutionStatus};
use docent_core::storage::ObjectStore;
use docent_store::{
    FilePipeline, InMemoryContentIndex, InMemoryObjectStore, MetadataStore, SearchStatus,
    SourceOfTruthReconciler,
};
use docent_tools::ToolInvoker;
use tokio::sync::Notify;

// ── Fixtures ─────────────────────────────────────────────────────────────

/// Sandbox that answers immediately, or only once `gate` is notified.
struct StubSandbox {
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl CodeSandbox for StubSandbox {
    fn name(&self) -> &str {
        "e2e_stub"
    }

    async fn execute(&self, _request: ExecutionRequest) -> Result<ExecutionOutcome, SandboxError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(ExecutionOutcome {
            status: ExecutionStatus::Success,
            output: "mean(X) = 3.5".into(),
            error: None,
            artifact: None,
        })
    }
}

struct Stack {
    objects: Arc<InMemoryObjectStore>,
    pipeline: FilePipeline,
    reconciler: Arc<SourceOfTruthReconciler>,
    engine: Engine,
}

fn stack_with(provider: Arc<dyn Provider>, gate: Option<Arc<Notify>>) -> Stack {
    let objects = Arc::new(InMemoryObjectStore::new());
    let index = Arc::new(InMemoryContentIndex::new());
    let metadata = Arc::new(MetadataStore::new());
    let pipeline = FilePipeline::new(objects.clone(), index.clone(), metadata.clone());
    let reconciler = Arc::new(SourceOfTruthReconciler::new(objects.clone(), index, metadata));
    let sandbox = Arc::new(StubSandbox { gate });
    let registry = docent_tools::build_registry(reconciler.clone(), sandbox, None, 10);
    let settings = ModelSettings {
        model: "mock-model".into(),
        temperature: 0.0,
        max_tokens: None,
    };
    let engine = Engine::new(
        provider,
        ToolInvoker::new(registry),
        reconciler.clone(),
        settings,
        AgentConfig::default(),
    );
    Stack {
        objects,
        pipeline,
        reconciler,
        engine,
    }
}

fn stack(provider: Arc<dyn Provider>) -> Stack {
    stack_with(provider, None)
}

fn assert_single_terminal(events: &[TurnEvent]) {
    let terminals: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.event.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminals, vec![events.len() - 1], "exactly one terminal event, and it is last");
    for (i, e) in events.iter().enumerate() {
        assert_eq!(e.seq, i as u64, "sequence numbers are gap-free");
    }
}

fn invoked_tools(events: &[TurnEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match &e.event {
            StreamEvent::ToolInvocation { tool, .. } => Some(tool.clone()),
            _ => None,
        })
        .collect()
}

// ── E2E: Source of truth ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_deleted_file_never_surfaces_even_if_index_keeps_it() {
    let s = stack(Arc::new(SequentialMockProvider::new(vec![])));
    let record = s
        .pipeline
        .upload("churn.txt", b"Customer churn rose in the northern region".to_vec())
        .await
        .unwrap();

    let before = s.reconciler.search("churn northern", 10).await;
    assert!(before.fragments.iter().any(|f| f.file_id == record.id));

    // Remove the object only; the content index still holds the chunks.
    s.objects.delete(&record.id).await.unwrap();

    let after = s.reconciler.search("churn northern", 10).await;
    assert_eq!(after.status, SearchStatus::Complete);
    assert!(after.fragments.iter().all(|f| f.file_id != record.id));
    assert!(s.reconciler.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn e2e_list_active_is_stable_without_mutation() {
    let s = stack(Arc::new(SequentialMockProvider::new(vec![])));
    s.pipeline.upload("a.txt", b"alpha".to_vec()).await.unwrap();
    s.pipeline.upload("b.csv", b"x,y\n1,2\n".to_vec()).await.unwrap();

    let first = s.reconciler.list_active().await.unwrap();
    let second = s.reconciler.list_active().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn e2e_unindexed_upload_is_metadata_only_then_gone_after_delete() {
    let s = stack(Arc::new(SequentialMockProvider::new(vec![])));
    let record = s.pipeline.accept("A", b"quarterly figures".to_vec()).await.unwrap();

    let outcome = s.reconciler.search("A", 10).await;
    assert_eq!(outcome.fragments.len(), 1);
    assert_eq!(outcome.fragments[0].file_id, record.id);
    assert_eq!(outcome.content_fragments().count(), 0);

    s.pipeline.delete(&record.id).await.unwrap();
    let outcome = s.reconciler.search("A", 10).await;
    assert!(outcome.fragments.is_empty());
}

// ── E2E: Turns ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_calculation_routes_to_execution_and_runs_code() {
    let provider = Arc::new(SequentialMockProvider::tool_then_answer(
        make_tool_call("execute_code", serde_json::json!({"code": "df['X'].mean()"})),
        "I'll compute the mean in the sandbox.",
        "The average of column X is 3.5.",
    ));
    let s = stack(provider);
    s.pipeline.upload("data.csv", b"X\n3\n4\n".to_vec()).await.unwrap();

    let events = s
        .engine
        .execute_turn(SessionId::new(), "Calculate average of column X", None)
        .collect()
        .await;

    assert_single_terminal(&events);
    assert!(events.iter().any(|e| matches!(
        e.event,
        StreamEvent::Status { agent: Some(docent_core::agent::AgentKind::Execution), .. }
    )));
    assert_eq!(invoked_tools(&events), vec!["execute_code".to_string()]);
    assert!(matches!(
        &events.last().unwrap().event,
        StreamEvent::FinalAnswer { content, degraded: false } if content.contains("3.5")
    ));
}

#[tokio::test]
async fn e2e_text_only_never_executes_code() {
    // The model keeps asking for execute_code; show-only mode never offers it.
    let provider = AlwaysToolProvider::new("execute_code", serde_json::json!({"code": "plot()"}));
    let s = stack(Arc::new(provider));

    let events = s
        .engine
        .execute_turn(SessionId::new(), "TEXT ONLY: plot revenue by month", None)
        .collect()
        .await;

    assert_single_terminal(&events);
    assert!(!invoked_tools(&events).contains(&"execute_code".to_string()));
}

#[tokio::test]
async fn e2e_model_that_always_calls_tools_is_bounded() {
    let s = stack(Arc::new(AlwaysToolProvider::new("list_files", serde_json::json!({}))));

    let events = s
        .engine
        .execute_turn(SessionId::new(), "Calculate the total of every column", None)
        .collect()
        .await;

    assert_single_terminal(&events);
    match &events.last().unwrap().event {
        StreamEvent::FinalAnswer { degraded, .. } => assert!(*degraded),
        other => panic!("expected a degraded final answer, got {other:?}"),
    }
    let steps = invoked_tools(&events).len();
    assert!(steps > 0 && steps <= AgentConfig::default().max_steps as usize);
}

#[tokio::test]
async fn e2e_upstream_failure_is_reported_not_invented() {
    let provider = Arc::new(SequentialMockProvider::scripted(vec![Err(
        docent_core::error::ProviderError::Network("connection refused".into()),
    )]));
    let s = stack(provider);

    let events = s
        .engine
        .execute_turn(SessionId::new(), "Summarize the report", None)
        .collect()
        .await;

    assert_single_terminal(&events);
    assert!(!events.iter().any(|e| matches!(e.event, StreamEvent::FinalAnswer { .. })));
    assert!(matches!(
        events.last().unwrap().event,
        StreamEvent::Failure { reason: docent_agent::FailureReason::UpstreamUnavailable, .. }
    ));
}

#[tokio::test]
async fn e2e_cancel_after_tool_invocation_ends_with_failure() {
    let gate = Arc::new(Notify::new());
    let provider = Arc::new(SequentialMockProvider::tool_then_answer(
        make_tool_call("execute_code", serde_json::json!({"code": "slow()"})),
        "",
        "never sent",
    ));
    let s = stack_with(provider.clone(), Some(gate.clone()));

    let mut handle = s.engine.execute_turn(SessionId::new(), "Calculate average of column X", None);
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        let invoked = matches!(event.event, StreamEvent::ToolInvocation { .. });
        events.push(event);
        if invoked {
            handle.cancel();
            gate.notify_one();
        }
    }

    assert_single_terminal(&events);
    assert!(!events.iter().any(|e| matches!(e.event, StreamEvent::Observation { .. })));
    assert!(matches!(
        events.last().unwrap().event,
        StreamEvent::Failure { reason: docent_agent::FailureReason::Cancelled, .. }
    ));
    assert_eq!(provider.call_count(), 1, "no reasoning step after cancellation");
}

#[tokio::test]
async fn e2e_follow_up_reuses_session_agent() {
    let provider = Arc::new(SequentialMockProvider::new(vec![
        make_text_response("Here is the draft report."),
        make_text_response("Added a conclusion."),
    ]));
    let s = stack(provider);
    let session = SessionId::from("follow-up");

    let first = s
        .engine
        .execute_turn(session.clone(), "hello", Some(docent_core::agent::AgentKind::Writer))
        .collect()
        .await;
    assert_single_terminal(&first);

    let second = s
        .engine
        .execute_turn(session.clone(), "now add a conclusion", None)
        .collect()
        .await;
    assert!(second.iter().any(|e| matches!(
        e.event,
        StreamEvent::Status { agent: Some(docent_core::agent::AgentKind::Writer), .. }
    )));

    let stored = s.engine.sessions().get(&session).unwrap();
    assert_eq!(stored.messages.len(), 4);
}

// ── E2E: Gateway ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_upload_then_chat() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let provider = Arc::new(SequentialMockProvider::tool_then_answer(
        make_tool_call("search_files", serde_json::json!({"query": "refund policy"})),
        "",
        "Refunds are issued within 30 days.",
    ));
    let state = Arc::new(docent_gateway::AppState::build(
        AppConfig::default(),
        provider,
        Arc::new(StubSandbox { gate: None }),
    ));

    let upload = serde_json::json!({
        "filename": "policy.md",
        "content": "Our refund policy: refunds are issued within 30 days of purchase.",
        "wait": true
    });
    let req = Request::builder()
        .method("POST")
        .uri("/v1/files")
        .header("content-type", "application/json")
        .body(Body::from(upload.to_string()))
        .unwrap();
    let response = docent_gateway::build_router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let chat = serde_json::json!({"message": "What does the refund policy say?"});
    let req = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(chat.to_string()))
        .unwrap();
    let response = docent_gateway::build_router(state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["answer"], "Refunds are issued within 30 days.");
    let observation = json["events"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["type"] == "observation")
        .unwrap();
    assert_eq!(observation["success"], true);
    assert!(observation["output"].as_str().unwrap().contains("policy.md"));
}

#[tokio::test]
async fn e2e_config_defaults_and_validation() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.agent.turn_timeout().is_some());

    let mut bad = AppConfig::default();
    bad.agent.max_steps = 0;
    assert!(bad.validate().is_err());
}
