//! HTTP gateway for docent.
//!
//! Exposes health checks plus the v1 API: file upload and deletion,
//! reconciled search, and chat turns over JSON, SSE, or WebSocket.
//!
//! Built on Axum. All state is built once in [`AppState::build`] and shared
//! behind an `Arc`; handlers never construct collaborators themselves.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use docent_agent::{Engine, ModelSettings};
use docent_config::AppConfig;
use docent_core::event::EventBus;
use docent_core::provider::Provider;
use docent_core::sandbox::CodeSandbox;
use docent_core::storage::{ContentIndex, GraphStore, ObjectStore};
use docent_store::{
    FilePipeline, InMemoryContentIndex, InMemoryGraphStore, InMemoryObjectStore, MetadataStore,
    SourceOfTruthReconciler,
};
use docent_tools::ToolInvoker;

/// Shared application state for the gateway.
pub struct AppState {
    pub engine: Engine,
    pub pipeline: Arc<FilePipeline>,
    pub metadata: Arc<MetadataStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub index: Arc<dyn ContentIndex>,
    pub provider: Arc<dyn Provider>,
    pub sandbox: Arc<dyn CodeSandbox>,
    pub events: Arc<EventBus>,
    pub config: AppConfig,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the engine, pipeline, and in-memory backends around `provider`
    /// and `sandbox`.
    pub fn build(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        sandbox: Arc<dyn CodeSandbox>,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let index: Arc<dyn ContentIndex> = Arc::new(InMemoryContentIndex::new());
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let metadata = Arc::new(MetadataStore::new());

        let pipeline = FilePipeline::new(objects.clone(), index.clone(), metadata.clone())
            .with_chunk_size(config.retrieval.chunk_size)
            .with_event_bus(events.clone());
        let reconciler = Arc::new(
            SourceOfTruthReconciler::new(objects.clone(), index.clone(), metadata.clone())
                .with_event_bus(events.clone()),
        );

        let registry = docent_tools::build_registry(
            reconciler.clone(),
            sandbox.clone(),
            Some(graph),
            config.retrieval.top_k,
        );
        let invoker = ToolInvoker::new(registry).with_event_bus(events.clone());
        let engine = Engine::new(
            provider.clone(),
            invoker,
            reconciler,
            ModelSettings::from(&config),
            config.agent.clone(),
        )
        .with_event_bus(events.clone());

        Self {
            engine,
            pipeline: Arc::new(pipeline),
            metadata,
            objects,
            index,
            provider,
            sandbox,
            events,
            config,
            start_time: chrono::Utc::now(),
        }
    }
}

/// Build the full router: health checks plus `/v1`.
///
/// Layers applied:
/// - CORS (permissive; the gateway binds to localhost by default)
/// - request body limit from `gateway.max_body_bytes`
/// - HTTP tracing
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.config.gateway.max_body_bytes;
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/services", get(services_health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build everything from `config` and serve until the process exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let router = docent_providers::build_from_config(&config);
    let provider = router
        .default()
        .ok_or_else(|| format!("provider '{}' is not configured", config.default_provider))?;
    let sandbox = docent_providers::build_sandbox(&config);
    if !sandbox.is_configured() {
        warn!("No sandbox URL configured, execute_code will report not_configured");
    }

    let state = Arc::new(AppState::build(config, provider, sandbox));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ServicesHealthResponse {
    pub status: String,
    pub uptime_secs: i64,
    pub services: Vec<ServiceHealth>,
}

fn probe<E: std::fmt::Display>(name: &str, result: Result<bool, E>) -> ServiceHealth {
    match result {
        Ok(healthy) => ServiceHealth {
            name: name.to_string(),
            healthy,
            error: None,
        },
        Err(e) => ServiceHealth {
            name: name.to_string(),
            healthy: false,
            error: Some(e.to_string()),
        },
    }
}

/// `GET /health/services` - probe every backend the engine talks to.
async fn services_health_handler(State(state): State<SharedState>) -> Json<ServicesHealthResponse> {
    let (objects, index, provider) = tokio::join!(
        state.objects.health_check(),
        state.index.health_check(),
        state.provider.health_check(),
    );
    let services = vec![
        probe(&format!("object_store:{}", state.objects.name()), objects),
        probe(&format!("content_index:{}", state.index.name()), index),
        probe(&format!("provider:{}", state.provider.name()), provider),
        ServiceHealth {
            name: format!("sandbox:{}", state.sandbox.name()),
            healthy: state.sandbox.is_configured(),
            error: (!state.sandbox.is_configured()).then(|| "not configured".to_string()),
        },
    ];

    let status = if services.iter().all(|s| s.healthy) {
        "ok"
    } else {
        "degraded"
    };
    Json(ServicesHealthResponse {
        status: status.to_string(),
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
        services,
    })
}
