//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/files`                  - Upload a file (indexed in the background)
//! - `GET    /v1/files`                  - List files that exist in the object store
//! - `GET    /v1/files/{id}`             - One file record
//! - `DELETE /v1/files/{id}`             - Delete a file everywhere
//! - `GET    /v1/files/{id}/status`      - Indexing status
//! - `GET    /v1/search?q=&top_k=`       - Reconciled search
//! - `POST   /v1/chat`                   - Run a turn, return the collected events
//! - `POST   /v1/chat/stream`            - Run a turn, stream events over SSE
//! - `GET    /v1/chat/ws/{session_id}`   - WebSocket: send messages, cancel turns
//! - `GET    /v1/sessions/{id}`          - Session history
//! - `DELETE /v1/sessions/{id}`          - Forget a session
//! - `GET    /v1/logs`                   - SSE stream of domain events

use axum::{
    Router,
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Json},
    routing::get,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use docent_agent::{StreamEvent, TurnEvent, TurnHandle};
use docent_core::agent::AgentKind;
use docent_core::file::{FileId, FileRecord, FileStatus};
use docent_core::message::{Session, SessionId};
use docent_store::PipelineError;

use crate::SharedState;

/// Largest `top_k` a search request may ask for.
const MAX_SEARCH_TOP_K: usize = 50;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/files", get(list_files_handler).post(upload_file_handler))
        .route("/files/{id}", get(get_file_handler).delete(delete_file_handler))
        .route("/files/{id}/status", get(file_status_handler))
        .route("/search", get(search_handler))
        .route("/chat", axum::routing::post(chat_handler))
        .route("/chat/stream", axum::routing::post(chat_stream_handler))
        .route("/chat/ws/{session_id}", get(ws_handler))
        .route("/sessions/{id}", get(get_session_handler).delete(delete_session_handler))
        .route("/logs", get(log_stream_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ContentEncoding {
    #[default]
    Text,
    Base64,
}

#[derive(Deserialize)]
struct UploadRequest {
    filename: String,
    content: String,
    #[serde(default)]
    encoding: ContentEncoding,
    /// Index before responding instead of in the background.
    #[serde(default)]
    wait: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileStatusResponse {
    pub file_id: FileId,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_indexed: Option<u32>,
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Existing session ID (omit to start a new one).
    #[serde(default)]
    session_id: Option<String>,
    /// Force a specific agent for this turn.
    #[serde(default)]
    agent: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatFailure {
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub turn_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ChatFailure>,
    pub events: Vec<TurnEvent>,
}

fn parse_agent(agent: Option<&str>) -> Result<Option<AgentKind>, ApiError> {
    match agent {
        None => Ok(None),
        Some(name) => AgentKind::parse(name)
            .map(Some)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Unknown agent '{name}'"))),
    }
}

fn pipeline_error(e: PipelineError) -> ApiError {
    match e {
        PipelineError::Rejected(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        PipelineError::NotFound(id) => {
            api_error(StatusCode::NOT_FOUND, format!("File not found: {id}"))
        }
        other => api_error(StatusCode::SERVICE_UNAVAILABLE, other.to_string()),
    }
}

// ── Files ─────────────────────────────────────────────────────────────────

/// `POST /v1/files` - store the bytes, then index.
///
/// Responds `202 Accepted` with the `pending` record unless `wait` is set,
/// in which case indexing finishes first and the response is `201 Created`.
async fn upload_file_handler(
    State(state): State<SharedState>,
    Json(payload): Json<UploadRequest>,
) -> Result<(StatusCode, Json<FileRecord>), ApiError> {
    let bytes = match payload.encoding {
        ContentEncoding::Text => payload.content.into_bytes(),
        ContentEncoding::Base64 => base64::engine::general_purpose::STANDARD
            .decode(payload.content.trim())
            .map_err(|e| {
                api_error(StatusCode::BAD_REQUEST, format!("Invalid base64 content: {e}"))
            })?,
    };

    let record = state
        .pipeline
        .accept(&payload.filename, bytes.clone())
        .await
        .map_err(pipeline_error)?;
    info!(file_id = %record.id, name = %record.name, "v1/files upload accepted");

    if payload.wait {
        state.pipeline.index(&record.id, &bytes).await.map_err(pipeline_error)?;
        let record = state
            .metadata
            .get(&record.id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "File was deleted during indexing"))?;
        return Ok((StatusCode::CREATED, Json(record)));
    }

    let pipeline = state.pipeline.clone();
    let id = record.id.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.index(&id, &bytes).await {
            warn!(file_id = %id, error = %e, "Background indexing failed");
        }
    });
    Ok((StatusCode::ACCEPTED, Json(record)))
}

async fn list_files_handler(
    State(state): State<SharedState>,
) -> Result<Json<FileListResponse>, ApiError> {
    let files = state
        .engine
        .list_files()
        .await
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    let count = files.len();
    Ok(Json(FileListResponse { files, count }))
}

/// `GET /v1/files/{id}` - only files the object store still holds.
async fn get_file_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, ApiError> {
    let id = FileId::from(&id);
    let files = state
        .engine
        .list_files()
        .await
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    files
        .into_iter()
        .find(|f| f.id == id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("File not found: {id}")))
}

async fn delete_file_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = FileId::from(&id);
    state.pipeline.delete(&id).await.map_err(pipeline_error)?;
    info!(file_id = %id, "v1/files delete");
    Ok(StatusCode::NO_CONTENT)
}

async fn file_status_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<FileStatusResponse>, ApiError> {
    let id = FileId::from(&id);
    let record = state
        .metadata
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("File not found: {id}")))?;
    Ok(Json(FileStatusResponse {
        file_id: record.id,
        status: record.status,
        chunks_indexed: record.chunks_indexed,
    }))
}

// ── Search ────────────────────────────────────────────────────────────────

/// `GET /v1/search` - `503` when the listing is down (the search failed
/// closed), `200` otherwise, including metadata-only results.
async fn search_handler(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let top_k = params
        .top_k
        .unwrap_or(state.config.retrieval.top_k)
        .clamp(1, MAX_SEARCH_TOP_K);
    let outcome = state.engine.reconciler().search(&params.q, top_k).await;
    let status = if outcome.is_failed_closed() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(outcome))
}

// ── Chat ──────────────────────────────────────────────────────────────────

fn start_turn(state: &SharedState, payload: ChatRequest) -> Result<TurnHandle, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message is empty"));
    }
    let hint = parse_agent(payload.agent.as_deref())?;
    let session_id = payload
        .session_id
        .as_deref()
        .map(SessionId::from)
        .unwrap_or_default();
    Ok(state.engine.execute_turn(session_id, payload.message, hint))
}

/// `POST /v1/chat` - run a turn to completion.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let handle = start_turn(&state, payload)?;
    let session_id = handle.session_id.to_string();
    let turn_id = handle.turn_id.clone();
    info!(session = %session_id, turn = %turn_id, "v1/chat request");

    let events = handle.collect().await;
    let mut response = ChatResponse {
        session_id,
        turn_id,
        answer: None,
        degraded: false,
        failure: None,
        events: Vec::new(),
    };
    match events.last().map(|e| &e.event) {
        Some(StreamEvent::FinalAnswer { content, degraded }) => {
            response.answer = Some(content.clone());
            response.degraded = *degraded;
        }
        Some(StreamEvent::Failure { reason, message }) => {
            response.failure = Some(ChatFailure {
                reason: reason.as_str().to_string(),
                message: message.clone(),
            });
        }
        _ => {}
    }
    response.events = events;
    Ok(Json(response))
}

// ── SSE Streaming ─────────────────────────────────────────────────────────

fn sse_event(event: &TurnEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default()
        .event(event.event.event_type())
        .id(event.seq.to_string())
        .data(data)
}

/// `POST /v1/chat/stream` - stream a turn's events over SSE.
///
/// Closing the connection drops the receiver, which cancels the turn as a
/// client disconnect.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let handle = start_turn(&state, payload)?;
    info!(session = %handle.session_id, turn = %handle.turn_id, "v1/chat/stream SSE request");

    let stream = handle.into_stream().map(|event| Ok(sse_event(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ── WebSocket ─────────────────────────────────────────────────────────────

/// `GET /v1/chat/ws/{session_id}` - duplex chat for one session.
///
/// Protocol:
/// - Client → Server: `{"type": "message", "message": "...", "agent": "writer"?}`
/// - Client → Server: `{"type": "cancel"}`
/// - Server → Client: turn events as JSON, or `{"type": "error", "message": "..."}`
///
/// One turn runs at a time per connection. Closing the socket cancels it.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, SessionId::from(&session_id)))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsClientMessage {
    Message {
        message: String,
        #[serde(default)]
        agent: Option<String>,
    },
    Cancel,
}

#[derive(Serialize)]
struct WsErrorFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: &'a str,
}

enum WsStep {
    Client(Option<Result<WsMessage, axum::Error>>),
    Turn(Option<TurnEvent>),
}

async fn next_turn_event(turn: &mut Option<TurnHandle>) -> Option<TurnEvent> {
    match turn {
        Some(handle) => handle.next_event().await,
        None => std::future::pending().await,
    }
}

async fn send_ws_error(socket: &mut WebSocket, message: &str) -> bool {
    let frame = serde_json::to_string(&WsErrorFrame { kind: "error", message }).unwrap_or_default();
    socket.send(WsMessage::Text(frame.into())).await.is_ok()
}

async fn handle_ws_connection(mut socket: WebSocket, state: SharedState, session_id: SessionId) {
    info!(session = %session_id, "WebSocket connection established");
    let mut turn: Option<TurnHandle> = None;

    loop {
        let step = tokio::select! {
            incoming = socket.recv() => WsStep::Client(incoming),
            event = next_turn_event(&mut turn) => WsStep::Turn(event),
        };

        match step {
            WsStep::Turn(Some(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                if socket.send(WsMessage::Text(json.into())).await.is_err() {
                    break;
                }
            }
            WsStep::Turn(None) => turn = None,
            WsStep::Client(Some(Ok(WsMessage::Text(text)))) => {
                let reply = match serde_json::from_str::<WsClientMessage>(&text) {
                    Ok(WsClientMessage::Cancel) => {
                        if let Some(handle) = &turn {
                            handle.cancel();
                        }
                        None
                    }
                    Ok(WsClientMessage::Message { .. }) if turn.is_some() => {
                        Some("A turn is already running; cancel it first".to_string())
                    }
                    Ok(WsClientMessage::Message { message, agent }) => {
                        match parse_agent(agent.as_deref()) {
                            Ok(hint) => {
                                let handle =
                                    state.engine.execute_turn(session_id.clone(), message, hint);
                                turn = Some(handle);
                                None
                            }
                            Err((_, Json(err))) => Some(err.error),
                        }
                    }
                    Err(e) => Some(format!("Invalid message: {e}")),
                };
                if let Some(message) = reply
                    && !send_ws_error(&mut socket, &message).await
                {
                    break;
                }
            }
            WsStep::Client(Some(Ok(WsMessage::Close(_))))
            | WsStep::Client(Some(Err(_)))
            | WsStep::Client(None) => {
                break;
            }
            WsStep::Client(Some(Ok(_))) => {} // binary, ping, pong
        }
    }

    // Dropping a live handle cancels its turn as a disconnect.
    drop(turn);
    info!(session = %session_id, "WebSocket connection closed");
}

// ── Sessions ──────────────────────────────────────────────────────────────

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    state
        .engine
        .sessions()
        .get(&SessionId::from(&id))
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session not found: {id}")))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.engine.sessions().clear(&SessionId::from(&id)) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// ── SSE Log Stream ────────────────────────────────────────────────────────

/// `GET /v1/logs` - SSE stream of domain events (uploads, deletes, tool
/// calls, completed turns).
async fn log_stream_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event.name()).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
