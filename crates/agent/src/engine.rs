//! The engine - the one entry point the gateway and CLI talk to.
//!
//! Built once at startup with every collaborator injected. Each call to
//! [`Engine::execute_turn`] spawns one task for the turn and hands back a
//! [`TurnHandle`] with the live event stream and a cancel switch.

use chrono::Utc;
use docent_config::{AgentConfig, AppConfig};
use docent_core::agent::AgentKind;
use docent_core::event::{DomainEvent, EventBus};
use docent_core::file::FileRecord;
use docent_core::message::{Message, SessionId};
use docent_core::provider::Provider;
use docent_core::step::Transcript;
use docent_store::{ReconcileError, SourceOfTruthReconciler};
use docent_tools::ToolInvoker;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::cancel::{CancelReason, TurnCancellation};
use crate::orchestrator::Orchestrator;
use crate::react::{ModelSettings, ReasoningLoop, TurnError};
use crate::session::SessionRegistry;
use crate::stream_event::{FailureReason, StreamEvent, TurnEvent};
use crate::streamer::{EventEmitter, EventStreamer};

impl From<&AppConfig> for ModelSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionRegistry>,
    reconciler: Arc<SourceOfTruthReconciler>,
    config: AgentConfig,
    events: Option<Arc<EventBus>>,
}

impl Engine {
    pub fn new(
        provider: Arc<dyn Provider>,
        invoker: ToolInvoker,
        reconciler: Arc<SourceOfTruthReconciler>,
        model: ModelSettings,
        config: AgentConfig,
    ) -> Self {
        let reasoning =
            ReasoningLoop::new(provider, model, invoker).with_tool_timeout(config.tool_timeout());
        let reasoning = Arc::new(reasoning);
        let orchestrator = Orchestrator::new(reasoning)
            .with_llm_routing(config.llm_routing)
            .with_step_ceiling(config.max_steps as usize);
        Self {
            orchestrator: Arc::new(orchestrator),
            sessions: Arc::new(SessionRegistry::default()),
            reconciler,
            config,
            events: None,
        }
    }

    /// Publish `TurnCompleted` events on this bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionRegistry>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn reconciler(&self) -> &Arc<SourceOfTruthReconciler> {
        &self.reconciler
    }

    /// Files that currently exist, filtered through the reconciler.
    pub async fn list_files(&self) -> Result<Vec<FileRecord>, ReconcileError> {
        self.reconciler.list_files().await
    }

    /// Start a turn. Must be called from within a tokio runtime.
    ///
    /// Dropping the handle (or its receiver) counts as a client disconnect
    /// and cancels the turn.
    pub fn execute_turn(
        &self,
        session_id: SessionId,
        message: impl Into<String>,
        agent_hint: Option<AgentKind>,
    ) -> TurnHandle {
        let turn_id = uuid::Uuid::new_v4().to_string();
        let cancel = TurnCancellation::new();
        let (emitter, events) =
            EventStreamer::channel(&turn_id, self.config.event_buffer, cancel.clone());

        let engine = self.clone();
        let message = message.into();
        let turn_session = session_id.clone();
        let turn_cancel = cancel.clone();
        tokio::spawn(async move {
            engine
                .run_turn(turn_session, message, agent_hint, emitter, turn_cancel)
                .await;
        });

        TurnHandle {
            turn_id,
            session_id,
            events,
            cancel,
        }
    }

    async fn run_turn(
        self,
        session_id: SessionId,
        message: String,
        agent_hint: Option<AgentKind>,
        emitter: EventEmitter,
        cancel: TurnCancellation,
    ) {
        let disconnect_watch = emitter.watch_disconnect();
        let deadline_watch = self.config.turn_timeout().map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => cancel.cancel(CancelReason::DeadlineExceeded),
                    _ = cancel.cancelled() => {}
                }
            })
        });

        let session = self.sessions.get_or_create(&session_id);
        let previous = session.active_agent;
        let history = self.sessions.history(&session_id, self.config.history_window);
        info!(
            session = %session_id,
            turn = %emitter.turn_id(),
            hint = ?agent_hint,
            previous = ?previous,
            "Turn started"
        );
        emitter.emit(StreamEvent::status("Turn started")).await;

        let transcript = Transcript::new();
        let routed = self
            .orchestrator
            .route(&message, agent_hint, previous, &emitter, &cancel, &transcript)
            .await;
        let (agent, result) = match routed {
            Ok(route) => {
                let result = self
                    .orchestrator
                    .dispatch(&route, &history, &emitter, &cancel, &transcript)
                    .await;
                (Some(route.kind), result)
            }
            Err(e) => (None, Err(e)),
        };

        let terminal = match result {
            Ok(outcome) => {
                self.sessions.record_exchange(
                    &session_id,
                    Message::user(&message),
                    Message::assistant(&outcome.answer),
                    agent,
                );
                StreamEvent::FinalAnswer {
                    content: outcome.answer,
                    degraded: outcome.degraded,
                }
            }
            Err(TurnError::LoopExhausted { steps }) => {
                let content = format!(
                    "I could not complete this request within {steps} steps. \
                     Try narrowing the question or naming the file to use."
                );
                self.sessions.record_exchange(
                    &session_id,
                    Message::user(&message),
                    Message::assistant(&content),
                    agent,
                );
                StreamEvent::FinalAnswer {
                    content,
                    degraded: true,
                }
            }
            Err(TurnError::UpstreamUnavailable(e)) => {
                warn!(
                    session = %session_id,
                    error = %e,
                    "Turn failed: completion service unavailable"
                );
                StreamEvent::Failure {
                    reason: FailureReason::UpstreamUnavailable,
                    message: format!("The language model is unavailable: {e}"),
                }
            }
            Err(TurnError::Cancelled(reason)) => {
                info!(session = %session_id, reason = %reason, "Turn cancelled");
                StreamEvent::Failure {
                    reason: reason.into(),
                    message: format!("Turn cancelled: {reason}"),
                }
            }
        };

        let outcome_label = match &terminal {
            StreamEvent::FinalAnswer { degraded: true, .. } => "degraded",
            StreamEvent::Failure { reason, .. } => match reason {
                FailureReason::UpstreamUnavailable => "upstream_unavailable",
                FailureReason::ClientDisconnected => "client_disconnected",
                FailureReason::Cancelled => "cancelled",
                FailureReason::DeadlineExceeded => "deadline_exceeded",
            },
            _ => "answered",
        };
        emitter.finish(terminal).await;

        disconnect_watch.abort();
        if let Some(handle) = deadline_watch {
            handle.abort();
        }

        info!(
            session = %session_id,
            agent = agent.map(|a| a.as_str()).unwrap_or("none"),
            outcome = outcome_label,
            steps = transcript.len(),
            "Turn finished"
        );
        if let Some(events) = &self.events {
            events.publish(DomainEvent::TurnCompleted {
                session_id: session_id.to_string(),
                agent: agent.map(|a| a.as_str().to_string()).unwrap_or_default(),
                outcome: outcome_label.to_string(),
                steps: transcript.len(),
                timestamp: Utc::now(),
            });
        }
    }
}

/// A running turn: its event stream and a way to stop it.
pub struct TurnHandle {
    pub turn_id: String,
    pub session_id: SessionId,
    events: mpsc::Receiver<TurnEvent>,
    cancel: TurnCancellation,
}

impl TurnHandle {
    /// The next event, or `None` once the turn is over.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        self.events.recv().await
    }

    /// Ask the turn to stop. It ends with a `failure` event.
    pub fn cancel(&self) {
        self.cancel.cancel(CancelReason::Cancelled);
    }

    /// A detached cancel switch, for callers that hand the stream elsewhere.
    pub fn canceller(&self) -> TurnCancellation {
        self.cancel.clone()
    }

    pub fn into_stream(self) -> ReceiverStream<TurnEvent> {
        ReceiverStream::new(self.events)
    }

    /// Wait for the turn to end and return every event.
    pub async fn collect(mut self) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        events
    }
}
