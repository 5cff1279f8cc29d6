//! The orchestrator picks a specialist and runs it.
//!
//! Routing is normally the pure keyword classifier in [`crate::router`].
//! With LLM routing enabled, a query without a mode prefix or agent hint is
//! first given to a short reasoning loop whose only tool is
//! `route_to_agent`; if that loop does not produce a valid choice the
//! keyword route is used instead. The router may forward a rewritten query,
//! and an `EXECUTE:` or `TEXT ONLY:` prefix on it sets the execution mode.

use docent_core::agent::AgentKind;
use docent_core::message::Message;
use docent_core::step::Transcript;
use docent_tools::ROUTE_TO_AGENT;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::TurnCancellation;
use crate::profile::AgentProfile;
use crate::react::{LoopOutcome, ReasoningLoop, TurnError};
use crate::router::{self, Route};
use crate::stream_event::StreamEvent;
use crate::streamer::EventEmitter;

pub struct Orchestrator {
    reasoning: Arc<ReasoningLoop>,
    llm_routing: bool,
    step_ceiling: usize,
}

impl Orchestrator {
    pub fn new(reasoning: Arc<ReasoningLoop>) -> Self {
        Self {
            reasoning,
            llm_routing: false,
            step_ceiling: 8,
        }
    }

    pub fn with_llm_routing(mut self, enabled: bool) -> Self {
        self.llm_routing = enabled;
        self
    }

    /// Upper bound on any specialist's step budget.
    pub fn with_step_ceiling(mut self, ceiling: usize) -> Self {
        self.step_ceiling = ceiling;
        self
    }

    /// Decide which agent handles `query`. `previous` is the agent that
    /// handled the session's last turn.
    pub async fn route(
        &self,
        query: &str,
        hint: Option<AgentKind>,
        previous: Option<AgentKind>,
        emitter: &EventEmitter,
        cancel: &TurnCancellation,
        transcript: &Transcript,
    ) -> Result<Route, TurnError> {
        if let Some(route) = router::prefixed(query) {
            debug!(mode = ?route.mode, "Mode prefix forces execution agent");
            return Ok(route);
        }
        let keyword_route = router::classify_in_session(query, hint, previous);
        if hint.is_some() || !self.llm_routing {
            return Ok(keyword_route);
        }

        let profile = AgentProfile::router();
        let routed = self
            .reasoning
            .run(&profile, &[], query, emitter, &cancel.child(), transcript)
            .await;
        match routed {
            Ok(outcome) => match chosen_route(&outcome, &keyword_route) {
                Some(route) => Ok(route),
                None => {
                    warn!(
                        fallback = %keyword_route.kind,
                        "Router made no valid choice, using keywords"
                    );
                    Ok(keyword_route)
                }
            },
            Err(TurnError::Cancelled(reason)) => Err(TurnError::Cancelled(reason)),
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = %keyword_route.kind,
                    "Router loop failed, using keywords"
                );
                Ok(keyword_route)
            }
        }
    }

    /// Run the specialist for `route`.
    pub async fn dispatch(
        &self,
        route: &Route,
        history: &[Message],
        emitter: &EventEmitter,
        cancel: &TurnCancellation,
        transcript: &Transcript,
    ) -> Result<LoopOutcome, TurnError> {
        let profile =
            AgentProfile::lookup(route.kind, route.mode).with_step_ceiling(self.step_ceiling);
        info!(
            agent = %route.kind,
            mode = ?route.mode,
            max_steps = profile.max_steps,
            "Dispatching"
        );

        emitter
            .emit(StreamEvent::Status {
                message: format!("Routing to the {} agent", route.kind),
                agent: Some(route.kind),
                mode: Some(route.mode),
            })
            .await;

        self.reasoning
            .run(&profile, history, &route.query, emitter, &cancel.child(), transcript)
            .await
    }
}

/// The router's decision, with any forwarded query and its mode prefix
/// applied on top of the keyword route.
fn chosen_route(outcome: &LoopOutcome, keyword_route: &Route) -> Option<Route> {
    let data = outcome
        .observations
        .iter()
        .rev()
        .find(|o| o.tool == ROUTE_TO_AGENT)
        .and_then(|o| o.data.as_ref())?;
    let kind = data["agent"].as_str().and_then(AgentKind::parse)?;

    let Some(forwarded) = data["query"].as_str().filter(|q| !q.trim().is_empty()) else {
        return Some(Route { kind, ..keyword_route.clone() });
    };
    let route = match router::prefixed(forwarded) {
        Some(prefixed) => Route { kind, mode: prefixed.mode, query: prefixed.query },
        None => Route { kind, mode: keyword_route.mode, query: forwarded.trim().to_string() },
    };
    Some(route)
}
