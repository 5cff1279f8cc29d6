//! ReAct loop - Reasoning → Acting → Observing until an answer.
//!
//! Each step asks the completion service for either a final answer or one
//! tool call. A requested tool is checked against the agent's profile; an
//! undeclared tool fails the step with `invalid_args` without being
//! invoked. Tool errors are observations, not aborts:
//!
//! - first error: fed back so the model can correct itself
//! - second consecutive error: tools are withdrawn and the model is asked
//!   for a final answer with what it has
//!
//! The loop ends on a final answer, on the step budget (`LoopExhausted`),
//! on an unreachable completion service, or on cancellation. Cancellation
//! is checked before every Reasoning call and races the call itself; a tool
//! already running is left to finish but its result is thrown away.

use docent_core::error::{ProviderError, ToolError};
use docent_core::message::Message;
use docent_core::provider::{Decision, Provider, ProviderRequest};
use docent_core::step::{Invocation, Observation, StepOutcome, Transcript};
use docent_tools::ToolInvoker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::{CancelReason, TurnCancellation};
use crate::profile::AgentProfile;
use crate::stream_event::StreamEvent;
use crate::streamer::EventEmitter;

/// Consecutive tool errors after which tools are withdrawn.
const MAX_CONSECUTIVE_TOOL_ERRORS: usize = 2;

const TOOLS_WITHDRAWN: &str = "Tool calls have failed twice in a row and are no longer available \
for this request. Answer the user now with what you have, and say plainly what you could not \
determine.";

const TOOLS_KEPT_FAILING: &str =
    "I could not complete this request: the tools I needed kept failing.";

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Completion service unavailable: {0}")]
    UpstreamUnavailable(ProviderError),

    #[error("Step budget of {steps} exhausted without an answer")]
    LoopExhausted { steps: usize },

    #[error("Turn cancelled: {0}")]
    Cancelled(CancelReason),
}

/// The result of a loop that reached an answer.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    /// Reasoning calls made
    pub steps: usize,
    pub tool_calls: usize,
    /// The answer was produced after tools were withdrawn
    pub degraded: bool,
    /// Successful tool results, in order
    pub observations: Vec<Observation>,
}

/// Completion settings shared by every loop in the engine.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

pub struct ReasoningLoop {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
    invoker: ToolInvoker,
    tool_timeout: Duration,
}

impl ReasoningLoop {
    pub fn new(provider: Arc<dyn Provider>, settings: ModelSettings, invoker: ToolInvoker) -> Self {
        Self {
            provider,
            settings,
            invoker,
            tool_timeout: Duration::from_secs(60),
        }
    }

    /// Set the per-call tool deadline.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Run one agent to completion.
    ///
    /// `history` is prior conversation (user and assistant messages only);
    /// `user_message` is the current request. Progress is emitted through
    /// `emitter`; the terminal event is left to the caller.
    pub async fn run(
        &self,
        profile: &AgentProfile,
        history: &[Message],
        user_message: &str,
        emitter: &EventEmitter,
        cancel: &TurnCancellation,
        transcript: &Transcript,
    ) -> Result<LoopOutcome, TurnError> {
        let tool_definitions = self.invoker.registry().definitions_for(&profile.tools);
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(&profile.system_prompt));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(user_message));

        let mut steps = 0usize;
        let mut tool_calls = 0usize;
        let mut consecutive_errors = 0usize;
        let mut tools_enabled = !tool_definitions.is_empty();
        let mut observations = Vec::new();

        info!(
            agent = profile.kind.map(|k| k.as_str()).unwrap_or("router"),
            model = %self.settings.model,
            max_steps = profile.max_steps,
            tools = profile.tools.len(),
            "Reasoning loop starting"
        );

        loop {
            // ── Reasoning ──
            if let Some(reason) = cancel.reason() {
                return Err(TurnError::Cancelled(reason));
            }
            if steps >= profile.max_steps {
                warn!(steps, "Step budget exhausted");
                return Err(TurnError::LoopExhausted { steps });
            }
            steps += 1;
            debug!(step = steps, tools_enabled, "Reasoning step");

            let request = ProviderRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                tools: if tools_enabled {
                    tool_definitions.clone()
                } else {
                    Vec::new()
                },
            };
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let reason = cancel.reason().unwrap_or(CancelReason::Cancelled);
                    return Err(TurnError::Cancelled(reason));
                }
                response = self.provider.complete(request) => response.map_err(|e| {
                    warn!(provider = self.provider.name(), error = %e, "Completion failed");
                    TurnError::UpstreamUnavailable(e)
                })?,
            };

            let (thought, call) = match response.decision() {
                Decision::FinalAnswer(answer) => {
                    transcript.record(&answer, None, None);
                    let degraded =
                        !tools_enabled && consecutive_errors >= MAX_CONSECUTIVE_TOOL_ERRORS;
                    return Ok(LoopOutcome {
                        answer,
                        steps,
                        tool_calls,
                        degraded,
                        observations,
                    });
                }
                Decision::ToolCall { thought, call } if tools_enabled => (thought, call),
                Decision::ToolCall { thought, call } => {
                    // Tools were not offered; a call here is a misbehaving model.
                    warn!(tool = %call.name, "Tool requested after tools were withdrawn");
                    let answer = if thought.trim().is_empty() {
                        TOOLS_KEPT_FAILING.to_string()
                    } else {
                        thought
                    };
                    transcript.record(&answer, None, None);
                    return Ok(LoopOutcome {
                        answer,
                        steps,
                        tool_calls,
                        degraded: true,
                        observations,
                    });
                }
            };

            // ── Acting ──
            if !thought.trim().is_empty() {
                emitter
                    .emit(StreamEvent::Reasoning {
                        content: thought.clone(),
                    })
                    .await;
            }
            messages.push(Message::assistant_tool_call(&thought, call.clone()));

            let arguments = serde_json::from_str::<serde_json::Value>(&call.arguments);
            let invocation = Invocation {
                call_id: call.id.clone(),
                tool: call.name.clone(),
                arguments: arguments.as_ref().cloned().unwrap_or(serde_json::Value::Null),
            };

            let result = if !profile.declares(&call.name) {
                let reason = format!("tool '{}' is not available to this agent", call.name);
                reject(transcript, &thought, invocation, ToolError::InvalidArguments(reason))
            } else if let Err(e) = &arguments {
                reject(
                    transcript,
                    &thought,
                    invocation,
                    ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")),
                )
            } else {
                emitter
                    .emit(StreamEvent::ToolInvocation {
                        call_id: invocation.call_id.clone(),
                        tool: invocation.tool.clone(),
                        arguments: invocation.arguments.clone(),
                    })
                    .await;
                tool_calls += 1;
                self.invoker
                    .invoke(&thought, invocation, self.tool_timeout, transcript)
                    .await
            };

            // ── Observing ──
            if let Some(reason) = cancel.reason() {
                debug!(tool = %call.name, "Discarding tool result after cancellation");
                return Err(TurnError::Cancelled(reason));
            }
            emitter.emit(observation_event(&call.id, &call.name, &result)).await;

            match result {
                Ok(observation) => {
                    consecutive_errors = 0;
                    messages.push(Message::tool_result(&call.id, &observation.output));
                    let finished = profile.terminal_tool == Some(observation.tool.as_str());
                    let output = observation.output.clone();
                    observations.push(observation);
                    if finished {
                        return Ok(LoopOutcome {
                            answer: output,
                            steps,
                            tool_calls,
                            degraded: false,
                            observations,
                        });
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    let content = format!("Error ({}): {e}", e.kind());
                    messages.push(Message::tool_result(&call.id, content));
                    if consecutive_errors >= MAX_CONSECUTIVE_TOOL_ERRORS {
                        warn!(
                            errors = consecutive_errors,
                            "Withdrawing tools for the rest of the turn"
                        );
                        tools_enabled = false;
                        messages.push(Message::system(TOOLS_WITHDRAWN));
                    }
                }
            }
        }
    }
}

/// Fail a step without invoking anything.
fn reject(
    transcript: &Transcript,
    reasoning: &str,
    invocation: Invocation,
    error: ToolError,
) -> Result<Observation, ToolError> {
    warn!(tool = %invocation.tool, error = %error, "Tool call rejected");
    let result = Err(error);
    let outcome = StepOutcome::from_result(&result);
    transcript.record(reasoning, Some(invocation), Some(outcome));
    result
}

fn observation_event(
    call_id: &str,
    tool: &str,
    result: &Result<Observation, ToolError>,
) -> StreamEvent {
    match result {
        Ok(obs) => StreamEvent::Observation {
            call_id: call_id.to_string(),
            tool: tool.to_string(),
            success: true,
            output: obs.output.clone(),
            error_kind: None,
        },
        Err(e) => StreamEvent::Observation {
            call_id: call_id.to_string(),
            tool: tool.to_string(),
            success: false,
            output: e.to_string(),
            error_kind: Some(e.kind()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamer::EventStreamer;
    use crate::test_helpers::*;
    use crate::stream_event::TurnEvent;
    use async_trait::async_trait;
    use docent_core::agent::{AgentKind, ExecutionMode};
    use docent_core::error::ToolErrorKind;
    use docent_core::tool::{Tool, ToolOutput, ToolRegistry};
    use tokio::sync::{Notify, mpsc};

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "Echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(format!("{} ran with {arguments}", self.name)))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "search_files"
        }
        fn description(&self) -> &str {
            "Always down"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Err(ToolError::UpstreamUnavailable {
                tool_name: "search_files".into(),
                reason: "index down".into(),
            })
        }
    }

    /// Blocks until released, then succeeds.
    struct GatedTool {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Tool for GatedTool {
        fn name(&self) -> &str {
            "execute_code"
        }
        fn description(&self) -> &str {
            "Waits"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(ToolOutput::text("42"))
        }
    }

    fn registry(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    fn echo_registry() -> ToolRegistry {
        registry(vec![
            Arc::new(EchoTool { name: "execute_code" }),
            Arc::new(EchoTool { name: "search_files" }),
            Arc::new(EchoTool { name: "list_files" }),
        ])
    }

    fn settings() -> ModelSettings {
        ModelSettings {
            model: "mock-model".into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    fn reasoning_loop(provider: Arc<dyn Provider>, tools: ToolRegistry) -> ReasoningLoop {
        ReasoningLoop::new(provider, settings(), ToolInvoker::new(tools))
    }

    async fn drain(mut rx: mpsc::Receiver<TurnEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e.event);
        }
        events
    }

    fn execution() -> AgentProfile {
        AgentProfile::lookup(AgentKind::Execution, ExecutionMode::Run)
    }

    #[tokio::test]
    async fn direct_answer() {
        let provider = Arc::new(SequentialMockProvider::single_text("Two files."));
        let agent = reasoning_loop(provider, echo_registry());
        let cancel = TurnCancellation::new();
        let (emitter, rx) = EventStreamer::channel("t", 32, cancel.clone());
        let transcript = Transcript::new();

        let outcome = agent
            .run(&execution(), &[], "how many files?", &emitter, &cancel, &transcript)
            .await
            .unwrap();
        drop(emitter);

        assert_eq!(outcome.answer, "Two files.");
        assert_eq!(outcome.steps, 1);
        assert!(!outcome.degraded);
        assert!(drain(rx).await.is_empty());
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn tool_then_answer_emits_in_order() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            make_tool_call("execute_code", serde_json::json!({"code": "print(1)"})),
            "I'll run it",
            "The result is 1.",
        ));
        let agent = reasoning_loop(provider.clone(), echo_registry());
        let cancel = TurnCancellation::new();
        let (emitter, rx) = EventStreamer::channel("t", 32, cancel.clone());
        let transcript = Transcript::new();

        let outcome = agent
            .run(&execution(), &[], "run it", &emitter, &cancel, &transcript)
            .await
            .unwrap();
        drop(emitter);

        assert_eq!(outcome.answer, "The result is 1.");
        assert_eq!(outcome.tool_calls, 1);
        let types: Vec<_> = drain(rx).await.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["reasoning", "tool_invocation", "observation"]);

        // Second request carries the tool call and its result
        let requests = provider.requests();
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("call_execute_code"));
        let steps = transcript.steps();
        assert_eq!(steps[0].invocation.as_ref().unwrap().tool, "execute_code");
    }

    #[tokio::test]
    async fn undeclared_tool_is_invalid_args_without_invocation() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            make_tool_call("execute_code", serde_json::json!({"code": "1"})),
            "",
            "Here is the code instead.",
        ));
        let agent = reasoning_loop(provider, echo_registry());
        let profile = AgentProfile::lookup(AgentKind::Execution, ExecutionMode::ShowOnly);
        let cancel = TurnCancellation::new();
        let (emitter, rx) = EventStreamer::channel("t", 32, cancel.clone());
        let transcript = Transcript::new();

        let outcome = agent
            .run(&profile, &[], "show me", &emitter, &cancel, &transcript)
            .await
            .unwrap();
        drop(emitter);

        assert_eq!(outcome.tool_calls, 0);
        let events = drain(rx).await;
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::ToolInvocation { .. })));
        assert!(matches!(
            &events[0],
            StreamEvent::Observation {
                success: false,
                error_kind: Some(ToolErrorKind::InvalidArgs),
                ..
            }
        ));
        assert!(matches!(
            transcript.steps()[0].outcome,
            Some(StepOutcome::Error {
                kind: ToolErrorKind::InvalidArgs,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn always_tool_hits_step_budget() {
        let provider = Arc::new(AlwaysToolProvider::new("list_files", serde_json::json!({})));
        let agent = reasoning_loop(provider, echo_registry());
        let profile = execution().with_step_ceiling(3);
        let cancel = TurnCancellation::new();
        let (emitter, _rx) = EventStreamer::channel("t", 64, cancel.clone());

        let err = agent
            .run(&profile, &[], "loop", &emitter, &cancel, &Transcript::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::LoopExhausted { steps: 3 }));
    }

    #[tokio::test]
    async fn one_self_correction_then_tools_withdrawn() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                make_tool_call("search_files", serde_json::json!({"query": "a"})),
                "try",
            ),
            make_tool_call_response(
                make_tool_call("search_files", serde_json::json!({"query": "b"})),
                "retry",
            ),
            make_text_response("I could not search the files."),
        ]));
        let agent = reasoning_loop(provider.clone(), registry(vec![Arc::new(FailingTool)]));
        let cancel = TurnCancellation::new();
        let (emitter, _rx) = EventStreamer::channel("t", 64, cancel.clone());

        let outcome = agent
            .run(&execution(), &[], "search", &emitter, &cancel, &Transcript::new())
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert_eq!(outcome.tool_calls, 2);
        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert!(!requests[1].tools.is_empty(), "first error gets a continuation with tools");
        assert!(requests[2].tools.is_empty(), "second error withdraws tools");
    }

    #[tokio::test]
    async fn upstream_failure_is_fatal() {
        let provider = Arc::new(SequentialMockProvider::scripted(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]));
        let agent = reasoning_loop(provider, echo_registry());
        let cancel = TurnCancellation::new();
        let (emitter, _rx) = EventStreamer::channel("t", 8, cancel.clone());

        let err = agent
            .run(&execution(), &[], "hi", &emitter, &cancel, &Transcript::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn cancelled_before_reasoning() {
        let provider = Arc::new(SequentialMockProvider::single_text("never"));
        let agent = reasoning_loop(provider.clone(), echo_registry());
        let cancel = TurnCancellation::new();
        cancel.cancel(CancelReason::Cancelled);
        let (emitter, _rx) = EventStreamer::channel("t", 8, cancel.clone());

        let err = agent
            .run(&execution(), &[], "hi", &emitter, &cancel, &Transcript::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Cancelled(CancelReason::Cancelled)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn cancel_during_tool_discards_result() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            make_tool_call("execute_code", serde_json::json!({"code": "slow()"})),
            "",
            "unreachable",
        ));
        let gated = GatedTool {
            started: started.clone(),
            release: release.clone(),
        };
        let agent = reasoning_loop(provider.clone(), registry(vec![Arc::new(gated)]));
        let cancel = TurnCancellation::new();
        let (emitter, rx) = EventStreamer::channel("t", 32, cancel.clone());
        let transcript = Transcript::new();

        let profile = execution();
        let run = agent.run(&profile, &[], "run slow code", &emitter, &cancel, &transcript);
        let control = async {
            started.notified().await;
            cancel.cancel(CancelReason::Cancelled);
            release.notify_one();
        };
        let (result, ()) = tokio::join!(run, control);
        drop(emitter);

        assert!(matches!(result, Err(TurnError::Cancelled(CancelReason::Cancelled))));
        assert_eq!(provider.call_count(), 1, "no reasoning after cancellation");
        let events = drain(rx).await;
        assert!(matches!(events.last(), Some(StreamEvent::ToolInvocation { .. })));
        // The tool drained and was still recorded
        assert_eq!(transcript.len(), 1);
    }
}
