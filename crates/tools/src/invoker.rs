//! The tool invoker - the single path by which agents touch the outside world.
//!
//! One call, one attempt. The adapter runs on its own task so a panic is
//! caught as a `JoinError` instead of unwinding through the reasoning loop.
//! Past the deadline the task is aborted and the caller gets `Timeout`.
//! Every call, successful or not, lands in the turn transcript before
//! `invoke` returns.

use chrono::Utc;
use docent_core::error::ToolError;
use docent_core::event::{DomainEvent, EventBus};
use docent_core::step::{Invocation, Observation, StepOutcome, Transcript};
use docent_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ToolInvoker {
    registry: ToolRegistry,
    events: Option<Arc<EventBus>>,
}

impl ToolInvoker {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry, events: None }
    }

    /// Publish a `ToolExecuted` event per call.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one tool call and record it as a step in `transcript`.
    ///
    /// `reasoning` is the model's note that led to the call; it is stored on
    /// the same step as the invocation.
    pub async fn invoke(
        &self,
        reasoning: &str,
        invocation: Invocation,
        timeout: Duration,
        transcript: &Transcript,
    ) -> Result<Observation, ToolError> {
        let started = Instant::now();
        let result = self.run(&invocation, timeout).await.map(|output| Observation {
            call_id: invocation.call_id.clone(),
            tool: invocation.tool.clone(),
            output: output.output,
            data: output.data,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => debug!(tool = %invocation.tool, duration_ms, "Tool succeeded"),
            Err(e) => warn!(
                tool = %invocation.tool,
                kind = %e.kind(),
                error = %e,
                duration_ms,
                "Tool failed"
            ),
        }

        if let Some(events) = &self.events {
            events.publish(DomainEvent::ToolExecuted {
                tool_name: invocation.tool.clone(),
                success: result.is_ok(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }

        let outcome = StepOutcome::from_result(&result);
        transcript.record(reasoning, Some(invocation), Some(outcome));
        result
    }

    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<docent_core::tool::ToolOutput, ToolError> {
        let tool = self
            .registry
            .get(&invocation.tool)
            .ok_or_else(|| ToolError::NotFound(invocation.tool.clone()))?;

        let arguments = invocation.arguments.clone();
        let handle = tokio::spawn(async move { tool.execute(arguments).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    format!("tool panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "tool task was cancelled".to_string()
                };
                Err(ToolError::Internal { tool_name: invocation.tool.clone(), reason })
            }
            Err(_) => {
                abort.abort();
                Err(ToolError::Timeout {
                    tool_name: invocation.tool.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docent_core::error::ToolErrorKind;
    use docent_core::tool::{Tool, ToolOutput};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo text"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            match arguments["text"].as_str() {
                Some(text) => Ok(ToolOutput::text(text)),
                None => Err(ToolError::InvalidArguments("missing 'text'".into())),
            }
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Never finishes in time"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ToolOutput::text("late"))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "Panics"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            panic!("adapter bug");
        }
    }

    fn invoker() -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(SlowTool));
        registry.register(Arc::new(PanickingTool));
        ToolInvoker::new(registry)
    }

    fn call(tool: &str, arguments: serde_json::Value) -> Invocation {
        Invocation { call_id: "call_1".into(), tool: tool.into(), arguments }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn success_is_recorded() {
        let transcript = Transcript::new();
        let obs = invoker()
            .invoke("say hi", call("echo", serde_json::json!({"text": "hi"})), TIMEOUT, &transcript)
            .await
            .unwrap();
        assert_eq!(obs.output, "hi");
        assert_eq!(obs.call_id, "call_1");

        let steps = transcript.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].reasoning, "say hi");
        assert_eq!(steps[0].invocation.as_ref().unwrap().tool, "echo");
        assert!(matches!(steps[0].outcome, Some(StepOutcome::Success { .. })));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let transcript = Transcript::new();
        let err = invoker()
            .invoke("", call("nope", serde_json::json!({})), TIMEOUT, &transcript)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::NotFound);
        assert!(transcript.steps()[0].outcome.as_ref().unwrap().is_error());
    }

    #[tokio::test]
    async fn adapter_errors_pass_through() {
        let transcript = Transcript::new();
        let err = invoker()
            .invoke("", call("echo", serde_json::json!({})), TIMEOUT, &transcript)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::InvalidArgs);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_timeout() {
        let transcript = Transcript::new();
        let err = invoker()
            .invoke(
                "",
                call("slow", serde_json::json!({})),
                Duration::from_millis(100),
                &transcript,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_ms: 100, .. }));
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let transcript = Transcript::new();
        let err = invoker()
            .invoke("", call("boom", serde_json::json!({})), TIMEOUT, &transcript)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::Internal);
        assert!(err.to_string().contains("adapter bug"));
    }

    #[tokio::test]
    async fn publishes_tool_executed() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let invoker = invoker().with_event_bus(bus);

        let _ = invoker
            .invoke("", call("echo", serde_json::json!({"text": "x"})), TIMEOUT, &Transcript::new())
            .await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::ToolExecuted { tool_name, success: true, .. } if tool_name == "echo"
        ));
    }
}
