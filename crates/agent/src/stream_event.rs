//! Turn streaming events.
//!
//! `StreamEvent` is what a caller sees while a turn runs. The gateway
//! forwards these over SSE or WebSocket as JSON:
//! - `status`          - turn started, agent chosen
//! - `reasoning`       - the model's note before a tool call
//! - `tool_invocation` - a tool is being called
//! - `observation`     - the tool's result or normalized error
//! - `final_answer`    - terminal: the answer (possibly degraded)
//! - `failure`         - terminal: the turn could not produce an answer

use chrono::{DateTime, Utc};
use docent_core::agent::{AgentKind, ExecutionMode};
use docent_core::error::ToolErrorKind;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelReason;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<AgentKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<ExecutionMode>,
    },

    Reasoning { content: String },

    ToolInvocation {
        call_id: String,
        tool: String,
        arguments: serde_json::Value,
    },

    Observation {
        call_id: String,
        tool: String,
        success: bool,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<ToolErrorKind>,
    },

    /// `degraded` is set when the loop ran out of steps or tools.
    FinalAnswer {
        content: String,
        #[serde(default)]
        degraded: bool,
    },

    Failure { reason: FailureReason, message: String },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Reasoning { .. } => "reasoning",
            Self::ToolInvocation { .. } => "tool_invocation",
            Self::Observation { .. } => "observation",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Failure { .. } => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. } | Self::Failure { .. })
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status { message: message.into(), agent: None, mode: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The completion service could not be reached
    UpstreamUnavailable,
    ClientDisconnected,
    Cancelled,
    DeadlineExceeded,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::ClientDisconnected => "client_disconnected",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl From<CancelReason> for FailureReason {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::ClientDisconnected => Self::ClientDisconnected,
            CancelReason::Cancelled => Self::Cancelled,
            CancelReason::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// A stream event stamped with its position in the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    pub turn_id: String,
    /// 0-based, gap-free within a turn
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: StreamEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = StreamEvent::ToolInvocation {
            call_id: "call_1".into(),
            tool: "execute_code".into(),
            arguments: serde_json::json!({"code": "print(1)"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_invocation""#));
        assert!(json.contains(r#""tool":"execute_code""#));
    }

    #[test]
    fn failure_reason_is_snake_case() {
        let event = StreamEvent::Failure {
            reason: CancelReason::DeadlineExceeded.into(),
            message: "too slow".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""reason":"deadline_exceeded""#));
        assert!(event.is_terminal());
    }

    #[test]
    fn status_omits_empty_fields() {
        let json = serde_json::to_string(&StreamEvent::status("Turn started")).unwrap();
        assert_eq!(json, r#"{"type":"status","message":"Turn started"}"#);
    }

    #[test]
    fn turn_event_flattens() {
        let event = TurnEvent {
            turn_id: "t1".into(),
            seq: 3,
            timestamp: Utc::now(),
            event: StreamEvent::FinalAnswer { content: "42".into(), degraded: false },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "final_answer");
        assert_eq!(value["seq"], 3);

        let back: TurnEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back.event, event.event);
    }

    #[test]
    fn event_type_names() {
        assert_eq!(StreamEvent::Reasoning { content: "x".into() }.event_type(), "reasoning");
        assert_eq!(
            StreamEvent::FinalAnswer { content: "x".into(), degraded: true }.event_type(),
            "final_answer"
        );
        assert!(!StreamEvent::status("x").is_terminal());
    }
}
