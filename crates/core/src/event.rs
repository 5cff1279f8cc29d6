//! Domain event system - decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens (an upload lands,
//! the reconciler drops stale index entries, a turn finishes). The gateway
//! streams them out on `/v1/logs`; nothing in the engine depends on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    FileUploaded {
        file_id: String,
        file_name: String,
        size: u64,
        timestamp: DateTime<Utc>,
    },

    FileIndexed {
        file_id: String,
        chunks: u32,
        timestamp: DateTime<Utc>,
    },

    FileDeleted {
        file_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The content index returned entries for files that no longer exist
    StaleFragmentsDiscarded {
        file_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    TurnCompleted {
        session_id: String,
        agent: String,
        outcome: String,
        steps: usize,
        timestamp: DateTime<Utc>,
    },

    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The event tag, as used for SSE event names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileUploaded { .. } => "file_uploaded",
            Self::FileIndexed { .. } => "file_indexed",
            Self::FileDeleted { .. } => "file_deleted",
            Self::StaleFragmentsDiscarded { .. } => "stale_fragments_discarded",
            Self::ToolExecuted { .. } => "tool_executed",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::ErrorOccurred { .. } => "error_occurred",
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
