//! Turn cancellation with a recorded reason.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Why a turn stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The event receiver went away
    ClientDisconnected,
    /// The caller asked to stop
    Cancelled,
    /// The turn deadline passed
    DeadlineExceeded,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnected => "client_disconnected",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cancellation token that remembers the first reason it was cancelled
/// with. Clones share both the token and the reason; a child has its own
/// reason and reads its parent's when it was cancelled through the parent.
#[derive(Debug, Clone, Default)]
pub struct TurnCancellation {
    token: CancellationToken,
    reason: Arc<Mutex<Option<CancelReason>>>,
    parent: Option<Arc<TurnCancellation>>,
}

impl TurnCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with `reason`. Later reasons do not overwrite the first.
    pub fn cancel(&self, reason: CancelReason) {
        {
            let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason, if this token (or a parent) was cancelled.
    pub fn reason(&self) -> Option<CancelReason> {
        if !self.token.is_cancelled() {
            return None;
        }
        let own = *self.reason.lock().unwrap_or_else(|e| e.into_inner());
        own.or_else(|| self.parent.as_ref().and_then(|p| p.reason()))
            .or(Some(CancelReason::Cancelled))
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// A child that is cancelled with its parent but can also be cancelled
    /// on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::default(),
            parent: Some(Arc::new(self.clone())),
        }
    }
}
