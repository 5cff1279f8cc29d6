//! The agent execution engine.
//!
//! A turn flows through four pieces:
//!
//! 1. **Orchestrator** picks a specialist agent for the query (keyword
//!    classifier, mode prefixes, session hints, optional LLM routing)
//! 2. **ReasoningLoop** drives that agent's reason → act → observe cycle
//!    against the completion service and the tool invoker
//! 3. **EventStreamer** delivers every transition to the caller in order,
//!    ending with exactly one `final_answer` or `failure`
//! 4. **Engine** ties them together, one tokio task per turn, with
//!    cancellation on disconnect, on request, or at the deadline

pub mod cancel;
pub mod engine;
pub mod orchestrator;
pub mod profile;
pub mod react;
pub mod router;
pub mod session;
pub mod stream_event;
pub mod streamer;
pub mod test_helpers;

pub use cancel::{CancelReason, TurnCancellation};
pub use engine::{Engine, TurnHandle};
pub use orchestrator::Orchestrator;
pub use profile::AgentProfile;
pub use react::{LoopOutcome, ModelSettings, ReasoningLoop, TurnError};
pub use router::{Route, classify, classify_in_session, classify_with_hint};
pub use session::SessionRegistry;
pub use stream_event::{FailureReason, StreamEvent, TurnEvent};
pub use streamer::{EventEmitter, EventStreamer};
