//! # Docent Core
//!
//! Domain types, traits, and error definitions for the docent document
//! question-answering engine. This crate has **zero framework dependencies**:
//! it defines the model every other crate implements against.
//!
//! ## Layout
//!
//! Every external collaborator (object store, content index, knowledge graph,
//! code sandbox, completion service) is a trait here. Implementations live in
//! `docent-store` and `docent-providers`, which keeps the engine testable with
//! in-memory stand-ins and keeps the dependency graph pointing inward.

pub mod agent;
pub mod error;
pub mod event;
pub mod file;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod sandbox;
pub mod step;
pub mod storage;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentKind, ExecutionMode};
pub use error::{Error, ProviderError, Result, SandboxError, StorageError, ToolError, ToolErrorKind};
pub use event::{DomainEvent, EventBus};
pub use file::{FileId, FileRecord, FileStatus, ObjectLocation};
pub use message::{Message, MessageToolCall, Role, Session, SessionId};
pub use provider::{Decision, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use retrieval::{FragmentSource, RetrievedFragment, ValidIdSet};
pub use sandbox::{CodeLanguage, CodeSandbox, ExecutionOutcome, ExecutionRequest, ExecutionStatus};
pub use step::{AgentStep, Invocation, Observation, StepOutcome, Transcript};
pub use storage::{
    ContentIndex, Entity, GraphStore, IndexChunk, IndexMatch, ObjectListing, ObjectStore, Relation,
    Subgraph,
};
pub use tool::{Tool, ToolCall, ToolOutput, ToolRegistry};
