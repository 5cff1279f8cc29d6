//! File registry and storage backends for docent.
//!
//! - [`MetadataStore`]: the in-process registry of uploaded files
//! - [`SourceOfTruthReconciler`]: filters the content index against the
//!   object store so deleted files never surface
//! - [`FilePipeline`]: the upload, indexing, and delete paths
//! - in-memory stand-ins for the object store, content index, and graph

pub mod content_index;
pub mod graph;
pub mod metadata;
pub mod object_store;
pub mod pipeline;
pub mod reconciler;

pub use content_index::InMemoryContentIndex;
pub use graph::InMemoryGraphStore;
pub use metadata::{MetadataError, MetadataStore};
pub use object_store::InMemoryObjectStore;
pub use pipeline::{FilePipeline, PipelineError};
pub use reconciler::{
    ReconcileError, SearchOutcome, SearchStatus, SourceOfTruthReconciler, StaleDataError,
};
