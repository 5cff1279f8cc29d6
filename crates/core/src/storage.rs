//! Storage traits - the object store, content index, and knowledge graph.
//!
//! The object store is authoritative for whether a file exists. The content
//! index and graph are secondary: they may lag behind uploads and keep
//! entries for files that are already gone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StorageError;
use crate::file::{FileId, ObjectLocation};

/// Tag keys written alongside every stored object.
pub mod tags {
    pub const FILE_ID: &str = "file_id";
    pub const FILENAME: &str = "filename";
    pub const FILE_TYPE: &str = "file_type";
    pub const SIZE: &str = "size";
    pub const UPLOADED_AT: &str = "uploaded_at";
    pub const STATUS: &str = "status";
}

/// One entry of an object store listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectListing {
    pub file_id: FileId,
    pub location: ObjectLocation,
    pub tags: HashMap<String, String>,
}

impl ObjectListing {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Authoritative blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &str;

    /// Store raw bytes under `file_id` with the given tags.
    async fn put(
        &self,
        file_id: &FileId,
        file_name: &str,
        bytes: Vec<u8>,
        tags: HashMap<String, String>,
    ) -> Result<ObjectLocation, StorageError>;

    /// Fetch the raw bytes of an object.
    async fn get(&self, file_id: &FileId) -> Result<Vec<u8>, StorageError>;

    /// List every object that currently exists.
    async fn list(&self) -> Result<Vec<ObjectListing>, StorageError>;

    /// Delete an object. Deleting a missing object is `NotFound`.
    async fn delete(&self, file_id: &FileId) -> Result<(), StorageError>;

    /// Health check - can we reach the store?
    async fn health_check(&self) -> Result<bool, StorageError> {
        Ok(true)
    }
}

/// A chunk of extracted text ready for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChunk {
    pub title: String,
    pub content: String,
}

/// A ranked match returned by the content index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    pub file_id: FileId,
    pub title: String,
    pub content: String,
    pub score: f32,
}

/// Secondary full-text/vector search over file contents.
#[async_trait]
pub trait ContentIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Replace all chunks stored for `file_id`.
    async fn upsert(
        &self,
        file_id: &FileId,
        chunks: Vec<IndexChunk>,
    ) -> Result<usize, StorageError>;

    /// Ranked matches for `text`, best first, at most `top_k`.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexMatch>, StorageError>;

    /// Drop every chunk for `file_id`. Missing files are not an error.
    async fn remove(&self, file_id: &FileId) -> Result<(), StorageError>;

    async fn health_check(&self) -> Result<bool, StorageError> {
        Ok(true)
    }
}

/// A knowledge-graph entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<FileId>,
}

/// A directed, labelled edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl Subgraph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// Optional enrichment source for the retrieval agent.
#[async_trait]
pub trait GraphStore: Send + Sync {
    fn name(&self) -> &str;

    async fn upsert_entities(&self, entities: Vec<Entity>) -> Result<(), StorageError>;

    async fn upsert_relations(&self, relations: Vec<Relation>) -> Result<(), StorageError>;

    /// Entities matching `pattern` plus the relations touching them.
    async fn query(&self, pattern: &str) -> Result<Subgraph, StorageError>;
}
