//! Upload, indexing, and delete paths.
//!
//! These are the only writers of [`FileRecord`]s. An upload is accepted as
//! soon as the object store has the bytes (`pending`); indexing then moves
//! the record through `processing` to `indexed` or `failed`, usually on a
//! background task.

use chrono::{SecondsFormat, Utc};
use docent_core::error::StorageError;
use docent_core::event::{DomainEvent, EventBus};
use docent_core::file::{FileId, FileRecord, FileStatus};
use docent_core::storage::{ContentIndex, IndexChunk, ObjectStore, tags};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::metadata::{MetadataError, MetadataStore};

/// Longest title stored with an index chunk.
const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("File not found: {0}")]
    NotFound(FileId),

    #[error("File {0} was deleted while it was being indexed")]
    DeletedDuringIndexing(FileId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub struct FilePipeline {
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn ContentIndex>,
    metadata: Arc<MetadataStore>,
    events: Option<Arc<EventBus>>,
    chunk_size: usize,
}

impl FilePipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        index: Arc<dyn ContentIndex>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            objects,
            index,
            metadata,
            events: None,
            chunk_size: 1200,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Store the bytes and register a `pending` record.
    pub async fn accept(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileRecord, PipelineError> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(PipelineError::Rejected("file name is empty".into()));
        }
        if bytes.is_empty() {
            return Err(PipelineError::Rejected(format!("{file_name} is empty")));
        }

        let id = FileId::new();
        let size = bytes.len() as u64;
        let mut record = FileRecord::pending(id.clone(), file_name, size, Default::default());

        let object_tags = HashMap::from([
            (tags::FILE_ID.to_string(), id.to_string()),
            (tags::FILENAME.to_string(), record.name.clone()),
            (tags::FILE_TYPE.to_string(), record.file_type.clone()),
            (tags::SIZE.to_string(), size.to_string()),
            (
                tags::UPLOADED_AT.to_string(),
                record.uploaded_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (tags::STATUS.to_string(), FileStatus::Pending.to_string()),
        ]);
        record.location = self
            .objects
            .put(&id, &record.name, bytes, object_tags)
            .await?;
        self.metadata.insert(record.clone())?;

        info!(file_id = %id, name = %record.name, size, "File accepted");
        self.publish(DomainEvent::FileUploaded {
            file_id: id.to_string(),
            file_name: record.name.clone(),
            size,
            timestamp: Utc::now(),
        });
        Ok(record)
    }

    /// Chunk and index an accepted file. Returns the number of chunks.
    pub async fn index(&self, id: &FileId, bytes: &[u8]) -> Result<u32, PipelineError> {
        let record = self
            .metadata
            .get(id)
            .ok_or_else(|| PipelineError::NotFound(id.clone()))?;
        self.metadata.transition(id, FileStatus::Processing, None)?;

        let text = extract_text(&record.name, &record.file_type, bytes);
        let title = chunk_title(&record.name, &record.file_type, &text);
        let chunks: Vec<IndexChunk> = split_chunks(&text, self.chunk_size)
            .into_iter()
            .map(|content| IndexChunk {
                title: title.clone(),
                content,
            })
            .collect();

        let written = match self.index.upsert(id, chunks).await {
            Ok(n) => n as u32,
            Err(e) => {
                warn!(file_id = %id, error = %e, "Indexing failed");
                self.mark_failed(id);
                return Err(e.into());
            }
        };

        // A delete may have landed while the upsert was in flight.
        match self.metadata.transition(id, FileStatus::Indexed, Some(written)) {
            Ok(_) => {}
            Err(MetadataError::NotFound(_)) => {
                if let Err(e) = self.index.remove(id).await {
                    warn!(file_id = %id, error = %e, "Could not drop chunks of deleted file");
                }
                return Err(PipelineError::DeletedDuringIndexing(id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        info!(file_id = %id, chunks = written, "File indexed");
        self.publish(DomainEvent::FileIndexed {
            file_id: id.to_string(),
            chunks: written,
            timestamp: Utc::now(),
        });
        Ok(written)
    }

    /// Accept and index in one call.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileRecord, PipelineError> {
        let record = self.accept(file_name, bytes.clone()).await?;
        self.index(&record.id, &bytes).await?;
        self.metadata
            .get(&record.id)
            .ok_or(PipelineError::DeletedDuringIndexing(record.id))
    }

    /// Delete a file: index first (best effort), then the object store,
    /// then the registry.
    pub async fn delete(&self, id: &FileId) -> Result<(), PipelineError> {
        if let Err(e) = self.index.remove(id).await {
            // The reconciler hides whatever the index keeps.
            warn!(file_id = %id, error = %e, "Index removal failed, continuing delete");
        }
        match self.objects.delete(id).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) if self.metadata.get(id).is_some() => {
                warn!(file_id = %id, "Object already gone, dropping registry entry");
            }
            Err(StorageError::NotFound(_)) => return Err(PipelineError::NotFound(id.clone())),
            Err(e) => return Err(e.into()),
        }
        self.metadata.remove(id);

        info!(file_id = %id, "File deleted");
        self.publish(DomainEvent::FileDeleted {
            file_id: id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn mark_failed(&self, id: &FileId) {
        if let Err(e) = self.metadata.transition(id, FileStatus::Failed, None) {
            warn!(file_id = %id, error = %e, "Could not mark file failed");
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// Text used for indexing. Non-UTF-8 content gets a placeholder line so the
/// file can still be found by name.
fn extract_text(name: &str, file_type: &str, bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.trim().is_empty() => text.to_string(),
        _ => format!("Filename: {name} (type: {file_type}, content not extractable)"),
    }
}

/// Chunk title; CSV files carry their header row so column names are
/// searchable.
fn chunk_title(name: &str, file_type: &str, text: &str) -> String {
    let title = match (file_type, text.lines().next()) {
        ("csv", Some(header)) if !header.trim().is_empty() => {
            format!("{name} (Schema: {})", header.trim())
        }
        _ => name.to_string(),
    };
    title.chars().take(MAX_TITLE_CHARS).collect()
}

/// Split text into chunks of at most `max_chars` characters, preferring
/// line boundaries.
fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        let line_len = line.chars().count();
        if current_len > 0 && current_len + line_len + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}
