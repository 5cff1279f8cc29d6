//! The file registry.
//!
//! Readers take a shared lock, the upload and delete paths take the write
//! lock. Every mutation touches exactly one record inside one critical
//! section, and no lock is ever held across an `.await`.

use docent_core::file::{FileId, FileRecord, FileStatus};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MetadataError {
    #[error("File not registered: {0}")]
    NotFound(FileId),

    #[error("File already registered: {0}")]
    AlreadyExists(FileId),

    #[error("Illegal status change for {id}: {from} -> {to}")]
    IllegalTransition { id: FileId, from: FileStatus, to: FileStatus },
}

/// In-memory registry of [`FileRecord`]s keyed by [`FileId`].
#[derive(Debug, Default)]
pub struct MetadataStore {
    records: RwLock<HashMap<FileId, FileRecord>>,
}

/// Legal status moves. A failed file may be re-queued for indexing.
fn can_transition(from: FileStatus, to: FileStatus) -> bool {
    use FileStatus::*;
    matches!(
        (from, to),
        (Pending, Processing)
            | (Processing, Indexed)
            | (Processing, Failed)
            | (Pending, Failed)
            | (Failed, Processing)
    )
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: FileRecord) -> Result<(), MetadataError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.id) {
            return Err(MetadataError::AlreadyExists(record.id));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &FileId) -> Option<FileRecord> {
        self.records.read().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    /// All records, newest upload first.
    pub fn list(&self) -> Vec<FileRecord> {
        let mut all: Vec<FileRecord> = self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then_with(|| a.name.cmp(&b.name)));
        all
    }

    /// Move a record to `status`, optionally recording its fragment count.
    pub fn transition(
        &self,
        id: &FileId,
        status: FileStatus,
        chunks_indexed: Option<u32>,
    ) -> Result<FileRecord, MetadataError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records.get_mut(id).ok_or_else(|| MetadataError::NotFound(id.clone()))?;
        if !can_transition(record.status, status) {
            return Err(MetadataError::IllegalTransition {
                id: id.clone(),
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        if chunks_indexed.is_some() {
            record.chunks_indexed = chunks_indexed;
        }
        Ok(record.clone())
    }

    pub fn remove(&self, id: &FileId) -> Option<FileRecord> {
        self.records.write().unwrap_or_else(|e| e.into_inner()).remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
