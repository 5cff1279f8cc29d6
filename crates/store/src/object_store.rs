//! In-memory object store - the source of truth for tests and the CLI.

use async_trait::async_trait;
use docent_core::error::StorageError;
use docent_core::file::{FileId, ObjectLocation};
use docent_core::storage::{ObjectListing, ObjectStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct StoredObject {
    location: ObjectLocation,
    bytes: Vec<u8>,
    tags: HashMap<String, String>,
}

/// Keeps objects in a map keyed by file ID. Locations take the form
/// `{file_id}/{file_name}`.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<FileId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn put(
        &self,
        file_id: &FileId,
        file_name: &str,
        bytes: Vec<u8>,
        tags: HashMap<String, String>,
    ) -> Result<ObjectLocation, StorageError> {
        let location = ObjectLocation(format!("{file_id}/{file_name}"));
        self.objects.write().await.insert(
            file_id.clone(),
            StoredObject { location: location.clone(), bytes, tags },
        );
        Ok(location)
    }

    async fn get(&self, file_id: &FileId) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(file_id)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(file_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<ObjectListing>, StorageError> {
        let objects = self.objects.read().await;
        let mut listing: Vec<ObjectListing> = objects
            .iter()
            .map(|(id, o)| ObjectListing {
                file_id: id.clone(),
                location: o.location.clone(),
                tags: o.tags.clone(),
            })
            .collect();
        listing.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(listing)
    }

    async fn delete(&self, file_id: &FileId) -> Result<(), StorageError> {
        match self.objects.write().await.remove(file_id) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(file_id.to_string())),
        }
    }
}
