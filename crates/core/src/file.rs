//! File records - the registry entries behind every uploaded document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque unique identifier for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to the raw object, as returned by the object store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectLocation(pub String);

/// Processing status of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    Processing,
    Indexed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
        }
    }

    /// Parse a status tag; unknown values read as `Pending`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "processing" => Self::Processing,
            "indexed" => Self::Indexed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Whether the indexing pipeline is done with this file.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Indexed | Self::Failed)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,

    /// Display name, as uploaded
    pub name: String,

    /// Logical type derived from the extension (e.g. "csv", "pdf")
    pub file_type: String,

    /// Size in bytes
    pub size: u64,

    pub uploaded_at: DateTime<Utc>,

    pub status: FileStatus,

    pub location: ObjectLocation,

    /// Number of fragments written to the content index, once indexed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_indexed: Option<u32>,
}

impl FileRecord {
    /// Build a fresh `pending` record for an accepted upload.
    pub fn pending(
        id: FileId,
        name: impl Into<String>,
        size: u64,
        location: ObjectLocation,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            file_type: file_type_of(&name),
            name,
            size,
            uploaded_at: Utc::now(),
            status: FileStatus::Pending,
            location,
            chunks_indexed: None,
        }
    }
}

/// Lowercased extension of `name`, or `"unknown"` when there is none.
pub fn file_type_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
        _ => "unknown".to_string(),
    }
}
