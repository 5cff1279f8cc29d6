//! Source-of-truth reconciliation.
//!
//! The object store decides which files exist. The content index is faster
//! to query but may lag behind uploads and may still hold chunks for files
//! that were deleted. Every listing and search here is recomputed against a
//! fresh object-store listing, so a stale index entry can never reach a
//! caller.
//!
//! Failure policy:
//! - listing fails → the search fails closed (no results, error reported)
//! - index fails, listing succeeds → metadata-only results

use chrono::{DateTime, Utc};
use docent_core::error::StorageError;
use docent_core::event::{DomainEvent, EventBus};
use docent_core::file::{FileId, FileRecord, FileStatus, file_type_of};
use docent_core::retrieval::{FragmentSource, RetrievedFragment, ValidIdSet};
use docent_core::storage::{ContentIndex, IndexMatch, ObjectListing, ObjectStore, tags};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::metadata::MetadataStore;

/// Score given to a metadata match on the file name (or a `*` wildcard).
const NAME_MATCH_SCORE: f32 = 1.0;
/// Score given to a metadata match on any other tag value.
const TAG_MATCH_SCORE: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Object store listing unavailable: {0}")]
    ListingUnavailable(StorageError),
}

/// The content index returned entries for files that no longer exist.
///
/// Logged and published as a domain event; the entries are dropped and
/// callers never see this error.
#[derive(Debug, thiserror::Error)]
#[error("content index returned {discarded} fragment(s) for {} deleted file(s)", .file_ids.len())]
pub struct StaleDataError {
    pub file_ids: Vec<FileId>,
    pub discarded: usize,
}

/// How complete a search result is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchStatus {
    /// Both sources answered
    Complete,
    /// The content index failed; only metadata matches are included
    MetadataOnly { reason: String },
    /// The listing failed; nothing is returned
    FailedClosed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub fragments: Vec<RetrievedFragment>,
    #[serde(flatten)]
    pub status: SearchStatus,
}

impl SearchOutcome {
    pub fn is_failed_closed(&self) -> bool {
        matches!(self.status, SearchStatus::FailedClosed { .. })
    }

    /// Fragments that came from the content index.
    pub fn content_fragments(&self) -> impl Iterator<Item = &RetrievedFragment> {
        self.fragments.iter().filter(|f| f.source == FragmentSource::ContentIndex)
    }
}

pub struct SourceOfTruthReconciler {
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn ContentIndex>,
    metadata: Arc<MetadataStore>,
    events: Option<Arc<EventBus>>,
}

impl SourceOfTruthReconciler {
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
        }
    }

    /// Publish stale-data discards on this bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// The authoritative set of file IDs, straight from the object store.
    pub async fn list_active(&self) -> Result<ValidIdSet, ReconcileError> {
        let listing = self
            .objects
            .list()
            .await
            .map_err(ReconcileError::ListingUnavailable)?;
        Ok(listing.into_iter().map(|l| l.file_id).collect())
    }

    /// Every file that currently exists, newest upload first.
    ///
    /// Registry records are used when present; otherwise the record is
    /// rebuilt from the object's tags (e.g. objects written by another
    /// process).
    pub async fn list_files(&self) -> Result<Vec<FileRecord>, ReconcileError> {
        let listing = self
            .objects
            .list()
            .await
            .map_err(ReconcileError::ListingUnavailable)?;
        let mut files: Vec<FileRecord> = listing
            .iter()
            .map(|l| {
                self.metadata
                    .get(&l.file_id)
                    .unwrap_or_else(|| record_from_tags(l))
            })
            .collect();
        files.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(files)
    }

    /// Search file contents and metadata, filtered to files that exist.
    pub async fn search(&self, query: &str, top_k: usize) -> SearchOutcome {
        // Several chunks of one file collapse into one fragment, so ask the
        // index for more than we return.
        let fetch_k = top_k.saturating_mul(3).max(top_k);
        let (listing, matches) =
            tokio::join!(self.objects.list(), self.index.query(query, fetch_k));

        let listing = match listing {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, query, "Listing failed, search fails closed");
                return SearchOutcome {
                    fragments: Vec::new(),
                    status: SearchStatus::FailedClosed { reason: e.to_string() },
                };
            }
        };
        let valid: ValidIdSet = listing.iter().map(|l| l.file_id.clone()).collect();
        let names: HashMap<&FileId, String> = listing
            .iter()
            .map(|l| (&l.file_id, self.display_name(l)))
            .collect();

        let mut merged: HashMap<FileId, RetrievedFragment> = HashMap::new();
        let status = match matches {
            Ok(matches) => {
                let (fresh, stale) = partition_stale(matches, &valid);
                if let Some(stale) = stale {
                    self.report_stale(stale);
                }
                for m in fresh {
                    let file_name = names
                        .get(&m.file_id)
                        .cloned()
                        .unwrap_or_else(|| m.title.clone());
                    keep_best(
                        &mut merged,
                        RetrievedFragment {
                            file_id: m.file_id,
                            file_name,
                            content: m.content,
                            source: FragmentSource::ContentIndex,
                            score: m.score,
                        },
                    );
                }
                SearchStatus::Complete
            }
            Err(e) => {
                warn!(
                    error = %e,
                    query,
                    "Content index unavailable, returning metadata matches only"
                );
                SearchStatus::MetadataOnly { reason: e.to_string() }
            }
        };

        let needle = normalize_query(query);
        for l in &listing {
            if let Some(score) = metadata_score(l, &needle) {
                let record = self
                    .metadata
                    .get(&l.file_id)
                    .unwrap_or_else(|| record_from_tags(l));
                keep_best(
                    &mut merged,
                    RetrievedFragment {
                        file_id: l.file_id.clone(),
                        file_name: record.name.clone(),
                        content: describe(&record),
                        source: FragmentSource::Metadata,
                        score,
                    },
                );
            }
        }

        let mut fragments: Vec<RetrievedFragment> = merged.into_values().collect();
        fragments.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_name.cmp(&b.file_name))
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        fragments.truncate(top_k);
        debug!(
            query,
            results = fragments.len(),
            valid = valid.len(),
            "Search reconciled"
        );

        SearchOutcome { fragments, status }
    }

    fn display_name(&self, listing: &ObjectListing) -> String {
        self.metadata
            .get(&listing.file_id)
            .map(|r| r.name)
            .or_else(|| listing.tag(tags::FILENAME).map(str::to_string))
            .unwrap_or_else(|| listing.location.0.clone())
    }

    fn report_stale(&self, stale: StaleDataError) {
        warn!(
            error = %stale,
            file_ids = ?stale.file_ids,
            "Discarding index entries for deleted files"
        );
        if let Some(events) = &self.events {
            events.publish(DomainEvent::StaleFragmentsDiscarded {
                file_ids: stale.file_ids.iter().map(|id| id.to_string()).collect(),
                timestamp: Utc::now(),
            });
        }
    }
}

/// Split index matches into those backed by an existing file and a report
/// of the ones that are not.
fn partition_stale(
    matches: Vec<IndexMatch>,
    valid: &ValidIdSet,
) -> (Vec<IndexMatch>, Option<StaleDataError>) {
    let (fresh, stale): (Vec<_>, Vec<_>) = matches
        .into_iter()
        .partition(|m| valid.contains(&m.file_id));
    if stale.is_empty() {
        return (fresh, None);
    }
    let mut file_ids: Vec<FileId> = stale.iter().map(|m| m.file_id.clone()).collect();
    file_ids.sort();
    file_ids.dedup();
    let discarded = stale.len();
    (
        fresh,
        Some(StaleDataError {
            file_ids,
            discarded,
        }),
    )
}

/// Insert `fragment` unless a higher-scored fragment for the same file is
/// already present.
fn keep_best(merged: &mut HashMap<FileId, RetrievedFragment>, fragment: RetrievedFragment) {
    match merged.get(&fragment.file_id) {
        Some(existing) if existing.score >= fragment.score => {}
        _ => {
            merged.insert(fragment.file_id.clone(), fragment);
        }
    }
}

/// Lowercase and strip surrounding whitespace and quote characters.
fn normalize_query(query: &str) -> String {
    query
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_lowercase()
}

/// Score a listing's tags against a normalized query.
///
/// A name match scores highest: the query is part of the name, or the whole
/// name appears in the query as its own token (so "sales.csv" matches "show
/// me sales.csv" but "data" does not match "database"). A match on any other
/// tag value scores lower. `*` matches every file.
fn metadata_score(listing: &ObjectListing, needle: &str) -> Option<f32> {
    if needle.is_empty() {
        return None;
    }
    if needle == "*" {
        return Some(NAME_MATCH_SCORE);
    }
    let name = listing
        .tag(tags::FILENAME)
        .unwrap_or(&listing.location.0)
        .to_lowercase();
    if name.contains(needle) || contains_token(needle, &name) {
        return Some(NAME_MATCH_SCORE);
    }
    let tag_hit = listing
        .tags
        .iter()
        .filter(|(key, _)| key.as_str() != tags::FILENAME)
        .any(|(_, value)| value.to_lowercase() == needle);
    tag_hit.then_some(TAG_MATCH_SCORE)
}

/// True when `token` occurs in `text` with no letter or digit on either side.
fn contains_token(text: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    text.match_indices(token).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + token.len()..].chars().next();
        let bounded = |c: Option<char>| !c.is_some_and(char::is_alphanumeric);
        bounded(before) && bounded(after)
    })
}

/// Rebuild a record from object tags when the registry has none.
fn record_from_tags(listing: &ObjectListing) -> FileRecord {
    let name = listing
        .tag(tags::FILENAME)
        .map(str::to_string)
        .unwrap_or_else(|| listing.location.0.clone());
    FileRecord {
        id: listing.file_id.clone(),
        file_type: listing
            .tag(tags::FILE_TYPE)
            .map(str::to_string)
            .unwrap_or_else(|| file_type_of(&name)),
        size: listing.tag(tags::SIZE).and_then(|s| s.parse().ok()).unwrap_or(0),
        uploaded_at: listing
            .tag(tags::UPLOADED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        status: listing.tag(tags::STATUS).map(FileStatus::parse).unwrap_or_default(),
        location: listing.location.clone(),
        chunks_indexed: None,
        name,
    }
}

fn describe(record: &FileRecord) -> String {
    format!(
        "{} ({} file, {} bytes, status: {})",
        record.name, record.file_type, record.size, record.status
    )
}
