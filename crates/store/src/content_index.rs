//! In-memory content index with keyword scoring.
//!
//! Deliberately knows nothing about deletions in the object store: entries
//! stay until `remove` is called, exactly like a lagging search service.

use async_trait::async_trait;
use docent_core::error::StorageError;
use docent_core::file::FileId;
use docent_core::storage::{ContentIndex, IndexChunk, IndexMatch};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryContentIndex {
    chunks: RwLock<HashMap<FileId, Vec<IndexChunk>>>,
}

impl InMemoryContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files with at least one chunk.
    pub async fn file_count(&self) -> usize {
        self.chunks.read().await.len()
    }
}

/// Lowercased alphanumeric terms of `text`, shorter than two chars dropped.
pub(crate) fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query terms present in the chunk, with a small bonus for
/// repeated hits. Zero when nothing matches.
fn score(query_terms: &[String], chunk: &IndexChunk) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let haystack = format!("{} {}", chunk.title, chunk.content).to_lowercase();
    let mut matched = 0usize;
    let mut occurrences = 0usize;
    for term in query_terms {
        let hits = haystack.matches(term.as_str()).count();
        if hits > 0 {
            matched += 1;
            occurrences += hits;
        }
    }
    if matched == 0 {
        return 0.0;
    }
    let coverage = matched as f32 / query_terms.len() as f32;
    let density = (occurrences as f32 / 10.0).min(0.1);
    (coverage * 0.9 + density).min(1.0)
}

#[async_trait]
impl ContentIndex for InMemoryContentIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(
        &self,
        file_id: &FileId,
        chunks: Vec<IndexChunk>,
    ) -> Result<usize, StorageError> {
        let count = chunks.len();
        self.chunks.write().await.insert(file_id.clone(), chunks);
        Ok(count)
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexMatch>, StorageError> {
        let query_terms = terms(text);
        let index = self.chunks.read().await;

        let mut matches: Vec<IndexMatch> = index
            .iter()
            .flat_map(|(id, chunks)| {
                let query_terms = &query_terms;
                chunks.iter().filter_map(move |chunk| {
                    let s = score(query_terms, chunk);
                    (s > 0.0).then(|| IndexMatch {
                        file_id: id.clone(),
                        title: chunk.title.clone(),
                        content: chunk.content.clone(),
                        score: s,
                    })
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn remove(&self, file_id: &FileId) -> Result<(), StorageError> {
        self.chunks.write().await.remove(file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, content: &str) -> IndexChunk {
        IndexChunk { title: title.into(), content: content.into() }
    }

    #[test]
    fn terms_split_and_lowercase() {
        assert_eq!(terms("Average of 'Revenue', Q3!"), vec!["average", "of", "revenue", "q3"]);
        assert!(terms("a ? !").is_empty());
    }

    #[tokio::test]
    async fn query_ranks_by_coverage() {
        let index = InMemoryContentIndex::new();
        index
            .upsert(&FileId::from("a"), vec![chunk("sales.csv", "region revenue units")])
            .await
            .unwrap();
        index
            .upsert(&FileId::from("b"), vec![chunk("notes.txt", "revenue grew last year")])
            .await
            .unwrap();

        let results = index.query("regional revenue", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|m| m.score > 0.0));

        let results = index.query("region revenue", 10).await.unwrap();
        assert_eq!(results[0].file_id, FileId::from("a"));
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_drops() {
        let index = InMemoryContentIndex::new();
        let id = FileId::from("a");
        index.upsert(&id, vec![chunk("t", "alpha"), chunk("t", "beta")]).await.unwrap();
        index.upsert(&id, vec![chunk("t", "gamma")]).await.unwrap();
        assert!(index.query("alpha", 5).await.unwrap().is_empty());
        assert_eq!(index.query("gamma", 5).await.unwrap().len(), 1);

        index.remove(&id).await.unwrap();
        assert_eq!(index.file_count().await, 0);
        index.remove(&id).await.unwrap();
    }

    #[tokio::test]
    async fn top_k_truncates() {
        let index = InMemoryContentIndex::new();
        let chunks = (0..5).map(|i| chunk("t", &format!("budget line {i}"))).collect();
        index.upsert(&FileId::from("a"), chunks).await.unwrap();
        assert_eq!(index.query("budget", 3).await.unwrap().len(), 3);
    }
}
