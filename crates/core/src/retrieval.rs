//! Retrieval results and the authoritative ID set they are filtered against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::file::FileId;

/// Which backing store produced a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentSource {
    /// Matched text from the secondary content index
    ContentIndex,
    /// Matched the object store's own tags (name, type, ...)
    Metadata,
}

/// A scored piece of retrieved content tied back to its owning file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedFragment {
    pub file_id: FileId,
    pub file_name: String,

    /// Matched text; empty for metadata-only matches
    #[serde(default)]
    pub content: String,

    pub source: FragmentSource,
    pub score: f32,
}

/// Point-in-time set of file IDs that exist in the object store.
///
/// Recomputed for every listing or search. Never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidIdSet(BTreeSet<FileId>);

impl ValidIdSet {
    pub fn contains(&self, id: &FileId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileId> {
        self.0.iter()
    }
}

impl FromIterator<FileId> for ValidIdSet {
    fn from_iter<I: IntoIterator<Item = FileId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_id_set_membership_is_order_independent() {
        let a: ValidIdSet = ["b", "a"].iter().map(|s| FileId::from(s)).collect();
        let b: ValidIdSet = ["a", "b", "a"].iter().map(|s| FileId::from(s)).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert!(a.contains(&FileId::from("a")));
        assert!(!a.contains(&FileId::from("c")));
    }

    #[test]
    fn fragment_source_labels() {
        assert_eq!(serde_json::to_value(FragmentSource::ContentIndex).unwrap(), "content_index");
        assert_eq!(serde_json::to_value(FragmentSource::Metadata).unwrap(), "metadata");
    }
}
