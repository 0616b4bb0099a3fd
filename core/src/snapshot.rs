//! Immutable TF-IDF snapshots and the cell they are published through.
//!
//! Queries clone the current `Arc<Snapshot>` and then read without holding
//! any lock, so a rebuild never blocks them and they never observe a
//! half-built result. Publishing swaps the pointer under a short write lock.

use crate::document::Document;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub path: String,
    pub scores: HashMap<String, f64>,
}

/// A complete path -> (term -> score) mapping from one build, in corpus order.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    built_at: OffsetDateTime,
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::from_entries(Vec::new())
    }

    pub fn from_entries(entries: Vec<SnapshotEntry>) -> Self {
        Self { generation: 0, built_at: OffsetDateTime::now_utc(), entries }
    }

    /// Capture the current TF-IDF maps of `documents`.
    pub fn capture(documents: &[Document]) -> Self {
        Self::from_entries(
            documents
                .iter()
                .map(|d| SnapshotEntry { path: d.path().to_string(), scores: d.tfidf().clone() })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn score(&self, path: &str, term: &str) -> f64 {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .and_then(|e| e.scores.get(term).copied())
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct terms with a score in any document.
    pub fn term_count(&self) -> usize {
        let mut terms = std::collections::HashSet::new();
        for entry in &self.entries {
            terms.extend(entry.scores.keys().map(String::as_str));
        }
        terms.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> OffsetDateTime {
        self.built_at
    }
}

/// Holds the currently published snapshot.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<Snapshot>>,
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self { current: RwLock::new(Arc::new(Snapshot::empty())) }
    }
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last published snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Replace the published snapshot, stamping it with the next generation.
    pub fn publish(&self, mut snapshot: Snapshot) -> Arc<Snapshot> {
        let mut current = self.current.write();
        snapshot.generation = current.generation + 1;
        let snapshot = Arc::new(snapshot);
        *current = Arc::clone(&snapshot);
        snapshot
    }
}
