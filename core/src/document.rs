use crate::content::{extension_of, ContentRegistry, ContentSource};
use crate::error::Result;
use crate::tokenizer::{count_terms, tokenize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// How a document's backing file compares with its last indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Modified,
    /// The backing file no longer exists.
    Missing,
    /// The file's metadata could not be read for another reason.
    Unreadable,
}

/// One indexed file: its term counts and TF-IDF scores.
#[derive(Debug)]
pub struct Document {
    path: String,
    extension: String,
    source: Arc<dyn ContentSource>,
    concordance: HashMap<String, u32>,
    tfidf: HashMap<String, f64>,
    indexed_at: OffsetDateTime,
}

impl Document {
    /// Create an unindexed document, resolving its content source by extension.
    pub fn new(path: &Path, registry: &ContentRegistry) -> Result<Self> {
        let extension = extension_of(path);
        let source = registry.resolve(path, &extension)?;
        Ok(Self::from_parts(
            path.to_string_lossy().into_owned(),
            extension,
            source,
            HashMap::new(),
            HashMap::new(),
            OffsetDateTime::UNIX_EPOCH,
        ))
    }

    /// Reassemble a document from previously computed state.
    pub fn from_parts(
        path: String,
        extension: String,
        source: Arc<dyn ContentSource>,
        concordance: HashMap<String, u32>,
        tfidf: HashMap<String, f64>,
        indexed_at: OffsetDateTime,
    ) -> Self {
        Self { path, extension, source, concordance, tfidf, indexed_at }
    }

    /// Re-read and re-tokenize the backing file, replacing the concordance wholesale.
    ///
    /// On failure the previous concordance and timestamp are kept.
    pub fn reindex(&mut self) -> Result<()> {
        let text = self.source.read(Path::new(&self.path))?;
        self.concordance = count_terms(tokenize(&text));
        self.indexed_at = OffsetDateTime::now_utc();
        debug!(path = %self.path, terms = self.concordance.len(), "tokenized document");
        Ok(())
    }

    pub fn staleness(&self) -> Staleness {
        match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) if OffsetDateTime::from(modified) > self.indexed_at => Staleness::Modified,
            Ok(_) => Staleness::Fresh,
            Err(e) if e.kind() == ErrorKind::NotFound => Staleness::Missing,
            Err(e) => {
                warn!(path = %self.path, error = %e, "cannot stat document");
                Staleness::Unreadable
            }
        }
    }

    /// True if the backing file was modified after the last indexing.
    /// A missing or inaccessible file is never considered stale.
    pub fn needs_reindexing(&self) -> bool {
        match self.staleness() {
            Staleness::Modified => true,
            Staleness::Missing => {
                warn!(path = %self.path, "document file no longer exists");
                false
            }
            Staleness::Fresh | Staleness::Unreadable => false,
        }
    }

    pub fn term_frequency(&self, term: &str) -> u32 {
        self.concordance.get(term).copied().unwrap_or(0)
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.concordance.contains_key(term)
    }

    pub fn tfidf_score(&self, term: &str) -> f64 {
        self.tfidf.get(term).copied().unwrap_or(0.0)
    }

    pub(crate) fn set_tfidf(&mut self, scores: HashMap<String, f64>) {
        self.tfidf = scores;
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn concordance(&self) -> &HashMap<String, u32> {
        &self.concordance
    }

    pub fn tfidf(&self) -> &HashMap<String, f64> {
        &self.tfidf
    }

    pub fn indexed_at(&self) -> OffsetDateTime {
        self.indexed_at
    }
}
