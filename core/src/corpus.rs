use crate::content::ContentRegistry;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::stopwords::StopwordSet;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// The full collection of indexed documents under one root directory.
///
/// Documents keep discovery order, which is also the tie-break order for
/// equally ranked query results. Paths are unique.
#[derive(Debug)]
pub struct Corpus {
    root: PathBuf,
    registry: ContentRegistry,
    stopwords: Arc<StopwordSet>,
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
    /// Files whose extraction failed, with their modification time at the time.
    failed: HashMap<PathBuf, Option<SystemTime>>,
    dirty: bool,
}

impl Corpus {
    pub fn new(root: &Path, registry: ContentRegistry, stopwords: Arc<StopwordSet>) -> Self {
        Self {
            root: root.to_path_buf(),
            registry,
            stopwords,
            documents: Vec::new(),
            positions: HashMap::new(),
            failed: HashMap::new(),
            dirty: false,
        }
    }

    /// Walk `root` recursively and tokenize every supported file.
    ///
    /// Unsupported or unreadable files are logged and left out. Fails only
    /// when `root` is not a directory.
    pub fn build(root: &Path, registry: ContentRegistry, stopwords: Arc<StopwordSet>) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::InvalidRoot { path: root.to_path_buf() });
        }
        let start = Instant::now();
        let mut corpus = Self::new(root, registry, stopwords);
        let mut skipped = 0usize;
        for path in walk_files(root) {
            match corpus.index_file(&path) {
                Ok(()) => {}
                Err(e @ Error::UnsupportedFormat { .. }) => {
                    debug!(error = %e, "skipping file");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "skipping file");
                    skipped += 1;
                }
            }
        }
        corpus.dirty = true;
        info!(
            root = %root.display(),
            documents = corpus.len(),
            skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built document corpus"
        );
        Ok(corpus)
    }

    /// Create, tokenize and add the document for `path`.
    ///
    /// A failed extraction is remembered so the file is not retried until
    /// it changes (see [`retry_due`](Self::retry_due)).
    pub fn index_file(&mut self, path: &Path) -> Result<()> {
        let mut document = Document::new(path, &self.registry)?;
        if let Err(e) = document.reindex() {
            self.failed.insert(path.to_path_buf(), modified_time(path));
            return Err(e);
        }
        self.failed.remove(path);
        self.insert(document);
        Ok(())
    }

    /// False for a file whose last extraction failed and which has not been
    /// modified since.
    pub fn retry_due(&self, path: &Path) -> bool {
        match self.failed.get(path) {
            Some(Some(seen)) => modified_time(path).as_ref() != Some(seen),
            Some(None) | None => true,
        }
    }

    /// Drop remembered failures for files that no longer exist.
    pub(crate) fn forget_missing_failures(&mut self) {
        self.failed.retain(|path, _| path.exists());
    }

    /// Add a document, replacing any existing one with the same path.
    pub fn insert(&mut self, document: Document) {
        match self.positions.get(document.path()) {
            Some(&i) => self.documents[i] = document,
            None => {
                self.positions.insert(document.path().to_string(), self.documents.len());
                self.documents.push(document);
            }
        }
    }

    /// Remove the document for `path`, keeping the order of the rest.
    pub fn remove(&mut self, path: &str) -> Option<Document> {
        let index = self.positions.remove(path)?;
        let removed = self.documents.remove(index);
        for position in self.positions.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.positions.get(path).map(|&i| &self.documents[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.positions.contains_key(path)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    pub fn stopwords(&self) -> &StopwordSet {
        &self.stopwords
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether concordances changed since the last successful TF-IDF build.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_built(&mut self) {
        self.dirty = false;
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Regular files under `root` in a stable, name-sorted order.
pub(crate) fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "cannot read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}
