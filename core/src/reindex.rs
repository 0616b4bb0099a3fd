//! Incremental refresh of a corpus against the files on disk.

use crate::corpus::{walk_files, Corpus};
use crate::document::Staleness;
use crate::error::Error;
use tracing::{debug, info, warn};

/// What one refresh pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Documents re-tokenized because their file was modified.
    pub reindexed: Vec<String>,
    /// Documents dropped because their file was deleted.
    pub removed: Vec<String>,
    /// Files found under the root for the first time.
    pub added: Vec<String>,
    /// Stale documents whose re-read failed, which keep their previous state,
    /// and new files that could not be extracted.
    pub failed: Vec<String>,
}

impl RefreshReport {
    /// Whether the TF-IDF snapshot is out of date after this pass.
    pub fn changed(&self) -> bool {
        !(self.reindexed.is_empty() && self.removed.is_empty() && self.added.is_empty())
    }
}

/// Bring the corpus up to date with its root directory.
///
/// Modified files are re-tokenized, deleted files are dropped and new
/// supported files are added. Per-file failures are logged and skipped.
/// The corpus is marked dirty when anything changed.
pub fn refresh(corpus: &mut Corpus) -> RefreshReport {
    let mut report = RefreshReport::default();

    let mut missing = Vec::new();
    for document in corpus.documents_mut() {
        match document.staleness() {
            Staleness::Fresh | Staleness::Unreadable => {}
            Staleness::Missing => missing.push(document.path().to_string()),
            Staleness::Modified => match document.reindex() {
                Ok(()) => report.reindexed.push(document.path().to_string()),
                Err(e) => {
                    warn!(error = %e, "cannot reindex document, keeping previous terms");
                    report.failed.push(document.path().to_string());
                }
            },
        }
    }
    for path in missing {
        if corpus.remove(&path).is_some() {
            info!(%path, "document file deleted, dropping it");
            report.removed.push(path);
        }
    }

    if corpus.root().is_dir() {
        corpus.forget_missing_failures();
        let candidates: Vec<_> = walk_files(corpus.root())
            .filter(|path| !corpus.contains(&path.to_string_lossy()) && corpus.retry_due(path))
            .collect();
        for path in candidates {
            match corpus.index_file(&path) {
                Ok(()) => report.added.push(path.to_string_lossy().into_owned()),
                Err(e @ Error::UnsupportedFormat { .. }) => debug!(error = %e, "ignoring file"),
                Err(e) => {
                    warn!(error = %e, "cannot index new file, waiting for it to change");
                    report.failed.push(path.to_string_lossy().into_owned());
                }
            }
        }
    } else {
        warn!(root = %corpus.root().display(), "root directory is gone, skipping discovery");
    }

    if report.changed() {
        corpus.mark_dirty();
        info!(
            reindexed = report.reindexed.len(),
            removed = report.removed.len(),
            added = report.added.len(),
            "corpus changed"
        );
    }
    report
}
