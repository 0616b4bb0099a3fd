//! The running index: corpus, published snapshot and their lifecycle.
//!
//! The corpus sits behind a mutex that only the control path takes (startup
//! build, reindex ticks). Holding it for a whole tick makes ticks and builds
//! single-flight. Queries never touch it; they read the published snapshot.

use crate::config::IndexConfig;
use crate::content::ContentRegistry;
use crate::corpus::Corpus;
use crate::error::Result;
use crate::persist::IndexStore;
use crate::query::{QueryEngine, RankedDocument};
use crate::reindex::refresh;
use crate::snapshot::{Snapshot, SnapshotCell};
use crate::stopwords::StopwordSet;
use crate::tfidf::IndexBuilder;
use crate::tokenizer::tokenize;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, error, info, warn};

/// Result of one reindex tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Another tick or build was still running.
    Skipped,
    Unchanged,
    Rebuilt { reindexed: usize, added: usize, removed: usize, generation: u64 },
    /// The rebuild failed; the previous snapshot is still published.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub terms: usize,
    pub generation: u64,
    /// RFC 3339
    pub built_at: String,
}

pub struct SearchIndex {
    corpus: Mutex<Corpus>,
    builder: IndexBuilder,
    store: IndexStore,
    published: SnapshotCell,
    query: QueryEngine,
}

impl SearchIndex {
    /// Validate `config`, then load the persisted index or build a fresh one.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        Self::open_with(config, ContentRegistry::default())
    }

    pub fn open_with(config: &IndexConfig, registry: ContentRegistry) -> Result<Self> {
        config.validate()?;
        let stopwords = Arc::new(match &config.stopwords {
            Some(path) => StopwordSet::load(path),
            None => StopwordSet::english(),
        });
        let builder = IndexBuilder::new(config.workers, config.weighting)?;
        let store = IndexStore::new(&config.index_dir);

        let loaded = if store.exists() {
            match store.load(&config.root, registry.clone(), Arc::clone(&stopwords)) {
                Ok(corpus) => Some(corpus),
                Err(e) => {
                    warn!(error = %e, "cannot load persisted index, rebuilding");
                    None
                }
            }
        } else {
            None
        };

        // Saved scores may come from another weighting or stopword list, so a
        // loaded corpus is rescored from its concordances like a fresh one.
        let mut corpus = match loaded {
            Some(corpus) => corpus,
            None => Corpus::build(&config.root, registry, stopwords)?,
        };
        let snapshot = builder.build(&mut corpus)?;
        if let Err(e) = store.save(&corpus) {
            error!(error = %e, "cannot save index");
        }
        let index = Self::assemble(corpus, builder, store, config);
        index.published.publish(snapshot);
        info!(documents = index.snapshot().len(), "index ready");
        Ok(index)
    }

    fn assemble(corpus: Corpus, builder: IndexBuilder, store: IndexStore, config: &IndexConfig) -> Self {
        Self {
            corpus: Mutex::new(corpus),
            builder,
            store,
            published: SnapshotCell::new(),
            query: QueryEngine::new(config.min_score),
        }
    }

    /// Rank documents against already-normalized terms.
    pub fn rank(&self, terms: &[String]) -> Vec<RankedDocument> {
        self.query.rank(&self.published.load(), terms)
    }

    /// Tokenize free text and rank documents against the resulting terms.
    pub fn search(&self, text: &str) -> Vec<RankedDocument> {
        self.rank(&tokenize(text))
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.load()
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.published.load();
        IndexStats {
            documents: snapshot.len(),
            terms: snapshot.term_count(),
            generation: snapshot.generation(),
            built_at: snapshot.built_at().format(&Rfc3339).unwrap_or_default(),
        }
    }

    /// Refresh changed documents and, if anything changed, rebuild, publish
    /// and persist a new snapshot. Skipped when another tick is in flight.
    pub fn tick(&self) -> TickOutcome {
        let Some(mut corpus) = self.corpus.try_lock() else {
            debug!("reindex already running, skipping tick");
            return TickOutcome::Skipped;
        };
        let report = refresh(&mut corpus);
        if !corpus.is_dirty() {
            return TickOutcome::Unchanged;
        }

        match self.builder.build(&mut corpus) {
            Ok(snapshot) => {
                let published = self.published.publish(snapshot);
                if let Err(e) = self.store.save(&corpus) {
                    error!(error = %e, "cannot save index, keeping previous file");
                }
                TickOutcome::Rebuilt {
                    reindexed: report.reindexed.len(),
                    added: report.added.len(),
                    removed: report.removed.len(),
                    generation: published.generation(),
                }
            }
            Err(e) => {
                error!(error = %e, "rebuild failed, previous snapshot stays published");
                TickOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("builder", &self.builder)
            .field("generation", &self.published.load().generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn tick_is_skipped_while_another_holds_the_corpus() {
        let root = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(root.path().join("a.txt"), "alpha beta").unwrap();
        let index = SearchIndex::open(&IndexConfig::new(root.path(), out.path())).unwrap();

        let held = index.corpus.lock();
        assert_eq!(index.tick(), TickOutcome::Skipped);
        drop(held);
        assert_eq!(index.tick(), TickOutcome::Unchanged);
    }

    #[test]
    fn failed_rebuild_keeps_snapshot_and_retries() {
        let root = tempdir().unwrap();
        let out = tempdir().unwrap();
        let a = root.path().join("a.txt");
        fs::write(&a, "alpha beta").unwrap();
        fs::write(root.path().join("b.txt"), "gamma").unwrap();
        let index = SearchIndex::open(&IndexConfig::new(root.path(), out.path())).unwrap();
        let generation = index.stats().generation;

        fs::write(&a, "delta beta").unwrap();
        File::options()
            .write(true)
            .open(&a)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
        index.builder.fail_next_build();
        assert!(matches!(index.tick(), TickOutcome::Failed { .. }));
        assert_eq!(index.stats().generation, generation);
        assert_eq!(index.search("alpha").len(), 1);
        assert!(index.search("delta").is_empty());
        assert!(index.corpus.lock().is_dirty());

        // the future mtime keeps a.txt stale, so only the generation is checked
        assert!(matches!(index.tick(), TickOutcome::Rebuilt { generation: g, .. } if g == generation + 1));
        assert!(index.search("alpha").is_empty());
        assert_eq!(index.search("delta").len(), 1);
        assert!(!index.corpus.lock().is_dirty());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(TickOutcome::Rebuilt { reindexed: 1, added: 2, removed: 0, generation: 4 })
            .unwrap();
        assert_eq!(json["outcome"], "rebuilt");
        assert_eq!(json["added"], 2);
        assert_eq!(serde_json::to_value(TickOutcome::Skipped).unwrap()["outcome"], "skipped");
    }
}
