//! Parallel TF-IDF computation over a corpus.
//!
//! The document collection is split into contiguous index ranges (shards),
//! one per worker. Each worker reads the whole collection to count document
//! frequencies and writes only the output slots of its own shard, so the
//! parallel phase needs no locks. Results are applied to the documents on the
//! calling thread after every worker has joined.

use crate::corpus::Corpus;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use crate::stopwords::StopwordSet;
use rayon::prelude::*;
use std::any::Any;
use std::collections::HashMap;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info};

pub type TermScores = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdfWeighting {
    /// `log10(N / df)`
    #[default]
    Plain,
    /// `log10(1 + N / df)`; terms found in every document keep a positive weight.
    Smoothed,
}

impl IdfWeighting {
    /// Inverse document frequency of a term found in `df` of `n` documents.
    pub fn idf(self, n: usize, df: usize) -> f64 {
        if df == 0 || n == 0 {
            return 0.0;
        }
        let ratio = n as f64 / df as f64;
        match self {
            IdfWeighting::Plain => ratio.log10(),
            IdfWeighting::Smoothed => (1.0 + ratio).log10(),
        }
    }
}

/// Split `n` items into at most `workers` contiguous ranges of `ceil(n / w)` items.
/// The worker count is clamped to `n`, so no range is empty.
pub fn shard_ranges(n: usize, workers: usize) -> Vec<Range<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let effective = workers.clamp(1, n);
    let len = n.div_ceil(effective);
    (0..n).step_by(len).map(|start| start..(start + len).min(n)).collect()
}

/// Number of documents whose concordance contains `term`.
pub fn document_frequency(term: &str, documents: &[Document]) -> usize {
    documents.iter().filter(|d| d.contains_term(term)).count()
}

#[derive(Debug)]
pub struct IndexBuilder {
    workers: usize,
    weighting: IdfWeighting,
    pool: rayon::ThreadPool,
    #[cfg(test)]
    fail_next: std::sync::atomic::AtomicBool,
}

impl IndexBuilder {
    pub fn new(workers: usize, weighting: IdfWeighting) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Config("worker count must be at least 1".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tfidf-worker-{i}"))
            .build()
            .map_err(|e| Error::Build(format!("cannot start worker pool: {e}")))?;
        Ok(Self {
            workers,
            weighting,
            pool,
            #[cfg(test)]
            fail_next: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn weighting(&self) -> IdfWeighting {
        self.weighting
    }

    /// Recompute every document's TF-IDF scores and capture a new snapshot.
    ///
    /// On error no document is touched.
    pub fn build(&self, corpus: &mut Corpus) -> Result<Snapshot> {
        let start = Instant::now();
        self.check_injected_failure()?;
        if corpus.is_empty() {
            corpus.mark_built();
            return Ok(Snapshot::empty());
        }
        let scores = self.compute(corpus.documents(), corpus.stopwords())?;
        for (document, tfidf) in corpus.documents_mut().iter_mut().zip(scores) {
            document.set_tfidf(tfidf);
        }
        corpus.mark_built();
        let snapshot = Snapshot::capture(corpus.documents());
        info!(
            documents = snapshot.len(),
            workers = shard_ranges(snapshot.len(), self.workers).len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built tf-idf index"
        );
        Ok(snapshot)
    }

    /// TF-IDF scores for each document, in input order.
    pub fn compute(&self, documents: &[Document], stopwords: &StopwordSet) -> Result<Vec<TermScores>> {
        let weighting = self.weighting;
        self.run_shards(documents.len(), |range, out| {
            // df lookups are memoized per worker only; nothing is shared.
            let mut df_cache = HashMap::new();
            for (slot, document) in out.iter_mut().zip(&documents[range]) {
                *slot = score_document(document, documents, stopwords, weighting, &mut df_cache);
            }
        })
    }

    /// Make the next [`build`](Self::build) fail before touching the corpus.
    #[cfg(test)]
    pub(crate) fn fail_next_build(&self) {
        self.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn check_injected_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::Build("injected failure".into()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_injected_failure(&self) -> Result<()> {
        Ok(())
    }

    fn run_shards<F>(&self, n: usize, score_shard: F) -> Result<Vec<TermScores>>
    where
        F: Fn(Range<usize>, &mut [TermScores]) + Sync,
    {
        let ranges = shard_ranges(n, self.workers);
        let Some(shard_len) = ranges.first().map(|r| r.len()) else {
            return Ok(Vec::new());
        };
        debug!(documents = n, shards = ranges.len(), shard_len, "starting tf-idf workers");

        let mut slots = vec![TermScores::new(); n];
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                slots
                    .par_chunks_mut(shard_len)
                    .zip(ranges.into_par_iter())
                    .for_each(|(out, range)| score_shard(range, out));
            })
        }))
        .map_err(|payload| Error::Build(format!("worker panicked: {}", panic_message(payload.as_ref()))))?;
        Ok(slots)
    }
}

fn score_document<'a>(
    document: &'a Document,
    corpus: &'a [Document],
    stopwords: &StopwordSet,
    weighting: IdfWeighting,
    df_cache: &mut HashMap<&'a str, usize>,
) -> TermScores {
    let n = corpus.len();
    document
        .concordance()
        .iter()
        .filter(|(term, _)| !stopwords.contains(term))
        .map(|(term, &tf)| {
            let df = *df_cache
                .entry(term.as_str())
                .or_insert_with(|| document_frequency(term, corpus));
            (term.clone(), f64::from(tf) * weighting.idf(n, df))
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
