//! TF-IDF indexing and ranking over a directory of text-bearing files.
//!
//! A [`Corpus`] of [`Document`]s is built by walking a root directory,
//! [`IndexBuilder`] computes TF-IDF scores in parallel and produces an
//! immutable [`Snapshot`], and [`QueryEngine`] ranks documents against it.
//! [`SearchIndex`] ties these together with persistence and periodic refresh.

pub mod config;
pub mod content;
pub mod corpus;
pub mod document;
pub mod engine;
pub mod error;
pub mod persist;
pub mod query;
pub mod reindex;
pub mod snapshot;
pub mod stopwords;
pub mod tfidf;
pub mod tokenizer;

pub use config::IndexConfig;
pub use content::{ContentRegistry, ContentSource};
pub use corpus::Corpus;
pub use document::Document;
pub use engine::{IndexStats, SearchIndex, TickOutcome};
pub use error::{Error, Result};
pub use persist::IndexStore;
pub use query::{QueryEngine, RankedDocument};
pub use snapshot::{Snapshot, SnapshotCell};
pub use stopwords::StopwordSet;
pub use tfidf::{IdfWeighting, IndexBuilder};
