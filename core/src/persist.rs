use crate::content::ContentRegistry;
use crate::corpus::Corpus;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::stopwords::StopwordSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub root: String,
    pub num_docs: usize,
    pub created_at: String,
}

/// One entry of `index_docs.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedDocument {
    pub filepath: String,
    pub extension: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "indexedAt")]
    pub indexed_at: i64,
    pub concordance: HashMap<String, u32>,
    pub tfidf: HashMap<String, f64>,
}

impl PersistedDocument {
    fn from_document(document: &Document) -> Self {
        Self {
            filepath: document.path().to_string(),
            extension: document.extension().to_string(),
            indexed_at: (document.indexed_at().unix_timestamp_nanos() / 1_000_000) as i64,
            concordance: document.concordance().clone(),
            tfidf: document.tfidf().clone(),
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn documents(&self) -> PathBuf { self.root.join("index_docs.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Reads and writes a corpus's index data under one directory.
pub struct IndexStore {
    paths: IndexPaths,
}

impl IndexStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { paths: IndexPaths::new(dir) }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Whether a usable index file from this format version is present.
    pub fn exists(&self) -> bool {
        if !self.paths.documents().is_file() {
            return false;
        }
        match self.load_meta() {
            Ok(meta) => meta.version == FORMAT_VERSION,
            Err(Error::NotFound { .. }) => true,
            Err(_) => false,
        }
    }

    /// Write every document of `corpus`. The previous index stays in place if writing fails.
    pub fn save(&self, corpus: &Corpus) -> Result<()> {
        fs::create_dir_all(&self.paths.root).map_err(|e| self.persistence_error(&self.paths.root, e))?;
        let documents: Vec<PersistedDocument> =
            corpus.documents().iter().map(PersistedDocument::from_document).collect();
        write_json_atomic(&self.paths.documents(), &documents)?;

        let meta = MetaFile {
            version: FORMAT_VERSION,
            root: corpus.root().to_string_lossy().into_owned(),
            num_docs: documents.len(),
            created_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        };
        write_json_atomic(&self.paths.meta(), &meta)?;
        info!(dir = %self.paths.root.display(), documents = meta.num_docs, "saved index");
        Ok(())
    }

    /// Rebuild a corpus from disk. Any problem fails the whole load.
    pub fn load(&self, root: &Path, registry: ContentRegistry, stopwords: Arc<StopwordSet>) -> Result<Corpus> {
        let path = self.paths.documents();
        match self.load_meta() {
            Ok(meta) => {
                if meta.version != FORMAT_VERSION {
                    return Err(self.persistence_error(&path, format!("format version {} is not {FORMAT_VERSION}", meta.version)));
                }
                if Path::new(&meta.root) != root {
                    return Err(self.persistence_error(&path, format!("index was built for {}", meta.root)));
                }
            }
            Err(Error::NotFound { .. }) => warn!(dir = %self.paths.root.display(), "index has no meta file"),
            Err(e) => return Err(e),
        }

        let persisted: Vec<PersistedDocument> = read_json(&path)?;
        let mut corpus = Corpus::new(root, registry, stopwords);
        for entry in persisted {
            if corpus.contains(&entry.filepath) {
                return Err(self.persistence_error(&path, format!("duplicate document {}", entry.filepath)));
            }
            let source = corpus
                .registry()
                .resolve(Path::new(&entry.filepath), &entry.extension)
                .map_err(|e| self.persistence_error(&path, e))?;
            let indexed_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(entry.indexed_at) * 1_000_000)
                .map_err(|e| self.persistence_error(&path, format!("{}: {e}", entry.filepath)))?;
            corpus.insert(Document::from_parts(
                entry.filepath,
                entry.extension,
                source,
                entry.concordance,
                entry.tfidf,
                indexed_at,
            ));
        }
        info!(dir = %self.paths.root.display(), documents = corpus.len(), "loaded index");
        Ok(corpus)
    }

    pub fn load_meta(&self) -> Result<MetaFile> {
        read_json(&self.paths.meta())
    }

    fn persistence_error(&self, path: &Path, message: impl std::fmt::Display) -> Error {
        Error::Persistence { path: path.to_path_buf(), message: message.to_string() }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound { path: path.to_path_buf() })
        }
        Err(e) => return Err(Error::Persistence { path: path.to_path_buf(), message: e.to_string() }),
    };
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| Error::Persistence { path: path.to_path_buf(), message: e.to_string() })
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let write = || -> std::io::Result<()> {
        let mut f = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut f, value)?;
        f.flush()?;
        f.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::Persistence { path: path.to_path_buf(), message: e.to_string() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfidf::{IdfWeighting, IndexBuilder};
    use tempfile::tempdir;

    fn built_corpus(root: &Path) -> Corpus {
        fs::write(root.join("one.txt"), "the cat sat on the mat").unwrap();
        fs::write(root.join("two.txt"), "the dog ran").unwrap();
        fs::write(root.join("three.xml"), "<doc><p>cat and dog</p></doc>").unwrap();
        let mut corpus = Corpus::build(root, ContentRegistry::default(), Arc::new(StopwordSet::parse("the"))).unwrap();
        IndexBuilder::new(2, IdfWeighting::Plain).unwrap().build(&mut corpus).unwrap();
        corpus
    }

    #[test]
    fn round_trip_preserves_scores() {
        let docs = tempdir().unwrap();
        let index = tempdir().unwrap();
        let corpus = built_corpus(docs.path());
        let store = IndexStore::new(index.path());
        assert!(!store.exists());
        store.save(&corpus).unwrap();
        assert!(store.exists());

        let loaded = store
            .load(docs.path(), ContentRegistry::default(), Arc::new(StopwordSet::parse("the")))
            .unwrap();
        assert_eq!(loaded.len(), corpus.len());
        for (original, restored) in corpus.documents().iter().zip(loaded.documents()) {
            assert_eq!(original.path(), restored.path());
            assert_eq!(original.extension(), restored.extension());
            assert_eq!(original.concordance(), restored.concordance());
            assert_eq!(original.tfidf().len(), restored.tfidf().len());
            for (term, score) in original.tfidf() {
                assert!((score - restored.tfidf_score(term)).abs() < 1e-9, "{term}");
            }
            let drift = original.indexed_at() - restored.indexed_at();
            assert!(drift.whole_milliseconds().abs() <= 1);
        }
    }

    #[test]
    fn json_uses_documented_field_names() {
        let docs = tempdir().unwrap();
        let index = tempdir().unwrap();
        let store = IndexStore::new(index.path());
        store.save(&built_corpus(docs.path())).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.paths().documents()).unwrap()).unwrap();
        let first = &raw.as_array().unwrap()[0];
        for field in ["filepath", "extension", "indexedAt", "concordance", "tfidf"] {
            assert!(first.get(field).is_some(), "missing {field}");
        }
        assert!(first["indexedAt"].is_i64());
    }

    #[test]
    fn missing_index_is_not_found() {
        let index = tempdir().unwrap();
        let store = IndexStore::new(index.path().join("nothing-here"));
        let err = store
            .load(Path::new("/docs"), ContentRegistry::default(), Arc::new(StopwordSet::empty()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn malformed_index_fails_whole_load() {
        let index = tempdir().unwrap();
        let store = IndexStore::new(index.path());
        fs::write(
            store.paths().documents(),
            r#"[{"filepath":"/docs/a.txt","extension":"txt","indexedAt":0,"concordance":{},"tfidf":{}},{"filepath":"#,
        )
        .unwrap();
        assert!(store.exists());
        let err = store
            .load(Path::new("/docs"), ContentRegistry::default(), Arc::new(StopwordSet::empty()))
            .unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }

    #[test]
    fn rejects_unknown_extension_and_other_root() {
        let docs = tempdir().unwrap();
        let index = tempdir().unwrap();
        let store = IndexStore::new(index.path());
        store.save(&built_corpus(docs.path())).unwrap();

        let err = store
            .load(Path::new("/somewhere/else"), ContentRegistry::default(), Arc::new(StopwordSet::empty()))
            .unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));

        let err = store
            .load(docs.path(), ContentRegistry::empty(), Arc::new(StopwordSet::empty()))
            .unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }

    #[test]
    fn stale_format_version_is_not_reused() {
        let docs = tempdir().unwrap();
        let index = tempdir().unwrap();
        let store = IndexStore::new(index.path());
        store.save(&built_corpus(docs.path())).unwrap();
        let meta = MetaFile { version: FORMAT_VERSION + 1, root: "x".into(), num_docs: 0, created_at: String::new() };
        fs::write(store.paths().meta(), serde_json::to_string(&meta).unwrap()).unwrap();
        assert!(!store.exists());
    }
}
