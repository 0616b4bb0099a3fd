use crate::error::{Error, Result};
use crate::tfidf::IdfWeighting;
use std::path::PathBuf;
use std::time::Duration;

/// Everything needed to build, persist and refresh an index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory tree to index.
    pub root: PathBuf,
    /// Directory holding the persisted index.
    pub index_dir: PathBuf,
    /// Worker threads for the TF-IDF build.
    pub workers: usize,
    pub reindex_interval: Duration,
    /// Stopword list; `None` selects the built-in English list.
    pub stopwords: Option<PathBuf>,
    pub weighting: IdfWeighting,
    /// Query results must score above this.
    pub min_score: f64,
}

impl IndexConfig {
    pub fn new(root: impl Into<PathBuf>, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_dir: index_dir.into(),
            workers: default_workers(),
            reindex_interval: Duration::from_secs(60),
            stopwords: None,
            weighting: IdfWeighting::Plain,
            min_score: 0.0,
        }
    }

    /// Check the configuration before anything is built. Creates the index
    /// directory if it does not exist yet.
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::InvalidRoot { path: self.root.clone() });
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.reindex_interval.is_zero() {
            return Err(Error::Config("reindex interval must be at least one second".into()));
        }
        if !self.min_score.is_finite() || self.min_score < 0.0 {
            return Err(Error::Config(format!("min score must be a non-negative number, got {}", self.min_score)));
        }
        if self.index_dir.exists() && !self.index_dir.is_dir() {
            return Err(Error::Config(format!("index path {} is not a directory", self.index_dir.display())));
        }
        std::fs::create_dir_all(&self.index_dir).map_err(|e| {
            Error::Config(format!("cannot create index directory {}: {e}", self.index_dir.display()))
        })?;
        Ok(())
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn valid_config_creates_index_dir() {
        let root = tempdir().unwrap();
        let out = tempdir().unwrap();
        let config = IndexConfig::new(root.path(), out.path().join("idx"));
        config.validate().unwrap();
        assert!(out.path().join("idx").is_dir());
    }

    #[test]
    fn missing_root_is_invalid_root() {
        let out = tempdir().unwrap();
        let config = IndexConfig::new(out.path().join("nope"), out.path());
        assert!(matches!(config.validate(), Err(Error::InvalidRoot { .. })));
    }

    #[test]
    fn rejects_bad_numbers() {
        let root = tempdir().unwrap();
        let mut config = IndexConfig::new(root.path(), root.path().join("idx"));
        config.workers = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = IndexConfig::new(root.path(), root.path().join("idx"));
        config.reindex_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = IndexConfig::new(root.path(), root.path().join("idx"));
        config.min_score = f64::NAN;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn index_path_must_be_a_directory() {
        let root = tempdir().unwrap();
        let file = root.path().join("index");
        std::fs::write(&file, "").unwrap();
        let config = IndexConfig::new(root.path(), &file);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
