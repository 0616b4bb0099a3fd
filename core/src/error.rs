//! Error taxonomy for indexing, persistence and querying.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The directory to index is missing or is not a directory. Fatal at startup.
    #[error("root directory is missing or not a directory: {}", path.display())]
    InvalidRoot { path: PathBuf },

    /// A content source could not produce text for one file.
    #[error("failed to extract text from {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    /// No content source is registered for the file's extension.
    #[error("unsupported format '{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// No persisted index exists at the given location.
    #[error("no persisted index at {}", path.display())]
    NotFound { path: PathBuf },

    /// A persisted index could not be read back or written.
    #[error("persisted index at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    /// A TF-IDF build failed; the previously published snapshot stays live.
    #[error("index build failed: {0}")]
    Build(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Per-file failures are logged and skipped rather than aborting a walk.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Error::Extraction { .. } | Error::UnsupportedFormat { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_root_mentions_path() {
        let err = Error::InvalidRoot { path: PathBuf::from("/nonexistent/docs") };
        assert!(err.to_string().contains("/nonexistent/docs"));
    }

    #[test]
    fn per_file_errors_are_distinguishable() {
        let unsupported = Error::UnsupportedFormat { path: "a.bin".into(), extension: "bin".into() };
        let extraction = Error::Extraction { path: "a.txt".into(), reason: "denied".into() };
        assert!(unsupported.is_per_file());
        assert!(extraction.is_per_file());
        assert!(!Error::Build("worker panicked".into()).is_per_file());
        assert!(!Error::InvalidRoot { path: "x".into() }.is_per_file());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
