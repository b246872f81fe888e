use ndarray_npy::{ReadNpyError, WriteNpyError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DisambiguationError>;

#[derive(Debug, Error)]
pub enum DisambiguationError {
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding space has no vector for the queried word.
    #[error("word '{word}' is not in the trained vocabulary")]
    WordNotFound { word: String },

    #[error("malformed test line {line:?}: {reason}")]
    MalformedTestLine { line: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("could not read npy: {0}")]
    ReadNpy(#[from] ReadNpyError),

    #[error("could not write npy: {0}")]
    WriteNpy(#[from] WriteNpyError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("training failed: {0}")]
    Training(String),
}

impl DisambiguationError {

    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTestLine { line: line.to_owned(), reason: reason.into() }
    }

    // errors that only invalidate a single test word, the batch goes on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WordNotFound { .. } | Self::MalformedTestLine { .. })
    }

    pub(crate) fn from_io(e: std::io::Error, path: &str) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path: path.to_owned() },
            _ => Self::Io(e)
        }
    }
}
