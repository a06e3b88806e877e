// src/tokenizer/result.rs

use std::path::PathBuf;
use thiserror::Error;

/// Every failure the trainer, the model loader and the tokenizer can surface.
///
/// Unknown symbols during encoding and out-of-range ids during decoding are not
/// represented here: both are recovered locally and only counted.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid trainer configuration, detected before any merge is learned.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The persisted artifact is malformed or internally inconsistent.
    #[error("Malformed model: {0}")]
    ModelLoad(String),

    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
