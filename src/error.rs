use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountViewError {
    #[error("Source unavailable at {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("Invalid feed: {0}")]
    InvalidFeed(String),

    #[error("Invalid processing options: {0}")]
    InvalidConfig(String),

    #[error("Output target {0} does not exist; the page must be created before it can be patched")]
    SinkTargetMissing(PathBuf),

    #[error("Neither a '{variable}' definition nor a </script> tag was found in {path}")]
    SinkPatternNotFound { path: PathBuf, variable: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AccountViewError>;
