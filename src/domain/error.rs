// ============================================================
// Layer 3 — Dataset Errors
// ============================================================
// Every failure the dataset pipeline can produce, with enough
// context (file, line, record key) to find the offending input.
// The application layer wraps these in anyhow::Error and adds
// fold and batch context on top.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in '{}' at line {line}: {reason}", file.display())]
    MalformedRecord {
        file:   PathBuf,
        line:   usize,
        reason: String,
    },

    #[error("'{}' has no '{column}' column in its header", file.display())]
    MissingColumn {
        file:   PathBuf,
        column: String,
    },

    #[error("record '{key}' has no value for '{field}'")]
    MissingField {
        key:   String,
        field: String,
    },

    #[error("cannot tokenise record '{key}': {reason}")]
    Tokenization {
        key:    String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("index {index} out of range for dataset '{dataset}' of length {len}")]
    IndexOutOfRange {
        dataset: String,
        index:   usize,
        len:     usize,
    },
}

pub type DatasetResult<T> = std::result::Result<T, DatasetError>;
