// error.rs — Error types for the batch gate. Every variant is an input
// problem (exit code 2).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write summary {path}: {source}")]
    WriteSummary {
        path: PathBuf,
        source: std::io::Error,
    },
}
