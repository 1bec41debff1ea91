// error.rs — Error types for policy fetching and cache control.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The remote policy endpoint could not be reached or answered badly.
    #[error("failed to fetch policies from {url}: {source}")]
    Fetch {
        url: String,
        source: reqwest::Error,
    },

    /// A local policy file could not be read.
    #[error("failed to read policy file {path}: {source}")]
    ReadPolicy {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A source-specific failure (used by closure and test sources).
    #[error("policy source error: {0}")]
    Source(String),

    /// The cache has no policy source; there is nothing to refresh.
    #[error("policy cache has no source configured")]
    NoSource,

    /// The refresh worker has been stopped.
    #[error("policy cache refresh worker is stopped")]
    Stopped,
}
