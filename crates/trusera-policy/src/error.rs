// error.rs — Error types for the policy subsystem.
//
// Parsing and evaluation are infallible by contract; the only failure mode
// left is getting the policy text off disk in the first place.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading policy text.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("failed to read policy file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
