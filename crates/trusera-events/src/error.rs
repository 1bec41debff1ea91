// error.rs — Error types for event delivery.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while delivering an event to a sink.
#[derive(Debug, Error)]
pub enum EventError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize an event.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink has shut down and no longer accepts events.
    #[error("event sink is closed")]
    Closed,
}
