// error.rs — Error types for the interception layer.
//
// Two families:
// - InterceptorError: setup and lifecycle misuse (programmer errors).
// - SendError: what a wrapped transport call returns. A policy block is
//   its own variant; transport failures pass through untouched.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error from an underlying transport.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum InterceptorError {
    #[error("an interceptor is already installed")]
    AlreadyInstalled,

    #[error("this interceptor is not installed")]
    NotInstalled,

    /// Transports cannot be swapped while an interceptor holds them.
    #[error("transport registry is locked by an installed interceptor")]
    RegistryLocked,

    #[error("invalid enforcement mode '{0}': expected one of block, warn, log")]
    InvalidEnforcement(String),

    #[error("invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// A configured local policy file that does not exist.
    #[error("policy file not found: {path}")]
    PolicyFileNotFound { path: PathBuf },

    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// A request denied by policy in block mode. Raised before the request is
/// sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Policy violation [{action}] {target}: {reason}")]
pub struct PolicyViolation {
    /// Kind of action; `"http"` for intercepted requests.
    pub action: String,
    /// `"<METHOD> <url>"`.
    pub target: String,
    pub reason: String,
    /// Source text of the matched forbid statement.
    pub policy_id: Option<String>,
}

/// Result error of a send through any transport.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Blocked(#[from] PolicyViolation),

    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
}

impl SendError {
    pub fn transport(error: impl Into<TransportError>) -> Self {
        SendError::Transport(error.into())
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, SendError::Blocked(_))
    }

    pub fn violation(&self) -> Option<&PolicyViolation> {
        match self {
            SendError::Blocked(v) => Some(v),
            SendError::Transport(_) => None,
        }
    }
}
