//! # trusera-intercept
//!
//! Runs every outbound HTTP call through policy before it leaves the
//! process.
//!
//! Transports are modelled as three capabilities ([`SyncTransport`],
//! [`AsyncTransport`], [`ConnectionPool`]). An [`Interceptor`] wraps any of
//! them in an implementation of the same trait that evaluates the request
//! against a [`PolicyCache`](trusera_cache::PolicyCache), applies the
//! [`EnforcementMode`], forwards, and emits telemetry.
//!
//! ## Key invariants
//!
//! - Block mode returns [`SendError::Blocked`] before the inner transport is
//!   called.
//! - Excluded URLs (and the policy source's own endpoint) are forwarded
//!   without evaluation and without events.
//! - Transport errors come back exactly as the inner transport returned them.
//! - At most one interceptor is installed in the process-wide [`registry`]
//!   at a time. Double install and uninstall-when-absent are errors.

pub mod config;
pub mod enforcement;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod reqwest_transport;
pub mod transport;

pub use config::{GuardConfig, DEFAULT_CONFIG_PATH};
pub use enforcement::EnforcementMode;
pub use error::{InterceptorError, PolicyViolation, SendError, TransportError};
pub use interceptor::{HeaderCapture, InstallGuard, Interceptor, InterceptorBuilder};
pub use reqwest_transport::{AsyncClientTransport, BlockingClientTransport, ReqwestPool};
pub use transport::{
    pool_url, AsyncTransport, ConnectionPool, HttpRequest, HttpResponse, SyncTransport,
};
