//! # trusera-cache
//!
//! Keeps a policy [`Evaluator`](trusera_policy::Evaluator) fresh from a
//! [`PolicySource`] and answers `evaluate()` on the caller's thread without
//! ever touching the network.
//!
//! ## Key invariants
//!
//! - All fetching happens on one background worker per cache. Refreshes
//!   never overlap.
//! - The published snapshot `{evaluator, hash, last success}` is swapped
//!   under a mutex held only for the swap. Readers see the old evaluator or
//!   the new one, never a half-built one.
//! - Unchanged content (same SHA-256) is not rebuilt, but still counts as a
//!   successful refresh.
//! - Failure degrades toward staleness: the previous snapshot is kept, and
//!   once the last success is older than the stale tolerance the cache
//!   fails open.
//! - No source configured means permanently empty and always allow.

pub mod cache;
pub mod config;
pub mod error;
pub mod hasher;
pub mod source;

pub use cache::{CacheStatus, PolicyCache, RefreshOutcome};
pub use config::CacheConfig;
pub use error::CacheError;
pub use source::{
    FilePolicySource, FnSource, HttpPolicySource, PolicyBundle, PolicyEntry, PolicySource,
    POLICY_ENDPOINT_PATH,
};
