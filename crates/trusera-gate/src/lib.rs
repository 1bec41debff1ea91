//! # trusera-gate
//!
//! One-shot policy gate over AI-BOM scan results, for CI.
//!
//! Loads components from scan output (array, `components`, SARIF, or a
//! single object), optionally enriches them from a Cedar entities file,
//! evaluates every component against the forbid rules of one policy file,
//! and reports *all* violations rather than stopping at the first.
//!
//! Exit codes used by the `cedar-gate` binary: 0 pass, 1 violations,
//! 2 input error.

pub mod error;
pub mod gate;
pub mod input;
pub mod report;

pub use error::GateError;
pub use gate::{evaluate_components, filter_by_severity, run, GateOutcome, Violation};
pub use input::{extract_components, read_json, Component, EntityStore};
pub use report::{annotations, append_summary, format_report};
