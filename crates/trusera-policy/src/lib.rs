//! # trusera-policy
//!
//! Cedar-like policy language and attribute evaluator for Trusera.
//!
//! Policy text is parsed by [`parse_policy`] into an ordered list of
//! [`PolicyRule`]s. An [`Evaluator`] decides Allow or Deny for a
//! [`Subject`]: an attribute bag built either from an outbound HTTP request
//! ([`Subject::from_request`]) or from a discovered component record
//! ([`Subject::from_resource`]). The same evaluator serves both shapes.
//!
//! ## Key invariants
//!
//! - **Forbid outranks Permit**: any matching forbid rule denies, regardless
//!   of how specific a matching permit rule is.
//! - **Default allow**: no matching rule (or no rules at all) allows.
//! - **Parsing never fails**: malformed statements are skipped.
//! - **Evaluation never fails**: a missing or mismatched attribute simply
//!   does not match.
//! - **One rule per condition**: conditions inside one `when { }` block are
//!   independent rules that share the statement's effect, not a conjunction.

pub mod error;
pub mod evaluator;
pub mod parser;
pub mod rule;
pub mod subject;

pub use error::PolicyError;
pub use evaluator::{decide, rule_matches, severity_rank, Decision, EvaluationResult, Evaluator};
pub use parser::parse_policy;
pub use rule::{Effect, Operator, PolicyRule};
pub use subject::{AttrValue, Subject};
