// gate.rs — Evaluate components, collect every violation, apply the
// severity threshold.

use serde_json::Value;
use trusera_policy::{severity_rank, Evaluator, PolicyRule, Subject};

use crate::input::{Component, EntityStore};

/// One forbid rule matched by one component.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub rule: PolicyRule,
    pub component_name: String,
    pub component_type: String,
    /// The component's value for the rule's field, as text.
    pub actual_value: String,
    /// Lowercased component severity, empty when absent.
    pub severity: String,
    pub file_path: Option<String>,
    pub line_number: Option<u64>,
}

/// Result of one gate run.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    NoRules,
    NoComponents,
    Passed { rules: usize, components: usize },
    Failed { violations: Vec<Violation> },
}

impl GateOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            GateOutcome::Failed { .. } => 1,
            _ => 0,
        }
    }
}

/// Every forbid rule each component matches, in component order then rule
/// order. Entity attributes fill fields the component lacks.
pub fn evaluate_components(
    evaluator: &Evaluator,
    components: &[Component],
    entities: Option<&EntityStore>,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for component in components {
        let entity = component
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| entities.and_then(|store| store.get(name)));
        let subject = Subject::from_resource(component, entity);

        for rule in evaluator.violations(&subject) {
            violations.push(Violation {
                rule: rule.clone(),
                component_name: text_or(&subject, "name", "unknown"),
                component_type: text_or(&subject, "component_type", "unknown"),
                actual_value: text_or(&subject, &rule.field, "N/A"),
                severity: text_or(&subject, "severity", "").to_lowercase(),
                file_path: component
                    .get("file_path")
                    .and_then(Value::as_str)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                line_number: component
                    .get("line_number")
                    .and_then(Value::as_u64)
                    .filter(|line| *line > 0),
            });
        }
    }

    violations
}

fn text_or(subject: &Subject, field: &str, default: &str) -> String {
    subject
        .get(field)
        .map(|v| v.to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Keep violations at or above `min_severity`. An unknown or zero-rank
/// threshold keeps everything; a violation without severity ranks as zero.
pub fn filter_by_severity(violations: Vec<Violation>, min_severity: &str) -> Vec<Violation> {
    let threshold = severity_rank(min_severity);
    if threshold == 0 {
        return violations;
    }
    violations
        .into_iter()
        .filter(|v| severity_rank(&v.severity) >= threshold)
        .collect()
}

/// Run the whole gate over already-loaded inputs.
pub fn run(
    evaluator: &Evaluator,
    components: &[Component],
    entities: Option<&EntityStore>,
    min_severity: Option<&str>,
) -> GateOutcome {
    if evaluator.is_empty() {
        return GateOutcome::NoRules;
    }
    if components.is_empty() {
        return GateOutcome::NoComponents;
    }

    let mut violations = evaluate_components(evaluator, components, entities);
    if let Some(min) = min_severity {
        violations = filter_by_severity(violations, min);
    }
    tracing::debug!(violations = violations.len(), "gate evaluated");

    if violations.is_empty() {
        GateOutcome::Passed {
            rules: evaluator.len(),
            components: components.len(),
        }
    } else {
        GateOutcome::Failed { violations }
    }
}
