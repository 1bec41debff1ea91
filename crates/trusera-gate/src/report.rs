// report.rs — Markdown report, CI annotations, summary file.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use trusera_policy::PolicyRule;

use crate::error::GateError;
use crate::gate::Violation;

fn condition(rule: &PolicyRule) -> String {
    format!("resource.{} {} {}", rule.field, rule.operator, rule.value)
}

/// Markdown table of violations followed by each distinct triggering
/// statement.
pub fn format_report(violations: &[Violation]) -> String {
    let mut lines = vec![
        "## Cedar Policy Gate - FAILED".to_string(),
        String::new(),
        format!("**{} violation(s) found**", violations.len()),
        String::new(),
        "| # | Component | Type | Rule | Actual Value |".to_string(),
        "|---|-----------|------|------|--------------|".to_string(),
    ];

    for (i, v) in violations.iter().enumerate() {
        lines.push(format!(
            "| {} | {} | {} | `{}` | {} |",
            i + 1,
            v.component_name,
            v.component_type,
            condition(&v.rule),
            v.actual_value
        ));
    }

    lines.push(String::new());
    lines.push("### Policy rules that triggered".to_string());
    lines.push(String::new());

    let mut seen = HashSet::new();
    for v in violations {
        if seen.insert(v.rule.source_text.as_str()) {
            lines.push(format!("```cedar\n{}\n```", v.rule.source_text));
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// One workflow-command annotation per violation. Critical and high are
/// errors, everything else warnings.
pub fn annotations(violations: &[Violation]) -> Vec<String> {
    violations
        .iter()
        .map(|v| {
            let level = if matches!(v.severity.as_str(), "critical" | "high") {
                "error"
            } else {
                "warning"
            };
            let message = format!(
                "Policy violation: {} ({}) - {} (actual: {})",
                v.component_name,
                v.component_type,
                condition(&v.rule),
                v.actual_value
            );
            match (&v.file_path, v.line_number) {
                (Some(file), Some(line)) => format!("::{level} file={file},line={line}::{message}"),
                (Some(file), None) => format!("::{level} file={file}::{message}"),
                _ => format!("::{level} ::{message}"),
            }
        })
        .collect()
}

/// Append the report (plus a trailing newline) to a summary file.
pub fn append_summary(path: &Path, report: &str) -> Result<(), GateError> {
    let to_error = |source| GateError::WriteSummary {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_error)?;
    writeln!(file, "{}", report).map_err(to_error)
}
