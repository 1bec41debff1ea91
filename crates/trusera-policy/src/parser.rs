// parser.rs — Cedar-like policy text → ordered list of PolicyRules.
//
// Recognized statement forms:
//
//   forbid (principal, action == Action::"http", resource) when { ... };
//   permit (principal, action, resource) when { ... };        // verb "*"
//
// Each condition inside `when { }` has the shape
// `<prefix>.<field> <operator> <value>`, where value is a quoted string or a
// bare token (integer, then float, else string). Every condition becomes its
// own rule carrying the statement's effect. Conditions in one block are NOT
// and-ed together.
//
// Anything that does not match the grammar is skipped. Parsing never fails.

use std::sync::OnceLock;

use regex::Regex;

use crate::rule::{Effect, Operator, PolicyRule};
use crate::subject::AttrValue;

fn statement_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?is)\b(forbid|permit)\s*\(\s*principal\s*,\s*action\s*(?:==\s*Action::"(\w+)"\s*)?,\s*resource\s*\)\s*when\s*\{([^}]*)\}\s*;"#,
        )
        .expect("statement pattern is a valid regex")
    })
}

fn condition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)\b(\w+)\.(\w+)\s*(==|!=|>=|<=|>|<|contains\b|startswith\b|endswith\b)\s*(?:"([^"]*)"|([^\s"&|;)}]+))"#,
        )
        .expect("condition pattern is a valid regex")
    })
}

/// Parse policy text into rules, in declaration order.
pub fn parse_policy(policy_text: &str) -> Vec<PolicyRule> {
    let cleaned = strip_comments(policy_text);
    let mut rules = Vec::new();

    for statement in statement_pattern().captures_iter(&cleaned) {
        let effect = if statement[1].eq_ignore_ascii_case("forbid") {
            Effect::Forbid
        } else {
            Effect::Permit
        };
        let action = statement
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "*".to_string());
        let source_text = statement[0].trim().to_string();
        let body = &statement[3];

        for condition in condition_pattern().captures_iter(body) {
            let Some(operator) = Operator::parse(&condition[3]) else {
                continue;
            };
            let value = match (condition.get(4), condition.get(5)) {
                (Some(quoted), _) => AttrValue::Str(quoted.as_str().to_string()),
                (None, Some(bare)) => parse_bare_value(bare.as_str()),
                (None, None) => continue,
            };

            rules.push(PolicyRule {
                effect,
                action: action.clone(),
                field: condition[2].to_ascii_lowercase(),
                operator,
                value,
                source_text: source_text.clone(),
            });
        }
    }

    tracing::debug!(rules = rules.len(), "parsed policy text");
    rules
}

/// Unquoted tokens are numbers when they parse as one.
fn parse_bare_value(raw: &str) -> AttrValue {
    if let Ok(n) = raw.parse::<i64>() {
        return AttrValue::Num(n as f64);
    }
    if let Ok(n) = raw.parse::<f64>() {
        return AttrValue::Num(n);
    }
    AttrValue::Str(raw.to_string())
}

/// Remove `//` line comments. A `//` inside a double-quoted string (such as
/// a URL in a condition value) is not a comment.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '\n' => {
                // Newlines always end a string literal too; an unbalanced
                // quote must not swallow the rest of the file.
                in_string = false;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}
