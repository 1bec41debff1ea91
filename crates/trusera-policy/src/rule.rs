// rule.rs — Parsed policy rule definitions.
//
// A PolicyRule is the unit the evaluator works on: one effect, one field,
// one operator, one value. A statement with several conditions in its
// `when { }` block becomes several rules sharing the statement's effect
// and source text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::subject::AttrValue;

/// Whether a matching rule denies or explicitly allows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Forbid,
    Permit,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Forbid => "forbid",
            Effect::Permit => "permit",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a condition.
///
/// Resource subjects use the six ordering/equality operators; request
/// subjects additionally use the three substring operators. The evaluator
/// accepts every operator in every context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Parse the operator token as written in policy text.
    ///
    /// Word operators are case-insensitive (`contains`, `CONTAINS`).
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "==" => Some(Operator::Equals),
            "!=" => Some(Operator::NotEquals),
            ">" => Some(Operator::GreaterThan),
            ">=" => Some(Operator::GreaterOrEqual),
            "<" => Some(Operator::LessThan),
            "<=" => Some(Operator::LessOrEqual),
            "contains" => Some(Operator::Contains),
            "startswith" => Some(Operator::StartsWith),
            "endswith" => Some(Operator::EndsWith),
            _ => None,
        }
    }

    /// The operator as it appears in policy text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
        }
    }

    /// True for the six ordering/equality operators.
    pub fn is_ordering(&self) -> bool {
        !matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed policy rule. Immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyRule {
    /// Forbid or permit.
    pub effect: Effect,
    /// Action verb of the statement (`Action::"http"` → `"http"`), or `"*"`
    /// for the `(principal, action, resource)` wildcard form.
    pub action: String,
    /// Attribute name, lowercased (`request.hostname` → `"hostname"`).
    pub field: String,
    pub operator: Operator,
    pub value: AttrValue,
    /// The verbatim statement this rule came from. Used as the policy
    /// identifier in violations and for de-duplication in reports.
    pub source_text: String,
}

impl PolicyRule {
    /// Render the condition, e.g. `hostname contains "deepseek.com"` or
    /// `risk_score > 75`.
    pub fn condition(&self) -> String {
        match &self.value {
            AttrValue::Str(s) => format!("{} {} \"{}\"", self.field, self.operator, s),
            AttrValue::Num(_) => format!("{} {} {}", self.field, self.operator, self.value),
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} when {{ {} }}", self.effect, self.condition())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_tokens_round_trip() {
        for token in ["==", "!=", ">", ">=", "<", "<=", "contains", "startswith", "endswith"] {
            let op = Operator::parse(token).unwrap();
            assert_eq!(op.as_str(), token);
        }
    }

    #[test]
    fn word_operators_are_case_insensitive() {
        assert_eq!(Operator::parse("CONTAINS"), Some(Operator::Contains));
        assert_eq!(Operator::parse("StartsWith"), Some(Operator::StartsWith));
        assert_eq!(Operator::parse("like"), None);
    }

    #[test]
    fn substring_operators_are_not_ordering() {
        assert!(Operator::GreaterOrEqual.is_ordering());
        assert!(Operator::NotEquals.is_ordering());
        assert!(!Operator::EndsWith.is_ordering());
    }

    #[test]
    fn condition_quotes_strings_but_not_numbers() {
        let rule = PolicyRule {
            effect: Effect::Forbid,
            action: "*".to_string(),
            field: "risk_score".to_string(),
            operator: Operator::GreaterThan,
            value: AttrValue::Num(75.0),
            source_text: String::new(),
        };
        assert_eq!(rule.condition(), "risk_score > 75");

        let rule = PolicyRule {
            value: AttrValue::Str("DeepSeek".to_string()),
            field: "provider".to_string(),
            operator: Operator::Equals,
            ..rule
        };
        assert_eq!(rule.condition(), "provider == \"DeepSeek\"");
        assert_eq!(rule.to_string(), "forbid when { provider == \"DeepSeek\" }");
    }
}
