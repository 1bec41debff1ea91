// evaluator.rs — Attribute-based rule evaluation.
//
// `decide()` is the single decision function both products share:
//
// 1. Forbid rules, in declaration order. First match → Deny.
// 2. Permit rules, in declaration order. First match → explicit Allow.
// 3. Nothing matched → default Allow.
//
// Forbid always outranks Permit. There is no specificity or priority
// resolution: a narrower permit never overrides a matching forbid.
//
// A single rule matches by one of three comparison modes, picked in order:
//   - field "severity": ordinal ranks (critical > high > medium > low > info/none)
//   - numeric rule value and numeric subject value: numeric comparison
//   - otherwise: case-insensitive string comparison

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::parser::parse_policy;
use crate::rule::{Effect, Operator, PolicyRule};
use crate::subject::{AttrValue, Subject};

/// Allow or deny.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

/// Outcome of evaluating one subject. Always carries a human-readable reason,
/// including for default-allow outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub decision: Decision,
    pub reason: String,
    /// The rule that produced the decision, if any rule matched.
    pub matched_rule: Option<PolicyRule>,
}

impl EvaluationResult {
    /// An allow outcome with no matched rule.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Allow,
            reason: reason.into(),
            matched_rule: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }

    /// Identifier of the matched policy: the verbatim statement text.
    pub fn policy_id(&self) -> Option<&str> {
        self.matched_rule.as_ref().map(|r| r.source_text.as_str())
    }
}

/// Ordinal rank of a severity label (case-insensitive). Unknown labels rank 0.
pub fn severity_rank(label: &str) -> u8 {
    match label.trim().to_ascii_lowercase().as_str() {
        "critical" => 4,
        "high" => 3,
        "medium" => 2,
        "low" => 1,
        _ => 0, // info, none, unknown
    }
}

/// Does `rule` match `subject`? Never errors: a missing field or a type
/// mismatch is simply no match.
///
/// A numeric rule value only compares numerically. When the attribute does
/// not parse as a number the rule does not match, for every operator
/// including `!=`; there is no fallback to text comparison. A malformed
/// `risk_score` therefore never trips a `!= 0` forbid.
pub fn rule_matches(rule: &PolicyRule, subject: &Subject) -> bool {
    let Some(actual) = subject.get(&rule.field) else {
        return false;
    };

    if rule.field == "severity" {
        let actual_rank = severity_rank(&actual.as_text());
        let target_rank = severity_rank(&rule.value.as_text());
        return compare_ordered(actual_rank, target_rank, rule.operator);
    }

    if let AttrValue::Num(target) = rule.value {
        return match actual.as_number() {
            Some(actual) => compare_ordered(actual, target, rule.operator),
            None => false,
        };
    }

    compare_text(&actual.as_text(), &rule.value.as_text(), rule.operator)
}

fn compare_ordered<T: PartialOrd>(actual: T, target: T, op: Operator) -> bool {
    match op {
        Operator::Equals => actual == target,
        Operator::NotEquals => actual != target,
        Operator::GreaterThan => actual > target,
        Operator::GreaterOrEqual => actual >= target,
        Operator::LessThan => actual < target,
        Operator::LessOrEqual => actual <= target,
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => false,
    }
}

fn compare_text(actual: &str, target: &str, op: Operator) -> bool {
    let actual = actual.to_lowercase();
    let target = target.to_lowercase();
    match op {
        Operator::Equals => actual == target,
        Operator::NotEquals => actual != target,
        Operator::Contains => actual.contains(&target),
        Operator::StartsWith => actual.starts_with(&target),
        Operator::EndsWith => actual.ends_with(&target),
        Operator::GreaterThan
        | Operator::GreaterOrEqual
        | Operator::LessThan
        | Operator::LessOrEqual => false,
    }
}

/// Decide Allow/Deny for one subject against an ordered rule set.
pub fn decide(rules: &[PolicyRule], subject: &Subject) -> EvaluationResult {
    if rules.is_empty() {
        return EvaluationResult::allow("No policy rules configured (default allow)");
    }

    if let Some(rule) = first_match(rules, Effect::Forbid, subject) {
        return EvaluationResult {
            decision: Decision::Deny,
            reason: format!("Forbidden by policy: {}", rule.condition()),
            matched_rule: Some(rule.clone()),
        };
    }

    if let Some(rule) = first_match(rules, Effect::Permit, subject) {
        return EvaluationResult {
            decision: Decision::Allow,
            reason: format!("Explicitly permitted by policy: {}", rule.condition()),
            matched_rule: Some(rule.clone()),
        };
    }

    EvaluationResult::allow("No matching policy rules (default allow)")
}

fn first_match<'a>(
    rules: &'a [PolicyRule],
    effect: Effect,
    subject: &Subject,
) -> Option<&'a PolicyRule> {
    rules
        .iter()
        .filter(|r| r.effect == effect)
        .find(|r| rule_matches(r, subject))
}

/// An immutable, parsed rule set.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    rules: Vec<PolicyRule>,
}

impl Evaluator {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Parse policy text into an evaluator.
    pub fn from_text(policy_text: &str) -> Self {
        Self::new(parse_policy(policy_text))
    }

    /// Read and parse a `.cedar` policy file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(&text))
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide Allow/Deny for a subject.
    pub fn evaluate(&self, subject: &Subject) -> EvaluationResult {
        decide(&self.rules, subject)
    }

    /// Convenience for live mode: build a request subject and decide.
    pub fn evaluate_request<I, K, V>(&self, url: &str, method: &str, headers: I) -> EvaluationResult
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.evaluate(&Subject::from_request(url, method, headers))
    }

    /// Every forbid rule the subject matches, in declaration order.
    ///
    /// Batch mode reports all violations instead of stopping at the first.
    pub fn violations<'a>(&'a self, subject: &Subject) -> Vec<&'a PolicyRule> {
        self.rules
            .iter()
            .filter(|r| r.effect == Effect::Forbid && rule_matches(r, subject))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEEPSEEK_POLICY: &str = r#"
        // Block DeepSeek
        forbid (principal, action == Action::"http", resource)
        when { request.hostname == "deepseek.com" };
    "#;

    fn no_headers() -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    fn severity_subject(sev: &str) -> Subject {
        Subject::new().with("severity", sev)
    }

    #[test]
    fn forbidden_host_is_denied() {
        let evaluator = Evaluator::from_text(DEEPSEEK_POLICY);
        let result = evaluator.evaluate_request("https://deepseek.com/api", "POST", no_headers());
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.starts_with("Forbidden by policy: hostname =="));
        assert!(result.policy_id().unwrap().contains("deepseek.com"));

        let result = evaluator.evaluate_request("https://openai.com/api", "POST", no_headers());
        assert_eq!(result.decision, Decision::Allow);
        assert!(result.matched_rule.is_none());
    }

    #[test]
    fn empty_rule_set_allows_by_default() {
        let evaluator = Evaluator::default();
        let result = evaluator.evaluate_request("https://anything.example", "GET", no_headers());
        assert!(result.is_allowed());
        let reason = result.reason.to_lowercase();
        assert!(reason.contains("no policy") && reason.contains("default"));
    }

    #[test]
    fn unmatched_rules_allow_by_default() {
        let evaluator = Evaluator::from_text(DEEPSEEK_POLICY);
        let result = evaluator.evaluate(&Subject::new().with("hostname", "example.com"));
        assert!(result.is_allowed());
        assert_eq!(result.reason, "No matching policy rules (default allow)");
    }

    #[test]
    fn forbid_outranks_permit_regardless_of_order() {
        const PERMIT: &str = r#"permit (principal, action, resource) when { request.hostname endswith "openai.com" };"#;
        const FORBID_HOST: &str = r#"forbid (principal, action, resource) when { request.hostname contains "openai" };"#;
        const FORBID_PATH: &str = r#"forbid (principal, action, resource) when { request.path startswith "/v1" };"#;

        // (rules in order, url, expected decision, rule expected to be cited)
        let cases: Vec<(Vec<&str>, &str, Decision, &str)> = vec![
            (vec![PERMIT, FORBID_HOST], "https://api.openai.com/v1", Decision::Deny, FORBID_HOST),
            (vec![FORBID_HOST, PERMIT], "https://api.openai.com/v1", Decision::Deny, FORBID_HOST),
            (vec![PERMIT, FORBID_HOST], "https://files.openai.com/", Decision::Deny, FORBID_HOST),
            (vec![FORBID_HOST, PERMIT], "https://chat.openai.com/x", Decision::Deny, FORBID_HOST),
            // Several forbids match: the first one in policy order is reported.
            (vec![PERMIT, FORBID_HOST, FORBID_PATH], "https://api.openai.com/v1", Decision::Deny, FORBID_HOST),
            (vec![FORBID_PATH, PERMIT, FORBID_HOST], "https://api.openai.com/v1", Decision::Deny, FORBID_PATH),
            // Only the permit matches.
            (vec![FORBID_PATH, PERMIT], "https://api.openai.com/v2", Decision::Allow, PERMIT),
            (vec![PERMIT, FORBID_PATH], "https://api.openai.com/", Decision::Allow, PERMIT),
        ];

        for (rules, url, expected, cited) in cases {
            let evaluator = Evaluator::from_text(&rules.join("\n"));
            assert_eq!(evaluator.len(), rules.len());
            let result = evaluator.evaluate_request(url, "GET", no_headers());
            assert_eq!(result.decision, expected, "{url} with {rules:?}");
            let matched = result.matched_rule.expect("a rule should be cited");
            assert_eq!(matched.source_text, cited, "{url} with {rules:?}");
            let expected_effect = if expected == Decision::Deny {
                Effect::Forbid
            } else {
                Effect::Permit
            };
            assert_eq!(matched.effect, expected_effect);
        }
    }

    #[test]
    fn explicit_permit_cites_rule() {
        let evaluator = Evaluator::from_text(
            r#"permit (principal, action, resource) when { request.hostname == "api.openai.com" };"#,
        );
        let result = evaluator.evaluate_request("https://api.openai.com/", "GET", no_headers());
        assert!(result.is_allowed());
        assert!(result.reason.starts_with("Explicitly permitted by policy"));
        assert!(result.matched_rule.is_some());
    }

    #[test]
    fn string_comparisons_ignore_case() {
        let evaluator = Evaluator::from_text(
            r#"forbid (principal, action, resource) when { request.hostname == "DEEPSEEK.COM" };"#,
        );
        let subject = Subject::new().with("hostname", "DeepSeek.com");
        assert_eq!(evaluator.evaluate(&subject).decision, Decision::Deny);
    }

    #[test]
    fn substring_operators() {
        let subject = Subject::from_request(
            "https://files.example.com/v1/upload/big",
            "put",
            vec![("X-Agent", "Crawler/2.0")],
        );
        for (cond, expected) in [
            (r#"request.path contains "/UPLOAD/""#, true),
            (r#"request.hostname startswith "files.""#, true),
            (r#"request.hostname endswith ".example.com""#, true),
            (r#"request.hostname endswith ".org""#, false),
            (r#"request.header_x_agent startswith "crawler""#, true),
            (r#"request.method != "PUT""#, false),
        ] {
            let text = format!("forbid (principal, action, resource) when {{ {} }};", cond);
            let rules = parse_policy(&text);
            assert_eq!(rules.len(), 1, "{}", cond);
            assert_eq!(rule_matches(&rules[0], &subject), expected, "{}", cond);
        }
    }

    #[test]
    fn severity_uses_ordinal_ranks() {
        let gt_medium = parse_policy(
            r#"forbid (principal, action, resource) when { resource.severity > "medium" };"#,
        );
        let ge_high = parse_policy(
            r#"forbid (principal, action, resource) when { resource.severity >= "high" };"#,
        );
        assert!(rule_matches(&gt_medium[0], &severity_subject("high")));
        assert!(rule_matches(&gt_medium[0], &severity_subject("CRITICAL")));
        assert!(!rule_matches(&gt_medium[0], &severity_subject("medium")));
        assert!(!rule_matches(&ge_high[0], &severity_subject("low")));
        assert!(rule_matches(&ge_high[0], &severity_subject("High")));
    }

    #[test]
    fn severity_ignores_substring_operators() {
        let rules = parse_policy(
            r#"forbid (principal, action, resource) when { resource.severity contains "hi" };"#,
        );
        assert!(!rule_matches(&rules[0], &severity_subject("high")));
    }

    #[test]
    fn severity_rank_table() {
        assert_eq!(severity_rank("critical"), 4);
        assert_eq!(severity_rank("High"), 3);
        assert_eq!(severity_rank("medium"), 2);
        assert_eq!(severity_rank("low"), 1);
        assert_eq!(severity_rank("info"), 0);
        assert_eq!(severity_rank("none"), 0);
        assert_eq!(severity_rank("bogus"), 0);
    }

    #[test]
    fn numeric_comparison() {
        let rules = parse_policy(
            "forbid (principal, action, resource) when { resource.risk_score > 75 };",
        );
        let rule = &rules[0];
        assert!(rule_matches(rule, &Subject::new().with("risk_score", 80_i64)));
        assert!(rule_matches(rule, &Subject::new().with("risk_score", "90")));
        assert!(!rule_matches(rule, &Subject::new().with("risk_score", 75_i64)));
        // Mismatched type: never matches, never errors.
        assert!(!rule_matches(rule, &Subject::new().with("risk_score", "high")));

        let not_zero = parse_policy(
            "forbid (principal, action, resource) when { resource.risk_score != 0 };",
        );
        assert!(rule_matches(&not_zero[0], &Subject::new().with("risk_score", 3_i64)));
        assert!(!rule_matches(&not_zero[0], &Subject::new().with("risk_score", "n/a")));
    }

    #[test]
    fn missing_field_never_matches() {
        let rules = parse_policy(
            r#"forbid (principal, action, resource) when { resource.provider != "OpenAI" };"#,
        );
        assert!(!rule_matches(&rules[0], &Subject::new()));
        assert!(rule_matches(
            &rules[0],
            &Subject::new().with("provider", "DeepSeek")
        ));
    }

    #[test]
    fn violations_collects_every_matching_forbid() {
        let evaluator = Evaluator::from_text(
            r#"
            forbid (principal, action, resource) when { resource.severity >= "high" };
            forbid (principal, action, resource) when { resource.provider == "DeepSeek" };
            permit (principal, action, resource) when { resource.name == "r1" };
            forbid (principal, action, resource) when { resource.risk_score > 90 };
            "#,
        );
        let subject = Subject::new()
            .with("name", "r1")
            .with("severity", "critical")
            .with("provider", "deepseek")
            .with("risk_score", 50_i64);
        let fields: Vec<&str> = evaluator
            .violations(&subject)
            .iter()
            .map(|r| r.field.as_str())
            .collect();
        assert_eq!(fields, vec!["severity", "provider"]);
    }

    #[test]
    fn from_file_reads_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.cedar");
        std::fs::write(&path, DEEPSEEK_POLICY).unwrap();
        let evaluator = Evaluator::from_file(&path).unwrap();
        assert_eq!(evaluator.len(), 1);

        let missing = Evaluator::from_file(dir.path().join("missing.cedar"));
        assert!(matches!(missing, Err(PolicyError::ReadFailed { .. })));
    }
}
