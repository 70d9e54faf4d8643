//! # Control Definitions
//!
//! A [`Control`] is one catalog entry: metadata plus a [`ControlLogic`]
//! block describing how the engine decides its status. Controls are
//! immutable once loaded.

use assure_core::{ControlId, ControlType, Severity, TscCategory};
use serde::Serialize;

use crate::condition::SuccessCondition;

/// Default finding text for a failed boolean check.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Control check failed";

/// Default remediation attached to boolean check findings.
pub const DEFAULT_REMEDIATION: &str = "See control description";

/// A compliance control definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Control {
    /// Stable catalog key, e.g. `CC6.1-MFA`.
    pub id: ControlId,
    /// Short title.
    pub name: String,
    /// What the control requires.
    pub description: String,
    /// Trust Services Criteria reference, e.g. `CC6.1`.
    pub tsc_reference: String,
    /// Trust Services category.
    pub category: TscCategory,
    /// Implementation type.
    pub control_type: ControlType,
    /// Data sources the control expects, e.g. `okta`, `aws`.
    pub sources: Vec<String>,
    /// Severity assigned to findings.
    pub severity: Severity,
    /// Advisory schedule such as `daily`. Not interpreted.
    pub evaluation_frequency: String,
    /// Evaluation logic.
    pub logic: ControlLogic,
    /// Disabled controls are skipped by batch evaluation.
    pub enabled: bool,
}

/// How a control is evaluated, keyed by the catalog's `logic.type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlLogic {
    /// Pass/fail on the number of violating records.
    BooleanCheck(BooleanCheck),
    /// Flag records for human review; never fails.
    ManualReview(ManualReview),
    /// A logic type this engine does not implement.
    Unrecognized {
        /// The declared `type`.
        type_name: String,
    },
}

impl ControlLogic {
    /// The declared logic type name.
    pub fn type_name(&self) -> &str {
        match self {
            Self::BooleanCheck(_) => "boolean_check",
            Self::ManualReview(_) => "manual_review",
            Self::Unrecognized { type_name } => type_name,
        }
    }

    /// The rule this logic block runs, if any.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::BooleanCheck(b) => Some(&b.rule),
            Self::ManualReview(m) => Some(&m.rule),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// A `boolean_check` logic block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BooleanCheck {
    /// Registered rule producing violations.
    pub rule: String,
    /// Descriptive query text, reported in details only.
    pub query: String,
    /// When the check passes.
    pub success_condition: SuccessCondition,
    /// Value of `threshold` in the success condition.
    pub threshold: u64,
    /// Finding text; `{count}` is replaced by the violation count.
    pub failure_message: String,
    /// Remediation guidance for findings.
    pub remediation: Option<String>,
}

/// A `manual_review` logic block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualReview {
    /// Registered rule producing items to review.
    pub rule: String,
    /// Descriptive query text.
    pub query: String,
    /// Remediation guidance.
    pub remediation: Option<String>,
}

impl BooleanCheck {
    /// A check with default condition, threshold and message.
    pub fn for_rule(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            query: String::new(),
            success_condition: SuccessCondition::zero_violations(),
            threshold: 0,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            remediation: None,
        }
    }
}

/// Replace `{count}` in a failure message.
///
/// `{{` and `}}` produce literal braces. Any other placeholder or a stray
/// brace is an error, returned as a human-readable message.
pub fn render_failure_message(template: &str, count: usize) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(format!("unclosed placeholder in {template:?}")),
                    }
                }
                if name != "count" {
                    return Err(format!("unknown placeholder {{{name}}} in {template:?}"));
                }
                out.push_str(&count.to_string());
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(format!("unmatched '}}' in {template:?}")),
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn renders_count() {
        assert_eq!(
            render_failure_message("Found {count} admins without MFA", 3).unwrap(),
            "Found 3 admins without MFA"
        );
    }

    #[test]
    fn escaped_braces_are_literal() {
        assert_eq!(
            render_failure_message("{{count}} = {count}", 2).unwrap(),
            "{count} = 2"
        );
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = render_failure_message("{total} failures", 1).unwrap_err();
        assert!(err.contains("{total}"));
        assert!(render_failure_message("oops {count", 1).is_err());
        assert!(render_failure_message("oops }", 1).is_err());
    }

    #[test]
    fn placeholder_name_must_match_exactly() {
        assert!(render_failure_message("{ count } failures", 1).is_err());
        assert!(render_failure_message("{Count}", 1).is_err());
        assert!(render_failure_message("{}", 1).is_err());
    }

    proptest! {
        #[test]
        fn brace_free_text_is_unchanged(text in "[^{}]{0,80}", count in any::<usize>()) {
            prop_assert_eq!(render_failure_message(&text, count).unwrap(), text);
        }

        #[test]
        fn every_count_placeholder_is_replaced(
            parts in proptest::collection::vec("[^{}]{0,12}", 1..5),
            count in any::<usize>(),
        ) {
            let template = parts.join("{count}");
            let expected = parts.join(count.to_string().as_str());
            prop_assert_eq!(render_failure_message(&template, count).unwrap(), expected);
        }
    }

    #[test]
    fn logic_type_names() {
        let b = ControlLogic::BooleanCheck(BooleanCheck::for_rule("r"));
        assert_eq!(b.type_name(), "boolean_check");
        assert_eq!(b.rule(), Some("r"));
        let u = ControlLogic::Unrecognized {
            type_name: "sql_query".to_string(),
        };
        assert_eq!(u.type_name(), "sql_query");
        assert_eq!(u.rule(), None);
    }

    #[test]
    fn logic_serializes_with_type_tag() {
        let v = serde_json::to_value(ControlLogic::BooleanCheck(BooleanCheck::for_rule("r"))).unwrap();
        assert_eq!(v["type"], "boolean_check");
        assert_eq!(v["success_condition"], "row_count = 0");
    }
}
