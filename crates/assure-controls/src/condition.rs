//! # Success Conditions
//!
//! A boolean check passes when its success condition holds for the number
//! of violating records. Conditions are written in catalogs as
//! `row_count <op> <operand>`:
//!
//! | op | meaning |
//! |----|---------|
//! | `=`, `==` | equal |
//! | `<`, `<=`, `>`, `>=` | ordered comparison |
//!
//! The operand is a non-negative integer or the word `threshold`, which
//! resolves to the logic block's `threshold` (default 0).
//!
//! Conditions are parsed once at catalog load. A string that does not match
//! the grammar falls back to "zero violations" and is flagged so the
//! fallback shows up in evaluation details instead of passing silently.

use std::fmt;

use serde::{Serialize, Serializer};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=` or `==`.
    Eq,
    /// `<`.
    Lt,
    /// `<=`.
    Le,
    /// `>`.
    Gt,
    /// `>=`.
    Ge,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn apply(&self, lhs: u64, rhs: u64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// A literal count.
    Literal(u64),
    /// The logic block's `threshold`.
    Threshold,
}

/// A parsed `row_count <op> <operand>` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessCondition {
    /// Operator.
    pub comparison: Comparison,
    /// Right-hand side.
    pub operand: Operand,
    raw: String,
    fallback: bool,
}

impl SuccessCondition {
    /// `row_count = 0`, the condition used when none is declared.
    pub fn zero_violations() -> Self {
        Self {
            comparison: Comparison::Eq,
            operand: Operand::Literal(0),
            raw: "row_count = 0".to_string(),
            fallback: false,
        }
    }

    /// Parse a condition string.
    ///
    /// Never fails: an unrecognized string yields the zero-violation rule
    /// with [`is_fallback`](Self::is_fallback) set.
    pub fn parse(raw: &str) -> Self {
        match parse_parts(raw) {
            Some((comparison, operand)) => Self {
                comparison,
                operand,
                raw: raw.trim().to_string(),
                fallback: false,
            },
            None => Self {
                comparison: Comparison::Eq,
                operand: Operand::Literal(0),
                raw: raw.to_string(),
                fallback: true,
            },
        }
    }

    /// Whether `violations` satisfies the condition.
    pub fn holds(&self, violations: u64, threshold: u64) -> bool {
        let rhs = match self.operand {
            Operand::Literal(n) => n,
            Operand::Threshold => threshold,
        };
        self.comparison.apply(violations, rhs)
    }

    /// True when the declared string could not be parsed.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// The condition as written in the catalog.
    pub fn as_declared(&self) -> &str {
        &self.raw
    }
}

impl Default for SuccessCondition {
    fn default() -> Self {
        Self::zero_violations()
    }
}

impl fmt::Display for SuccessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::Literal(n) => write!(f, "row_count {} {n}", self.comparison.symbol()),
            Operand::Threshold => write!(f, "row_count {} threshold", self.comparison.symbol()),
        }
    }
}

impl Serialize for SuccessCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

fn parse_parts(raw: &str) -> Option<(Comparison, Operand)> {
    let rest = raw.trim().strip_prefix("row_count")?.trim_start();
    // Two-character operators first so `<=` is not read as `<`.
    let (comparison, rest) = [
        ("==", Comparison::Eq),
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("=", Comparison::Eq),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ]
    .iter()
    .find_map(|(sym, cmp)| rest.strip_prefix(sym).map(|r| (*cmp, r.trim())))?;
    let operand = if rest == "threshold" {
        Operand::Threshold
    } else {
        Operand::Literal(rest.parse().ok()?)
    };
    Some((comparison, operand))
}
