//! # Vocabularies: Single Source of Truth
//!
//! Every closed vocabulary used by catalogs, evaluation results and the
//! evidence index is defined here exactly once. Each enum carries its wire
//! spelling (`as_str`), which is what serialization emits. Parsing is
//! case-insensitive and treats `_`, `-` and spaces as equivalent, so catalog
//! authors can write `processing_integrity` or `Processing Integrity`.
//!
//! Adding a variant forces every exhaustive `match` in the workspace to
//! handle it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub fn all() -> &'static [$name] {
                &[$( Self::$variant, )+]
            }

            /// The wire spelling of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                Self::all()
                    .iter()
                    .copied()
                    .find(|v| normalize(v.as_str()) == wanted)
                    .ok_or_else(|| ValidationError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                        expected: Self::all()
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

vocabulary! {
    /// AICPA Trust Services Criteria category a control belongs to.
    TscCategory, "category" {
        /// Common criteria (CC series).
        Security => "Security",
        /// Availability (A series).
        Availability => "Availability",
        /// Confidentiality (C series).
        Confidentiality => "Confidentiality",
        /// Processing integrity (PI series).
        ProcessingIntegrity => "Processing Integrity",
        /// Privacy (P series).
        Privacy => "Privacy",
    }
}

vocabulary! {
    /// How a control is implemented.
    ControlType, "control type" {
        /// Policies, procedures and reviews.
        Administrative => "Administrative",
        /// Enforced by systems.
        Technical => "Technical",
        /// Physical safeguards.
        Physical => "Physical",
    }
}

vocabulary! {
    /// Severity of a control and of the findings it raises.
    ///
    /// Ordered from most to least severe, so `Severity::Critical <
    /// Severity::Info`.
    Severity, "severity" {
        /// Immediate exposure.
        Critical => "critical",
        /// Serious gap.
        High => "high",
        /// Moderate gap.
        Medium => "medium",
        /// Minor gap.
        Low => "low",
        /// Informational; used for manual review items.
        Info => "info",
    }
}

vocabulary! {
    /// Outcome of evaluating one control.
    EvaluationStatus, "evaluation status" {
        /// The success condition held.
        Pass => "pass",
        /// The success condition did not hold.
        Fail => "fail",
        /// Items were flagged for human review.
        Warning => "warning",
        /// The logic type is not understood by this engine.
        NotEvaluated => "not_evaluated",
    }
}

vocabulary! {
    /// Lifecycle state of a finding.
    FindingStatus, "finding status" {
        /// Newly raised.
        Open => "open",
        /// Someone is working on it.
        InProgress => "in_progress",
        /// Remediated.
        Resolved => "resolved",
    }
}

vocabulary! {
    /// Kind of artifact held in the evidence vault.
    ///
    /// The wire spelling is also the directory name in the vault layout.
    EvidenceType, "evidence type" {
        /// Audit or system log extract.
        Log => "log",
        /// Configuration snapshot.
        Config => "config",
        /// Policy document.
        Policy => "policy",
        /// Ticket or change record.
        Ticket => "ticket",
        /// Screenshot.
        Screenshot => "screenshot",
        /// Generated report.
        Report => "report",
    }
}

impl FindingStatus {
    /// Whether moving from `self` to `to` is an allowed transition.
    ///
    /// Open and in-progress findings may move to each other or to resolved;
    /// a resolved finding may only be reopened. Same-state moves are refused.
    pub fn can_transition_to(&self, to: FindingStatus) -> bool {
        use FindingStatus::*;
        matches!(
            (self, to),
            (Open, InProgress)
                | (Open, Resolved)
                | (InProgress, Open)
                | (InProgress, Resolved)
                | (Resolved, Open)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_spellings_roundtrip_through_serde() {
        for c in TscCategory::all() {
            let v = serde_json::to_value(c).unwrap();
            assert_eq!(v, serde_json::json!(c.as_str()));
            let back: TscCategory = serde_json::from_value(v).unwrap();
            assert_eq!(&back, c);
        }
    }

    #[test]
    fn parsing_is_lenient_about_case_and_separators() {
        assert_eq!(
            "processing_integrity".parse::<TscCategory>().unwrap(),
            TscCategory::ProcessingIntegrity
        );
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(
            "not-evaluated".parse::<EvaluationStatus>().unwrap(),
            EvaluationStatus::NotEvaluated
        );
        assert_eq!(
            "In Progress".parse::<FindingStatus>().unwrap(),
            FindingStatus::InProgress
        );
    }

    #[test]
    fn unknown_value_rejected() {
        let err = "urgent".parse::<Severity>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("urgent"));
        assert!(msg.contains("critical, high, medium, low, info"));
    }

    #[test]
    fn severity_orders_most_severe_first() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::Low < Severity::Info);
    }

    #[test]
    fn evidence_type_display_matches_directory_name() {
        assert_eq!(EvidenceType::Config.to_string(), "config");
        assert_eq!(EvidenceType::all().len(), 6);
    }

    #[test]
    fn finding_transitions() {
        use FindingStatus::*;
        assert!(Open.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Resolved));
        assert!(Resolved.can_transition_to(Open));
        assert!(!Resolved.can_transition_to(InProgress));
        assert!(!Open.can_transition_to(Open));
    }
}
