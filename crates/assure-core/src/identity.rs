//! # Identity Newtypes
//!
//! Each identifier is a distinct type; you cannot pass an [`EvidenceId`]
//! where a [`FindingId`] is expected.
//!
//! UUID-based identifiers ([`EvaluationId`], [`FindingId`], [`EvidenceId`])
//! are always valid by construction. [`ControlId`] is the human-meaningful
//! catalog key (e.g. `CC6.1-MFA`) and is validated when constructed, because
//! it also appears in file names, log fields and CLI arguments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidUuid {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

uuid_id! {
    /// Identifier of one control evaluation.
    EvaluationId, "evaluation"
}

uuid_id! {
    /// Identifier of a finding raised by an evaluation.
    FindingId, "finding"
}

uuid_id! {
    /// Identifier of an evidence record; also the content file stem.
    EvidenceId, "evidence"
}

// ---------------------------------------------------------------------------
// Control identifier (validated at construction)
// ---------------------------------------------------------------------------

/// Stable, human-meaningful control identifier such as `CC6.1-MFA`.
///
/// # Validation
///
/// - 1 to 64 characters
/// - ASCII letters, digits, `.`, `_` and `-` only
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ControlId(String);

impl ControlId {
    /// Maximum accepted length.
    pub const MAX_LEN: usize = 64;

    /// Create a control id, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidControlId`] for empty, overlong or
    /// otherwise malformed input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let valid = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(ValidationError::InvalidControlId(s));
        }
        Ok(Self(s))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for ControlId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ControlId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ControlId> for String {
    fn from(id: ControlId) -> Self {
        id.0
    }
}

impl AsRef<str> for ControlId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
