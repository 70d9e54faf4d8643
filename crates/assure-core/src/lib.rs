#![deny(missing_docs)]

//! # assure-core: Foundational Types for the assure Compliance Stack
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies, only `serde`, `serde_json`,
//! `thiserror`, `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`FindingId`]
//!    where an [`EvaluationId`] is expected, and a [`ControlId`] is validated
//!    at construction.
//!
//! 2. **[`CanonicalBytes`] is the path to structured digests.** Structured
//!    evidence is serialized with sorted keys and compact separators before
//!    hashing, so the same JSON value always yields the same [`ContentDigest`].
//!
//! 3. **One enum per vocabulary.** Trust Services categories, severities,
//!    evaluation statuses, finding statuses, and evidence types are each
//!    defined once, with the exact wire spellings used by catalogs and the
//!    vault index.
//!
//! 4. **Structured errors with `thiserror`.** No `Box<dyn Error>`, no
//!    `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod domain;
pub mod error;
pub mod identity;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_bytes, sha256_digest, ContentDigest, DigestAlgorithm};
pub use domain::{
    ControlType, EvaluationStatus, EvidenceType, FindingStatus, Severity, TscCategory,
};
pub use error::{CanonicalizationError, ValidationError};
pub use identity::{ControlId, EvaluationId, EvidenceId, FindingId};
