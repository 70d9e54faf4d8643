//! # assure-controls: Control Catalog and Evaluation Engine
//!
//! Loads declarative control definitions, resolves each control's declared
//! violation rule, and evaluates controls against a snapshot of collected
//! data.
//!
//! ## Flow
//!
//! 1. [`ControlCatalog::load`] parses YAML into [`Control`]s, checking every
//!    `logic.rule` against a [`RuleRegistry`].
//! 2. Connectors produce a [`DataContext`].
//! 3. [`EvaluationEngine`] turns (control, context) into a
//!    [`ControlEvaluation`] and its [`Finding`]s.

pub mod catalog;
pub mod condition;
pub mod context;
pub mod control;
pub mod engine;
pub mod error;
pub mod result;
pub mod rules;

pub use catalog::{CatalogHandle, ControlCatalog, ControlFilter};
pub use condition::{Comparison, Operand, SuccessCondition};
pub use context::DataContext;
pub use control::{BooleanCheck, Control, ControlLogic, ManualReview};
pub use engine::{
    EvaluationEngine, Outcome, DEFAULT_EVALUATOR, MAX_REVIEW_FINDINGS, MAX_VIOLATION_FINDINGS,
};
pub use error::{CatalogError, EngineError, RuleError};
pub use result::{ControlEvaluation, EvaluationBatch, EvaluationFailure, Finding};
pub use rules::{RuleRegistry, Violation, ViolationRule};
