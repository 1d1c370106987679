//! The template machinery: definition registry, canonical instantiation
//! naming, argument deduction, substitution, lazy class instantiation, and
//! concept/constraint evaluation.
//!
//! Instantiation is idempotent keyed by `(template name, canonical args)`
//! and never a hard error from this crate: every entry point returns an
//! `Option`/`Result` the caller interprets, which is what makes SFINAE a
//! caller policy rather than a special case here.

mod concepts;
mod deduce;
mod engine;
mod naming;
mod registry;
mod substitute;

pub use concepts::{evaluate_constraint, ConstraintContext};
pub use deduce::{DeductionError, DeductionResult, TypeDeducer};
pub use engine::InstantiationEngine;
pub use naming::{canonical_args, get_instantiated_class_name};
pub use registry::{InstantiationPhase, TemplateRegistry};
pub use substitute::{Bindings, Substituter};
