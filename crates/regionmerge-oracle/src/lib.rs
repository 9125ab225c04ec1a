//! Satisfiability-oracle abstraction for regionmerge.
//!
//! This crate defines the [`Oracle`] trait: the single interface through
//! which the merge pipeline asks "does this constraint set have a solution?"
//! and "how many solutions does it have?". The pipeline never depends on a
//! concrete solver; any CSP/SAT engine can sit behind the trait.
//!
//! # Crate layout
//!
//! - [`types`]: the constraint language: [`FeatureName`], [`Domain`],
//!   [`Condition`], [`Constraint`] and its guard/negation flags.
//! - [`oracle`]: the [`Oracle`] trait, [`Query`], [`Budget`] and verdicts.
//! - [`enumerate`]: [`EnumerationOracle`], an exhaustive backtracking
//!   backend for small finite domains.
//! - [`error`]: the [`OracleError`] enum returned by all trait methods.

pub mod enumerate;
pub mod error;
pub mod oracle;
pub mod types;

pub use enumerate::EnumerationOracle;
pub use error::{NameError, OracleError};
pub use oracle::{Budget, CountVerdict, CountingOracle, Oracle, OracleStats, Query, Verdict};
pub use types::{
    Assignment, CmpOp, Condition, Constraint, ConstraintKind, Domain, FeatureName, Guard,
};
