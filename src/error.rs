//! Error types for model loading and merging.
//!
//! [`ModelError`] covers everything that can be wrong with a single model
//! (bad names, dangling feature references, unreadable files). [`MergeError`]
//! is returned by the pipeline stages and wraps both model and oracle errors.
//!
//! Messages are written for the person running a merge: each says what went
//! wrong and, where there is one, how to fix it. Oracle timeouts are never
//! errors; they are counted in the [`MergeReport`](crate::merge::report::MergeReport).

use std::path::PathBuf;

use regionmerge_oracle::{Domain, FeatureName, NameError, OracleError};
use thiserror::Error;

use crate::model::types::RegionId;

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Errors describing an invalid or unreadable model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A constraint references a feature the model does not declare.
    #[error(
        "constraint #{index} ({constraint}) references unknown feature `{feature}` in region '{region}'.\n  To fix: declare `{feature}` under [features] or correct the constraint."
    )]
    UnknownFeature {
        /// Region of the offending model.
        region: RegionId,
        /// Position of the constraint in the model.
        index: usize,
        /// Rendering of the constraint.
        constraint: String,
        /// The undeclared feature.
        feature: FeatureName,
    },

    /// The model root is not a declared feature.
    #[error("root feature `{root}` of region '{region}' is not declared.\n  To fix: add `{root} = \"bool\"` under [features].")]
    UnknownRoot {
        /// Region of the offending model.
        region: RegionId,
        /// The undeclared root.
        root: FeatureName,
    },

    /// A feature was declared with an empty range.
    #[error("feature `{feature}` has an empty domain [{min}..{max}].\n  To fix: make sure min <= max.")]
    EmptyDomain {
        /// The feature.
        feature: FeatureName,
        /// Declared lower bound.
        min: i64,
        /// Declared upper bound.
        max: i64,
    },

    /// A region identifier failed validation.
    #[error("invalid region '{value}': {reason}")]
    InvalidRegion {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A feature name failed validation.
    #[error(transparent)]
    InvalidFeatureName(#[from] NameError),

    /// An expression could not be parsed.
    #[error("line {line}, column {column}: {message}")]
    Parse {
        /// 1-based line inside the expression.
        line: usize,
        /// 1-based column inside the expression.
        column: usize,
        /// What was expected.
        message: String,
    },

    /// A model file could not be parsed or written.
    #[error("{}: {message}", display_path(.path.as_deref()))]
    Format {
        /// The file involved, when known.
        path: Option<PathBuf>,
        /// Human-readable message with line-level detail when possible.
        message: String,
    },

    /// An I/O error while reading or writing a model file.
    #[error("could not access {}: {source}", .path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

fn display_path(path: Option<&std::path::Path>) -> String {
    path.map_or_else(|| "<model>".to_owned(), |p| p.display().to_string())
}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Errors that abort a merge.
#[derive(Debug, Error)]
pub enum MergeError {
    /// An input (or intermediate) model is invalid.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The oracle failed for a reason other than running out of budget.
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// A source model has no solutions, so every entailment check would be vacuous.
    #[error(
        "region '{region}' is unsatisfiable before merging.\n  To fix: repair the region's constraints; `regionmerge check <file>` reports satisfiability."
    )]
    BaseModelUnsatisfiable {
        /// The offending region.
        region: RegionId,
    },

    /// The base-satisfiability check ran out of budget.
    #[error(
        "could not decide whether region '{region}' is satisfiable within the oracle budget.\n  To fix: raise [oracle] timeout_ms / max_steps, or disable merge.check_base."
    )]
    BaseModelUndecided {
        /// The region whose check timed out.
        region: RegionId,
    },

    /// Two models declare the same feature with different domains.
    #[error(
        "feature `{feature}` has domain {left} in one model and {right} in another.\n  To fix: align the declarations before merging; union never widens domains."
    )]
    DomainMismatch {
        /// The colliding feature.
        feature: FeatureName,
        /// Domain on the left-hand side.
        left: Domain,
        /// Domain on the right-hand side.
        right: Domain,
    },

    /// Two models declare different root features.
    #[error("models have different roots `{left}` and `{right}`.\n  To fix: give every region model the same root feature.")]
    RootMismatch {
        /// Root of the left-hand model.
        left: FeatureName,
        /// Root of the right-hand model.
        right: FeatureName,
    },

    /// The feature-tree indicator strategy needs a model root.
    #[error("region '{region}' has no root feature, required by the feature-tree strategy.\n  To fix: set `root = \"...\"` in the model file or use the integer strategy.")]
    MissingRoot {
        /// The offending region.
        region: RegionId,
    },

    /// An indicator value does not fit the indicator's domain.
    #[error("indicator value {value} for region '{region}' is outside the indicator domain {domain}")]
    IndicatorOutOfDomain {
        /// The region being contextualized.
        region: RegionId,
        /// The requested value.
        value: i64,
        /// The indicator's domain.
        domain: Domain,
    },

    /// The indicator feature name collides with a feature of a source model.
    #[error("indicator `{feature}` is already a feature of region '{region}'.\n  To fix: choose another indicator name (merge.indicator).")]
    IndicatorClash {
        /// The region that already uses the name.
        region: RegionId,
        /// The clashing feature.
        feature: FeatureName,
    },

    /// A merge was started with no models.
    #[error("nothing to merge: at least one region model is required")]
    NoModels,

    /// Two input models carry the same region id.
    #[error("region '{region}' appears more than once.\n  To fix: every input model needs a distinct `region`.")]
    DuplicateRegion {
        /// The repeated region.
        region: RegionId,
    },

    /// The merged model does not reproduce a region's solution count.
    #[error(
        "verification failed for region '{region}': expected {expected} solutions, merged model has {actual}"
    )]
    VerificationFailed {
        /// The region (or `merged` for the total).
        region: RegionId,
        /// Count of the source model.
        expected: u128,
        /// Count of the merged model restricted to the region.
        actual: u128,
    },
}
