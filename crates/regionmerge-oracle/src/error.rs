//! Error types for oracle queries.
//!
//! [`OracleError`] is the single error type returned by all [`Oracle`](crate::Oracle)
//! methods. A query that runs out of budget is *not* an error: it yields
//! [`Verdict::Timeout`](crate::Verdict::Timeout) so callers can take the
//! conservative branch.

use thiserror::Error;

use crate::types::{Domain, FeatureName};

/// Errors returned by [`Oracle`](crate::Oracle) operations.
#[derive(Debug, Error)]
pub enum OracleError {
    /// A constraint or assumption references a feature with no domain in the query.
    #[error("query references unknown feature `{feature}`")]
    UnknownFeature {
        /// The feature that has no domain.
        feature: FeatureName,
    },

    /// An assumption fixes a feature to a value outside its domain.
    #[error("assumption `{feature} = {value}` is outside the domain {domain}")]
    ValueOutOfDomain {
        /// The assumed feature.
        feature: FeatureName,
        /// The assumed value.
        value: i64,
        /// The feature's declared domain.
        domain: Domain,
    },

    /// A feature was declared with `min > max`.
    #[error("feature `{feature}` has an empty domain")]
    EmptyDomain {
        /// The feature with no values.
        feature: FeatureName,
    },

    /// The underlying engine failed for a reason that fits no other variant.
    #[error("oracle backend error: {message}")]
    Backend {
        /// Freeform error description from the backend.
        message: String,
    },
}

/// A feature name failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid feature name `{value}`: {reason}")]
pub struct NameError {
    /// The raw value that failed validation.
    pub value: String,
    /// Why validation failed.
    pub reason: String,
}
