//! regionmerge library crate.
//!
//! Merges independently authored, region-scoped feature models into one
//! model whose solutions are exactly the union of the regions' solutions,
//! without redundant constraints. The `regionmerge` binary (in
//! `crates/regionmerge-cli`) is a thin shell over this crate.
//!
//! - [`model`]: region ids and the [`Model`](model::Model) type.
//! - [`format`]: the TOML model-file format and the expression parser.
//! - [`merge`]: the contextualize → union → resolve → minimize pipeline.
//! - [`config`]: `regionmerge.toml`.
//! - [`error`]: [`ModelError`](error::ModelError) and [`MergeError`](error::MergeError).
//!
//! Constraint solving sits behind the `Oracle` trait of the
//! `regionmerge-oracle` crate, re-exported here as [`oracle`].

pub mod config;
pub mod error;
pub mod format;
pub mod merge;
pub mod model;

pub use regionmerge_oracle as oracle;
