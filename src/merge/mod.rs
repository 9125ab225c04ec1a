//! Region merge engine.
//!
//! Implements the contextualize → union → resolve → minimize pipeline, plus
//! optional verification. Each stage is a separate module and a pure
//! function from models to a new model.
//!
//! - **contextualize**: guard each region's ordinary constraints with the
//!   region indicator ([`contextualize`]).
//! - **union**: concatenate the guarded models ([`union`], [`union_all`]).
//! - **resolve**: lift constraints that hold in every region back to
//!   unconditional form ([`resolve`]).
//! - **minimize**: drop constraints implied by the rest ([`minimize`]).
//! - **verify**: compare solution counts against the inputs ([`verify`]).
//!
//! [`merge`] runs all of them; [`merge_batch`] runs independent merges on
//! scoped threads.
//!
//! # Correctness
//!
//! Every stage after union preserves the solution space exactly. The union
//! restricted to a region's indicator has the same solutions as that region,
//! so the final model's solutions are the disjoint union of the regions'.

pub mod contextualize;
pub mod minimize;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod types;
pub mod union;
pub mod verify;

pub use contextualize::contextualize;
pub use minimize::{MinimizeOptions, MinimizeOutcome, MinimizeStats, minimize};
pub use pipeline::{MergeJob, MergeOutcome, check_satisfiable, merge, merge_batch};
pub use report::{MergeReport, RegionSummary, Stage, StageTiming};
pub use resolve::{ResolveOptions, ResolveOutcome, ResolveStats, resolve};
pub use types::{CancelFlag, Indicator, IndicatorStrategy, MergeOptions};
pub use union::{union, union_all};
pub use verify::{CountCheck, Verification, verify};
