#![warn(missing_docs)]

//! Boolean set operations on trimmed-surface models for the tsolid kernel.
//!
//! Implements union, intersection, subtraction and cut of two models whose
//! surfaces are bounded by UV trimming loops.
//!
//! The pipeline has these stages:
//! 1. **AABB filter**: broadphase to find candidate surface pairs
//! 2. **SSI**: an [`Intersector`] turns each pair into raw chains
//! 3. **Segment building**: chains become shared trimming segments
//! 4. **Splice and filter**: old and new curves are cut at their crossings
//!    and new pieces outside the trimmed regions are dropped
//! 5. **Classification**: references are marked kept or removed, starting
//!    at the intersection curves
//! 6. **Propagation**: verdicts spread to surfaces the curves never touch
//! 7. **Loop merge**: kept references are chained into closed loops
//! 8. **Cleanup**: unreferenced entities are deleted and domains shrunk
//!
//! Merging without a Boolean ([`boolean_merge`]) just combines two
//! models, optionally stitching their coincident boundaries.

/// Debug logging macro - only emits when the debug-boolean feature is enabled
#[allow(unused_macros)]
#[cfg(feature = "debug-boolean")]
macro_rules! debug_bool {
    ($($arg:tt)*) => {
        log::debug!(target: "tsolid::boolean", $($arg)*)
    };
}

/// No-op version when debug-boolean feature is disabled
#[allow(unused_macros)]
#[cfg(not(feature = "debug-boolean"))]
macro_rules! debug_bool {
    ($($arg:tt)*) => {};
}

mod api;
pub mod bbox;
mod classify;
mod cleanup;
mod config;
mod error;
mod loop_merge;
mod matching;
mod pipeline;
mod propagate;
mod segments;
mod splice;
pub mod ssi;
mod stitch;

pub use api::{
    boolean_cut, boolean_intersection, boolean_op, boolean_op_with, boolean_subtraction,
    boolean_union, BooleanOp, BooleanResult, IntersectionCurve,
};
pub use config::BooleanConfig;
pub use error::{BooleanError, Result};
pub use ssi::{AnalyticIntersector, Chain, Intersector};
pub use stitch::boolean_merge;
