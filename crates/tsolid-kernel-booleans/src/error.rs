//! Error types for Boolean operations.

use thiserror::Error;
use tsolid_kernel_math::Point2;
use tsolid_kernel_topo::{SurfaceId, TopologyError};

/// Fatal conditions that abort a Boolean operation.
///
/// Every variant discards the operation's private working copies; the
/// caller's input models are never touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BooleanError {
    /// Invalid back-reference or a segment without an owning surface.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// The operands do not intersect at all.
    #[error("disjoint objects: no intersection found")]
    Disjoint,

    /// A non-finite value showed up during a computation stage.
    #[error("floating-point failure during {stage}")]
    FloatingPoint {
        /// The stage that produced the value.
        stage: &'static str,
    },

    /// No neighbor at an intersection junction, even at the widest tolerance.
    #[error("no neighbor found at ({}, {}) on surface {surface:?}", uv.x, uv.y)]
    NeighborLookup {
        /// Surface being classified.
        surface: SurfaceId,
        /// The junction point.
        uv: Point2,
    },

    /// A loop could not be continued from an end point.
    #[error("no end point matches ({}, {}) on surface {surface:?} within {tolerance}", uv.x, uv.y)]
    EndpointMatch {
        /// Surface whose loops are being rebuilt.
        surface: SurfaceId,
        /// The unmatched end point.
        uv: Point2,
        /// Widest tolerance tried.
        tolerance: f64,
    },

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The intersection solver cannot handle a surface pair.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Result alias for Boolean operations.
pub type Result<T> = std::result::Result<T, BooleanError>;

/// Fail with [`BooleanError::FloatingPoint`] unless every value is finite.
pub(crate) fn ensure_finite(stage: &'static str, values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(BooleanError::FloatingPoint { stage })
    }
}
