//! Public API types and entry points for Boolean operations.

use tsolid_kernel_geom::{SpaceCurve, UvCurve};
use tsolid_kernel_topo::{Input, Model, SurfaceId};

use crate::config::BooleanConfig;
use crate::error::Result;
use crate::pipeline;
use crate::ssi::{AnalyticIntersector, Intersector};

/// Boolean operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    /// Union: combine both models.
    Union,
    /// Intersection: keep only the overlapping region.
    Intersection,
    /// Subtraction: remove the second model from the first.
    Subtraction,
    /// Cut: trim the first model by the second, discarding the second.
    Cut,
}

impl BooleanOp {
    /// Whether the parts of `input`'s surfaces lying outside the other
    /// model survive.
    pub(crate) fn keeps_outside(self, input: Input) -> bool {
        match self {
            BooleanOp::Union => true,
            BooleanOp::Intersection => false,
            BooleanOp::Subtraction | BooleanOp::Cut => input == Input::Input1,
        }
    }
}

/// One intersection curve, trimmed to both surfaces' valid regions.
#[derive(Debug, Clone)]
pub struct IntersectionCurve {
    /// Model-space curve.
    pub euclidean: SpaceCurve,
    /// Image in the first operand surface's parameter plane.
    pub uv_first: UvCurve,
    /// Image in the second operand surface's parameter plane.
    pub uv_second: UvCurve,
    /// Surface of the first operand, by its key in that operand.
    pub surface_first: SurfaceId,
    /// Surface of the second operand, by its key in that operand.
    pub surface_second: SurfaceId,
}

/// Result of a Boolean operation.
#[derive(Debug, Clone)]
pub enum BooleanResult {
    /// The combined model.
    Model(Box<Model>),
    /// Intersection curves only (diagnostic mode).
    Curves(Vec<IntersectionCurve>),
}

impl BooleanResult {
    /// Get a reference to the model, if this is a model result.
    pub fn as_model(&self) -> Option<&Model> {
        match self {
            BooleanResult::Model(model) => Some(model.as_ref()),
            BooleanResult::Curves(_) => None,
        }
    }

    /// Convert to a model, consuming self.
    /// Returns None in intersection-curve mode.
    pub fn into_model(self) -> Option<Model> {
        match self {
            BooleanResult::Model(model) => Some(*model),
            BooleanResult::Curves(_) => None,
        }
    }

    /// The intersection curves, if this is a curve result.
    pub fn curves(&self) -> Option<&[IntersectionCurve]> {
        match self {
            BooleanResult::Curves(curves) => Some(curves),
            BooleanResult::Model(_) => None,
        }
    }
}

/// Perform a Boolean operation with the built-in [`AnalyticIntersector`].
///
/// Both operands are copied; they are never modified, including on error.
/// Fails with [`BooleanError::Disjoint`](crate::BooleanError::Disjoint)
/// when the operands do not meet.
pub fn boolean_op(a: &Model, b: &Model, op: BooleanOp, config: &BooleanConfig) -> Result<BooleanResult> {
    boolean_op_with(a, b, op, config, &AnalyticIntersector)
}

/// Perform a Boolean operation with a caller-supplied intersection solver.
pub fn boolean_op_with(
    a: &Model,
    b: &Model,
    op: BooleanOp,
    config: &BooleanConfig,
    solver: &dyn Intersector,
) -> Result<BooleanResult> {
    pipeline::run(a, b, op, config, solver)
}

/// Union of two models.
pub fn boolean_union(a: &Model, b: &Model, config: &BooleanConfig) -> Result<BooleanResult> {
    boolean_op(a, b, BooleanOp::Union, config)
}

/// Intersection of two models.
pub fn boolean_intersection(a: &Model, b: &Model, config: &BooleanConfig) -> Result<BooleanResult> {
    boolean_op(a, b, BooleanOp::Intersection, config)
}

/// `a` minus `b`.
pub fn boolean_subtraction(a: &Model, b: &Model, config: &BooleanConfig) -> Result<BooleanResult> {
    boolean_op(a, b, BooleanOp::Subtraction, config)
}

/// `a` trimmed by `b`; the surfaces of `b` are discarded.
pub fn boolean_cut(a: &Model, b: &Model, config: &BooleanConfig) -> Result<BooleanResult> {
    boolean_op(a, b, BooleanOp::Cut, config)
}
