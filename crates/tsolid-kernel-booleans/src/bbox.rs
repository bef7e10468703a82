//! Axis-aligned bounding boxes of trimmed surfaces and surface-pair filtering.
//!
//! Used as a broadphase filter: only surface pairs with overlapping boxes
//! are handed to the intersection solver.

use tsolid_kernel_geom::SurfaceKind;
use tsolid_kernel_math::{Point2, Point3};
use tsolid_kernel_topo::{Model, SurfaceId};

use crate::error::Result;

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Whether no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Expand to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Expand to include another box.
    pub fn include(&mut self, other: &Aabb3) {
        if !other.is_empty() {
            self.include_point(&other.min);
            self.include_point(&other.max);
        }
    }

    /// Test if two boxes overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Grow by `tol` in all directions.
    pub fn expand(&mut self, tol: f64) {
        self.min -= tol * tsolid_kernel_math::Vec3::repeat(1.0);
        self.max += tol * tsolid_kernel_math::Vec3::repeat(1.0);
    }
}

/// Bounding box of a surface's trimmed region.
///
/// Planar regions are bounded exactly by their trimming curves. Other
/// patches also include their domain corners, which bound a bilinear
/// patch through its convex hull.
pub fn surface_bounds(model: &Model, id: SurfaceId) -> Result<Aabb3> {
    let s = model.surface(id)?;
    let mut aabb = Aabb3::empty();
    for r in model.surface_refs(id)? {
        for uv in model.ref_raw_curve(r)?.points() {
            aabb.include_point(&s.surface.evaluate(*uv));
        }
    }
    if s.surface.surface_type() != SurfaceKind::Plane {
        let ((u0, u1), (v0, v1)) = s.surface.domain();
        for (u, v) in [(u0, v0), (u1, v0), (u0, v1), (u1, v1)] {
            aabb.include_point(&s.surface.evaluate(Point2::new(u, v)));
        }
    }
    Ok(aabb)
}

/// Bounding box of a whole model.
pub fn model_bounds(model: &Model) -> Result<Aabb3> {
    let mut aabb = Aabb3::empty();
    for id in model.surfaces.keys() {
        aabb.include(&surface_bounds(model, id)?);
    }
    Ok(aabb)
}

/// Surface pairs `(a, b)` whose boxes, grown by `tol`, overlap.
pub fn candidate_pairs(
    model: &Model,
    first: &[SurfaceId],
    second: &[SurfaceId],
    tol: f64,
) -> Result<Vec<(SurfaceId, SurfaceId)>> {
    let boxes_b = second
        .iter()
        .map(|&id| surface_bounds(model, id))
        .collect::<Result<Vec<_>>>()?;
    let mut pairs = Vec::new();
    for &a in first {
        let mut box_a = surface_bounds(model, a)?;
        box_a.expand(tol);
        for (&b, box_b) in second.iter().zip(&boxes_b) {
            if box_a.overlaps(box_b) {
                pairs.push((a, b));
            }
        }
    }
    Ok(pairs)
}
