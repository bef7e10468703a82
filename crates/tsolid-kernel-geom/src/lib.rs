#![warn(missing_docs)]

//! Parametric surfaces and trimming curves for the tsolid kernel.
//!
//! Provides the narrow geometric contract the Boolean engine consumes:
//! surfaces that can be evaluated, differentiated and restricted to a
//! sub-domain, and piecewise-linear curves (in the parameter plane or in
//! model space) that can be evaluated, subdivided, reversed and
//! intersected.

use std::any::Any;
use tsolid_kernel_math::{Dir3, Point2, Point3, Transform, Vec3};

pub mod polyline;

pub use polyline::{
    point_in_region, CurveEnd, Polyline, SpaceCurve, Split, SplitFlags, SplitOutcome, UvCurve,
};

/// A rectangular parameter domain `((u_min, u_max), (v_min, v_max))`.
pub type Domain = ((f64, f64), (f64, f64));

// =============================================================================
// Surface types
// =============================================================================

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Planar patch.
    Plane,
    /// Bilinear patch (4-corner interpolation).
    Bilinear,
}

/// A parametric surface patch in 3D space, bounded by a rectangular domain.
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at parameter `(u, v)` to get a 3D point.
    fn evaluate(&self, uv: Point2) -> Point3;

    /// Surface normal at parameter `(u, v)`, following `d_du × d_dv`.
    fn normal(&self, uv: Point2) -> Dir3;

    /// Partial derivative with respect to u at `(u, v)`.
    fn d_du(&self, uv: Point2) -> Vec3;

    /// Partial derivative with respect to v at `(u, v)`.
    fn d_dv(&self, uv: Point2) -> Vec3;

    /// Parameter domain as `((u_min, u_max), (v_min, v_max))`.
    fn domain(&self) -> Domain;

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;

    /// Clone this surface into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Apply an affine transform to this surface, returning a new surface.
    /// The parametrization is preserved: `(u, v)` maps to the transformed point.
    fn transform(&self, t: &Transform) -> Box<dyn Surface>;

    /// Extract the sub-patch over `u_range × v_range`. Parameter values are
    /// preserved, so trimming curves stay valid on the result.
    fn restrict(&self, u_range: (f64, f64), v_range: (f64, f64)) -> Box<dyn Surface>;
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Whether `uv` lies inside `domain`, widened by `tol`.
pub fn domain_contains(domain: &Domain, uv: &Point2, tol: f64) -> bool {
    let ((u0, u1), (v0, v1)) = *domain;
    uv.x >= u0 - tol && uv.x <= u1 + tol && uv.y >= v0 - tol && uv.y <= v1 + tol
}

// =============================================================================
// Plane
// =============================================================================

/// A planar patch defined by an origin and two spanning axes.
///
/// Parameterization: `P(u, v) = origin + u * x_axis + v * y_axis`.
/// The axes need not be unit length, which keeps the parametrization exact
/// under scaling transforms.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Point at `(u, v) = (0, 0)`.
    pub origin: Point3,
    /// Derivative along u.
    pub x_axis: Vec3,
    /// Derivative along v.
    pub y_axis: Vec3,
    /// Unit normal (`x_axis × y_axis`, normalized).
    pub normal_dir: Dir3,
    /// Parameter range along u.
    pub u_range: (f64, f64),
    /// Parameter range along v.
    pub v_range: (f64, f64),
}

impl Plane {
    /// Create a plane from an origin and two spanning axes, with an
    /// effectively unbounded domain.
    pub fn new(origin: Point3, x_axis: Vec3, y_axis: Vec3) -> Self {
        Self {
            origin,
            x_axis,
            y_axis,
            normal_dir: Dir3::new_normalize(x_axis.cross(&y_axis)),
            u_range: (-1e10, 1e10),
            v_range: (-1e10, 1e10),
        }
    }

    /// Restrict the patch to `u_range × v_range`.
    pub fn with_domain(mut self, u_range: (f64, f64), v_range: (f64, f64)) -> Self {
        self.u_range = u_range;
        self.v_range = v_range;
        self
    }

    /// XY plane at the origin.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        let (xx, xy, yy) = (
            self.x_axis.dot(&self.x_axis),
            self.x_axis.dot(&self.y_axis),
            self.y_axis.dot(&self.y_axis),
        );
        let (dx, dy) = (d.dot(&self.x_axis), d.dot(&self.y_axis));
        let det = xx * yy - xy * xy;
        if det.abs() < 1e-300 {
            return Point2::origin();
        }
        Point2::new((dx * yy - dy * xy) / det, (dy * xx - dx * xy) / det)
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.origin + uv.x * self.x_axis + uv.y * self.y_axis
    }

    fn normal(&self, _uv: Point2) -> Dir3 {
        self.normal_dir
    }

    fn d_du(&self, _uv: Point2) -> Vec3 {
        self.x_axis
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        self.y_axis
    }

    fn domain(&self) -> Domain {
        (self.u_range, self.v_range)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn transform(&self, t: &Transform) -> Box<dyn Surface> {
        let plane = Plane::new(
            t.apply_point(&self.origin),
            t.apply_vec(&self.x_axis),
            t.apply_vec(&self.y_axis),
        );
        Box::new(plane.with_domain(self.u_range, self.v_range))
    }

    fn restrict(&self, u_range: (f64, f64), v_range: (f64, f64)) -> Box<dyn Surface> {
        Box::new(self.clone().with_domain(u_range, v_range))
    }
}

// =============================================================================
// Bilinear patch
// =============================================================================

/// A bilinear patch interpolating four corner points over `[0, 1]²`.
///
/// The patch may be restricted to a sub-rectangle of the unit square; the
/// parametrization itself is always the one of the full patch.
#[derive(Debug, Clone)]
pub struct BilinearSurface {
    /// Corner at (u=0, v=0).
    pub p00: Point3,
    /// Corner at (u=1, v=0).
    pub p10: Point3,
    /// Corner at (u=0, v=1).
    pub p01: Point3,
    /// Corner at (u=1, v=1).
    pub p11: Point3,
    /// Parameter range along u.
    pub u_range: (f64, f64),
    /// Parameter range along v.
    pub v_range: (f64, f64),
}

impl BilinearSurface {
    /// Create a bilinear surface from four corner points.
    pub fn new(p00: Point3, p10: Point3, p01: Point3, p11: Point3) -> Self {
        Self {
            p00,
            p10,
            p01,
            p11,
            u_range: (0.0, 1.0),
            v_range: (0.0, 1.0),
        }
    }
}

impl Surface for BilinearSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (u, v) = (uv.x, uv.y);
        let (u1, v1) = (1.0 - u, 1.0 - v);
        Point3::from(
            u1 * v1 * self.p00.coords
                + u * v1 * self.p10.coords
                + u1 * v * self.p01.coords
                + u * v * self.p11.coords,
        )
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let n = self.d_du(uv).cross(&self.d_dv(uv));
        if n.norm() < 1e-12 {
            Dir3::new_normalize(Vec3::z())
        } else {
            Dir3::new_normalize(n)
        }
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        let v = uv.y;
        (1.0 - v) * (self.p10 - self.p00) + v * (self.p11 - self.p01)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        let u = uv.x;
        (1.0 - u) * (self.p01 - self.p00) + u * (self.p11 - self.p10)
    }

    fn domain(&self) -> Domain {
        (self.u_range, self.v_range)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Bilinear
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn transform(&self, t: &Transform) -> Box<dyn Surface> {
        Box::new(BilinearSurface {
            p00: t.apply_point(&self.p00),
            p10: t.apply_point(&self.p10),
            p01: t.apply_point(&self.p01),
            p11: t.apply_point(&self.p11),
            u_range: self.u_range,
            v_range: self.v_range,
        })
    }

    fn restrict(&self, u_range: (f64, f64), v_range: (f64, f64)) -> Box<dyn Surface> {
        Box::new(BilinearSurface {
            u_range,
            v_range,
            ..self.clone()
        })
    }
}
