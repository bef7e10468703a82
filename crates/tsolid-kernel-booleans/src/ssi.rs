//! Surface-surface intersection (SSI) for the surface kinds of the kernel.
//!
//! The solver is a collaborator of the Boolean engine: it turns a pair of
//! surfaces into raw chains of product-space points `(u1, v1, u2, v2)`,
//! the first pair on the first surface and the second pair on the second.
//! The engine never looks inside a solver; anything implementing
//! [`Intersector`] can be plugged in.

use std::collections::HashMap;

use tsolid_kernel_geom::{domain_contains, Plane, Surface, SurfaceKind};
use tsolid_kernel_math::{Point2, Point3};

use crate::config::BooleanConfig;
use crate::error::{BooleanError, Result};

/// One raw intersection chain in product parameter space.
pub type Chain = Vec<[f64; 4]>;

/// Computes intersection chains between two surfaces.
pub trait Intersector: Send + Sync {
    /// Chains of `(u_a, v_a, u_b, v_b)` points where `a` and `b` meet
    /// inside both of their domains. Chains may be open or closed.
    fn intersect(&self, a: &dyn Surface, b: &dyn Surface, config: &BooleanConfig)
        -> Result<Vec<Chain>>;
}

/// Solver for planes and bilinear patches.
///
/// - plane / plane: exact line, clipped to both domains
/// - plane / bilinear: marching squares over the patch domain
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticIntersector;

impl Intersector for AnalyticIntersector {
    fn intersect(
        &self,
        a: &dyn Surface,
        b: &dyn Surface,
        config: &BooleanConfig,
    ) -> Result<Vec<Chain>> {
        match (a.surface_type(), b.surface_type()) {
            (SurfaceKind::Plane, SurfaceKind::Plane) => match (downcast_plane(a), downcast_plane(b)) {
                (Some(pa), Some(pb)) => Ok(plane_plane(pa, pb, config).into_iter().collect()),
                _ => Ok(Vec::new()),
            },
            (SurfaceKind::Plane, SurfaceKind::Bilinear) => match downcast_plane(a) {
                Some(p) => Ok(plane_patch(p, b, config)
                    .into_iter()
                    .map(|c| c.into_iter().map(|[s, t, u, v]| [u, v, s, t]).collect())
                    .collect()),
                None => Ok(Vec::new()),
            },
            (SurfaceKind::Bilinear, SurfaceKind::Plane) => match downcast_plane(b) {
                Some(p) => Ok(plane_patch(p, a, config)),
                None => Ok(Vec::new()),
            },
            (SurfaceKind::Bilinear, SurfaceKind::Bilinear) => Err(BooleanError::Unsupported(
                "intersection of two bilinear patches".into(),
            )),
        }
    }
}

// =============================================================================
// Downcasting helpers (safe via as_any())
// =============================================================================

fn downcast_plane(s: &dyn Surface) -> Option<&Plane> {
    s.as_any().downcast_ref::<Plane>()
}

// =============================================================================
// Plane-Plane intersection
// =============================================================================

/// Intersection of two planes, clipped to both parameter domains.
///
/// - Parallel (or coincident) → no chain
/// - Otherwise → a two-point chain along `n1 × n2`
fn plane_plane(a: &Plane, b: &Plane, config: &BooleanConfig) -> Option<Chain> {
    let n1 = a.normal_dir.into_inner();
    let n2 = b.normal_dir.into_inner();

    let dir = n1.cross(&n2);
    if dir.norm() < 1e-12 {
        return None;
    }

    // Point on both planes closest to the origin: p = c1 n1 + c2 n2.
    let d1 = n1.dot(&a.origin.coords);
    let d2 = n2.dot(&b.origin.coords);
    let n1n2 = n1.dot(&n2);
    let det = 1.0 - n1n2 * n1n2;
    let c1 = (d1 - d2 * n1n2) / det;
    let c2 = (d2 - d1 * n1n2) / det;
    let origin = Point3::from(c1 * n1 + c2 * n2);

    // uv(t) is affine in t on both planes; clip t against both domains.
    let uv_a = |t: f64| a.project(&(origin + t * dir));
    let uv_b = |t: f64| b.project(&(origin + t * dir));
    let mut range = (f64::NEG_INFINITY, f64::INFINITY);
    for (uv, domain) in [
        (&uv_a as &dyn Fn(f64) -> Point2, a.domain()),
        (&uv_b as &dyn Fn(f64) -> Point2, b.domain()),
    ] {
        let p0 = uv(0.0);
        let dp = uv(1.0) - p0;
        let ((u0, u1), (v0, v1)) = domain;
        for (x, dx, lo, hi) in [(p0.x, dp.x, u0, u1), (p0.y, dp.y, v0, v1)] {
            if dx.abs() < 1e-15 {
                if x < lo - config.numeric_tolerance || x > hi + config.numeric_tolerance {
                    return None;
                }
                continue;
            }
            let (ta, tb) = ((lo - x) / dx, (hi - x) / dx);
            range.0 = range.0.max(ta.min(tb));
            range.1 = range.1.min(ta.max(tb));
        }
    }
    let (t0, t1) = range;
    if !(t1 - t0 > config.numeric_tolerance) {
        return None;
    }

    Some(
        [t0, t1]
            .into_iter()
            .map(|t| {
                let (pa, pb) = (uv_a(t), uv_b(t));
                [pa.x, pa.y, pb.x, pb.y]
            })
            .collect(),
    )
}

// =============================================================================
// Plane-patch intersection by marching squares
// =============================================================================

/// A grid edge: `U(i, j)` joins nodes `(i, j)` and `(i + 1, j)`,
/// `V(i, j)` joins `(i, j)` and `(i, j + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GridEdge {
    U(usize, usize),
    V(usize, usize),
}

/// Chains `(u_patch, v_patch, u_plane, v_plane)` where a plane cuts a patch.
///
/// The sign of the plane distance is sampled on a grid over the patch
/// domain with cells no larger than `subdiv_tolerance` (in parameter
/// units), crossings are refined by bisection to `numeric_tolerance`, and
/// cell segments are chained through their shared grid edges.
fn plane_patch(plane: &Plane, patch: &dyn Surface, config: &BooleanConfig) -> Vec<Chain> {
    let ((u0, u1), (v0, v1)) = patch.domain();
    let steps = |lo: f64, hi: f64| ((hi - lo) / config.subdiv_tolerance).ceil().clamp(4.0, 512.0) as usize;
    let (nu, nv) = (steps(u0, u1), steps(v0, v1));
    let node = |i: usize, j: usize| {
        Point2::new(
            u0 + (u1 - u0) * i as f64 / nu as f64,
            v0 + (v1 - v0) * j as f64 / nv as f64,
        )
    };
    let f = |uv: Point2| plane.signed_distance(&patch.evaluate(uv));

    let mut values = vec![vec![0.0; nv + 1]; nu + 1];
    for (i, column) in values.iter_mut().enumerate() {
        for (j, value) in column.iter_mut().enumerate() {
            *value = f(node(i, j));
        }
    }
    let positive = |i: usize, j: usize| values[i][j] >= 0.0;
    let ends = |e: GridEdge| match e {
        GridEdge::U(i, j) => ((i, j), (i + 1, j)),
        GridEdge::V(i, j) => ((i, j), (i, j + 1)),
    };
    let crosses = |e: GridEdge| {
        let ((ia, ja), (ib, jb)) = ends(e);
        positive(ia, ja) != positive(ib, jb)
    };

    let mut links: Vec<(GridEdge, GridEdge)> = Vec::new();
    for i in 0..nu {
        for j in 0..nv {
            let edges = [
                GridEdge::U(i, j),
                GridEdge::V(i + 1, j),
                GridEdge::U(i, j + 1),
                GridEdge::V(i, j),
            ];
            let hit: Vec<GridEdge> = edges.iter().copied().filter(|&e| crosses(e)).collect();
            match hit.len() {
                2 => links.push((hit[0], hit[1])),
                4 => {
                    let center = f(Point2::from((node(i, j).coords + node(i + 1, j + 1).coords) * 0.5));
                    if (center >= 0.0) == positive(i, j) {
                        links.push((edges[0], edges[1]));
                        links.push((edges[2], edges[3]));
                    } else {
                        links.push((edges[0], edges[3]));
                        links.push((edges[1], edges[2]));
                    }
                }
                _ => {}
            }
        }
    }

    let mut crossing_at: HashMap<GridEdge, Point2> = HashMap::new();
    let mut crossing = |e: GridEdge| -> Point2 {
        *crossing_at.entry(e).or_insert_with(|| {
            let ((ia, ja), (ib, jb)) = ends(e);
            bisect(&f, node(ia, ja), node(ib, jb), config.numeric_tolerance)
        })
    };

    let inside = |uv: Point2| {
        let on_plane = plane.project(&patch.evaluate(uv));
        domain_contains(&plane.domain(), &on_plane, config.numeric_tolerance)
    };
    let point = |uv: Point2| {
        let on_plane = plane.project(&patch.evaluate(uv));
        [uv.x, uv.y, on_plane.x, on_plane.y]
    };

    // Runs leaving or entering the plane's domain are closed off at the
    // domain boundary, between the last crossing inside and the first outside.
    let mut chains = Vec::new();
    for edges in chain_links(&links) {
        let mut run: Chain = Vec::new();
        let mut prev: Option<(Point2, bool)> = None;
        for e in edges {
            let uv = crossing(e);
            let here = inside(uv);
            if let Some((last, was)) = prev {
                if was != here {
                    let (a, b) = if was { (last, uv) } else { (uv, last) };
                    let edge = point(bisect_boundary(&inside, a, b, config.numeric_tolerance));
                    push_distinct(&mut run, edge, config.numeric_tolerance);
                    if was && run.len() >= 2 {
                        chains.push(std::mem::take(&mut run));
                    } else if was {
                        run.clear();
                    }
                }
            }
            if here {
                push_distinct(&mut run, point(uv), config.numeric_tolerance);
            }
            prev = Some((uv, here));
        }
        if run.len() >= 2 {
            chains.push(run);
        }
    }
    chains
}

/// Last point inside along `a..b`, where `inside(a)` holds and `inside(b)`
/// does not.
fn bisect_boundary(inside: &impl Fn(Point2) -> bool, a: Point2, b: Point2, tol: f64) -> Point2 {
    let (mut lo, mut hi) = (a, b);
    for _ in 0..60 {
        if (hi - lo).norm() < tol {
            break;
        }
        let mid = Point2::from((lo.coords + hi.coords) * 0.5);
        if inside(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Append `p`, replacing the last point instead when the two coincide.
fn push_distinct(run: &mut Chain, p: [f64; 4], tol: f64) {
    if let Some(last) = run.last_mut() {
        if (last[0] - p[0]).hypot(last[1] - p[1]) < tol {
            *last = p;
            return;
        }
    }
    run.push(p);
}

/// Root of `f` on the segment `a..b`, where `f` changes sign.
fn bisect(f: &impl Fn(Point2) -> f64, a: Point2, b: Point2, tol: f64) -> Point2 {
    let (mut lo, mut hi) = (a, b);
    let lo_positive = f(lo) >= 0.0;
    for _ in 0..60 {
        if (hi - lo).norm() < tol {
            break;
        }
        let mid = Point2::from((lo.coords + hi.coords) * 0.5);
        if (f(mid) >= 0.0) == lo_positive {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Point2::from((lo.coords + hi.coords) * 0.5)
}

/// Join cell segments sharing a grid edge into ordered edge sequences.
/// A closed sequence repeats its first edge at the end.
fn chain_links(links: &[(GridEdge, GridEdge)]) -> Vec<Vec<GridEdge>> {
    let mut by_edge: HashMap<GridEdge, Vec<usize>> = HashMap::new();
    for (k, (a, b)) in links.iter().enumerate() {
        by_edge.entry(*a).or_default().push(k);
        by_edge.entry(*b).or_default().push(k);
    }
    let mut used = vec![false; links.len()];
    let mut out = Vec::new();

    for start in 0..links.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (first, second) = links[start];
        let mut forward = vec![first, second];
        extend(&mut forward, &by_edge, links, &mut used);
        if forward.first() != forward.last() {
            let mut backward = vec![first];
            extend(&mut backward, &by_edge, links, &mut used);
            backward.reverse();
            backward.pop();
            backward.extend(forward);
            forward = backward;
        }
        out.push(forward);
    }
    out
}

fn extend(
    seq: &mut Vec<GridEdge>,
    by_edge: &HashMap<GridEdge, Vec<usize>>,
    links: &[(GridEdge, GridEdge)],
    used: &mut [bool],
) {
    while let Some(&tip) = seq.last() {
        let next = by_edge
            .get(&tip)
            .and_then(|ks| ks.iter().copied().find(|&k| !used[k]));
        let Some(k) = next else {
            break;
        };
        used[k] = true;
        let (a, b) = links[k];
        seq.push(if a == tip { b } else { a });
        if seq.first() == seq.last() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tsolid_kernel_geom::BilinearSurface;
    use tsolid_kernel_math::Vec3;

    fn config() -> BooleanConfig {
        BooleanConfig::default()
    }

    #[test]
    fn test_plane_plane_perpendicular() {
        let xy = Plane::xy().with_domain((0.0, 1.0), (0.0, 1.0));
        let xz = Plane::new(Point3::origin(), Vec3::x(), Vec3::z()).with_domain((0.0, 2.0), (-1.0, 1.0));
        let chain = plane_plane(&xy, &xz, &config()).unwrap();
        assert_eq!(chain.len(), 2);
        for p in &chain {
            assert_relative_eq!(p[1], 0.0, epsilon = 1e-12);
            assert_relative_eq!(p[3], 0.0, epsilon = 1e-12);
            assert_relative_eq!(p[0], p[2], epsilon = 1e-12);
        }
        let (lo, hi) = (chain[0][0].min(chain[1][0]), chain[0][0].max(chain[1][0]));
        assert_relative_eq!(lo, 0.0, epsilon = 1e-12);
        assert_relative_eq!(hi, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_plane_plane_parallel() {
        let a = Plane::xy();
        let b = Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::x(), Vec3::y());
        assert!(plane_plane(&a, &b, &config()).is_none());
    }

    #[test]
    fn test_plane_plane_outside_domain() {
        let a = Plane::xy().with_domain((0.0, 1.0), (0.0, 1.0));
        let b = Plane::new(Point3::new(2.0, 0.0, 0.0), Vec3::y(), Vec3::z());
        assert!(plane_plane(&a, &b, &config()).is_none());
    }

    #[test]
    fn test_plane_cuts_saddle() {
        // z = u v over the unit square; z = 0.25 is a hyperbola arc.
        let saddle = BilinearSurface::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        );
        let plane = Plane::new(Point3::new(0.0, 0.0, 0.25), Vec3::x(), Vec3::y());
        let chains = AnalyticIntersector.intersect(&plane, &saddle, &config()).unwrap();
        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        assert!(chain.len() > 10);
        for p in chain {
            assert_relative_eq!(p[2] * p[3], 0.25, epsilon = 1e-6);
            // On the plane, (u, v) is (x, y) of the patch point.
            assert_relative_eq!(p[0], p[2], epsilon = 1e-9);
            assert_relative_eq!(p[1], p[3], epsilon = 1e-9);
        }
        // Both ends lie on the patch boundary.
        for p in [chain[0], chain[chain.len() - 1]] {
            let on_edge = [p[2], p[3]].iter().any(|c| (c - 1.0).abs() < 1e-9);
            assert!(on_edge);
        }
    }

    #[test]
    fn test_patch_chain_is_closed_off_at_the_plane_domain() {
        // A bounded vertical strip x = c, y in [0.2, 0.6], z in [0, 1],
        // cutting the saddle z = u v along the line (c, v, c v).
        let c = 0.4537;
        let saddle = BilinearSurface::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        );
        let strip = Plane::new(Point3::new(c, 0.0, 0.0), Vec3::y(), Vec3::z())
            .with_domain((0.2, 0.6), (0.0, 1.0));
        let chains = AnalyticIntersector.intersect(&strip, &saddle, &config()).unwrap();
        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        assert!(chain.len() > 10);

        // Plane (u, v) is (y, z); patch (u, v) is (x, y).
        for p in chain {
            assert_relative_eq!(p[2], c, epsilon = 1e-8);
            assert_relative_eq!(p[0], p[3], epsilon = 1e-8);
            assert_relative_eq!(p[1], c * p[3], epsilon = 1e-8);
        }
        let (first, last) = (chain[0], chain[chain.len() - 1]);
        assert_relative_eq!(first[0].min(last[0]), 0.2, epsilon = 1e-8);
        assert_relative_eq!(first[0].max(last[0]), 0.6, epsilon = 1e-8);
    }

    #[test]
    fn test_plane_misses_patch() {
        let patch = BilinearSurface::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        );
        let plane = Plane::new(Point3::new(0.0, 0.0, 2.0), Vec3::x(), Vec3::y());
        let chains = AnalyticIntersector.intersect(&patch, &plane, &config()).unwrap();
        assert!(chains.is_empty());
    }

    #[test]
    fn test_curved_pair_is_unsupported() {
        let patch = BilinearSurface::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        );
        let err = AnalyticIntersector
            .intersect(&patch, &patch.clone(), &config())
            .unwrap_err();
        assert!(matches!(err, BooleanError::Unsupported(_)));
    }

    #[test]
    fn test_chain_links_closed_ring() {
        let e = [
            GridEdge::U(0, 0),
            GridEdge::V(1, 0),
            GridEdge::U(0, 1),
            GridEdge::V(0, 0),
        ];
        let links = vec![(e[0], e[1]), (e[2], e[3]), (e[1], e[2]), (e[3], e[0])];
        let seqs = chain_links(&links);
        assert_eq!(seqs.len(), 1);
        assert_eq!(seqs[0].len(), 5);
        assert_eq!(seqs[0].first(), seqs[0].last());
    }
}
