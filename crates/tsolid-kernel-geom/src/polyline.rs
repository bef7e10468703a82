//! Piecewise-linear parametric curves.
//!
//! Trimming curves in the parameter plane ([`UvCurve`]) and their cached
//! model-space images ([`SpaceCurve`]) are both polylines with an explicit,
//! strictly increasing parameter per vertex. Keeping the parameter explicit
//! means the two UV images of a shared trimming segment can be split at the
//! same parameter and still describe the same 3D pieces.

use bitflags::bitflags;
use tsolid_kernel_math::{Point2, PointN};

/// A polyline in a surface's parameter plane.
pub type UvCurve = Polyline<2>;

/// A polyline in model space.
pub type SpaceCurve = Polyline<3>;

bitflags! {
    /// Proximity conditions reported by [`Polyline::subdivide`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SplitFlags: u8 {
        /// A requested parameter was too close to the curve start and was dropped.
        const NEAR_START = 0b001;
        /// A requested parameter was too close to the curve end and was dropped.
        const NEAR_END = 0b010;
        /// Two requested parameters were too close to each other and were merged.
        const NEAR_EACH_OTHER = 0b100;
    }
}

/// What happened to one requested split parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOutcome {
    /// The curve was cut here; the value is the index of the piece starting at the cut.
    Cut(usize),
    /// Too close to the start; the first piece starts at the curve start.
    AtStart,
    /// Too close to the end; the last piece ends at the curve end.
    AtEnd,
    /// Merged into an earlier cut; the value is the index of the piece starting there.
    Merged(usize),
}

/// Result of [`Polyline::subdivide`].
#[derive(Debug, Clone)]
pub struct Split<const D: usize> {
    /// Pieces in parameter order. Always at least one.
    pub pieces: Vec<Polyline<D>>,
    /// Union of the proximity conditions met.
    pub flags: SplitFlags,
    /// One outcome per requested parameter, in request order.
    pub outcomes: Vec<SplitOutcome>,
}

/// Which end of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveEnd {
    /// Lowest parameter.
    Start,
    /// Highest parameter.
    End,
}

impl CurveEnd {
    /// The other end.
    pub fn opposite(self) -> Self {
        match self {
            CurveEnd::Start => CurveEnd::End,
            CurveEnd::End => CurveEnd::Start,
        }
    }
}

/// A piecewise-linear curve with explicit vertex parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline<const D: usize> {
    points: Vec<PointN<D>>,
    params: Vec<f64>,
}

impl<const D: usize> Polyline<D> {
    /// Create a polyline from vertices and their parameters.
    ///
    /// Returns `None` unless there are at least two vertices, one parameter
    /// per vertex, and the parameters are strictly increasing.
    pub fn new(points: Vec<PointN<D>>, params: Vec<f64>) -> Option<Self> {
        if points.len() < 2 || points.len() != params.len() {
            return None;
        }
        if params.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        Some(Self { points, params })
    }

    /// Create a polyline parametrized by vertex index (`0, 1, 2, ...`).
    pub fn from_points(points: Vec<PointN<D>>) -> Option<Self> {
        let params = (0..points.len()).map(|i| i as f64).collect();
        Self::new(points, params)
    }

    /// A single straight segment over `[0, 1]`.
    pub fn line(a: PointN<D>, b: PointN<D>) -> Self {
        Self {
            points: vec![a, b],
            params: vec![0.0, 1.0],
        }
    }

    /// Vertices in parameter order.
    pub fn points(&self) -> &[PointN<D>] {
        &self.points
    }

    /// Vertex parameters.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Parameter domain `(t_min, t_max)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.params[0], self.params[self.params.len() - 1])
    }

    /// First vertex.
    pub fn start(&self) -> PointN<D> {
        self.points[0]
    }

    /// Last vertex.
    pub fn end(&self) -> PointN<D> {
        self.points[self.points.len() - 1]
    }

    /// Vertex at the given end.
    pub fn end_point(&self, end: CurveEnd) -> PointN<D> {
        match end {
            CurveEnd::Start => self.start(),
            CurveEnd::End => self.end(),
        }
    }

    /// Overwrite the vertex at the given end.
    pub fn set_end_point(&mut self, end: CurveEnd, p: PointN<D>) {
        let idx = match end {
            CurveEnd::Start => 0,
            CurveEnd::End => self.points.len() - 1,
        };
        self.points[idx] = p;
    }

    /// Whether both ends coincide within `tol`.
    pub fn is_closed(&self, tol: f64) -> bool {
        (self.start() - self.end()).norm() < tol
    }

    /// Whether every coordinate and parameter is finite.
    pub fn is_finite(&self) -> bool {
        self.params.iter().all(|t| t.is_finite())
            && self
                .points
                .iter()
                .all(|p| p.coords.iter().all(|c| c.is_finite()))
    }

    /// Index `i` of the linear span with `params[i] <= t <= params[i + 1]`.
    fn span(&self, t: f64) -> usize {
        let i = self.params.partition_point(|&p| p <= t);
        i.saturating_sub(1).min(self.params.len() - 2)
    }

    /// Evaluate at parameter `t` (clamped to the domain).
    pub fn evaluate(&self, t: f64) -> PointN<D> {
        let (t0, t1) = self.domain();
        let t = t.clamp(t0, t1);
        let i = self.span(t);
        let f = (t - self.params[i]) / (self.params[i + 1] - self.params[i]);
        self.points[i] + (self.points[i + 1] - self.points[i]) * f
    }

    /// Cumulative arc length at each vertex.
    fn arc_lengths(&self) -> Vec<f64> {
        let mut acc = 0.0;
        let mut out = Vec::with_capacity(self.points.len());
        out.push(0.0);
        for w in self.points.windows(2) {
            acc += (w[1] - w[0]).norm();
            out.push(acc);
        }
        out
    }

    /// Total arc length.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    /// Arc length from the start to parameter `t`.
    pub fn arc_length_at(&self, t: f64) -> f64 {
        let (t0, t1) = self.domain();
        let t = t.clamp(t0, t1);
        let i = self.span(t);
        self.arc_lengths()[i] + (self.evaluate(t) - self.points[i]).norm()
    }

    /// Parameter at arc length `s` from the start (clamped to the curve).
    pub fn param_at_arc_length(&self, s: f64) -> f64 {
        let cum = self.arc_lengths();
        let total = cum[cum.len() - 1];
        let s = s.clamp(0.0, total);
        for i in 0..self.points.len() - 1 {
            if s <= cum[i + 1] {
                let seg = cum[i + 1] - cum[i];
                if seg <= 0.0 {
                    return self.params[i];
                }
                let f = (s - cum[i]) / seg;
                return self.params[i] + f * (self.params[i + 1] - self.params[i]);
            }
        }
        self.domain().1
    }

    /// Parameter at arc distance `d` from the given end, moving inward.
    pub fn param_at_distance_from(&self, end: CurveEnd, d: f64) -> f64 {
        match end {
            CurveEnd::Start => self.param_at_arc_length(d),
            CurveEnd::End => self.param_at_arc_length(self.length() - d),
        }
    }

    /// Parameter at half the arc length.
    pub fn mid_param(&self) -> f64 {
        self.param_at_arc_length(0.5 * self.length())
    }

    /// Point at half the arc length.
    pub fn midpoint(&self) -> PointN<D> {
        self.evaluate(self.mid_param())
    }

    /// The same curve traversed backward, over the same domain.
    pub fn reverse(&self) -> Self {
        let (t0, t1) = self.domain();
        Self {
            points: self.points.iter().rev().copied().collect(),
            params: self.params.iter().rev().map(|t| t0 + t1 - t).collect(),
        }
    }

    /// The same points, linearly reparametrized onto `[t0, t1]`.
    ///
    /// Returns `None` unless `t0 < t1`.
    pub fn reparametrized(&self, t0: f64, t1: f64) -> Option<Self> {
        if !(t0 < t1) {
            return None;
        }
        let (a, b) = self.domain();
        let scale = (t1 - t0) / (b - a);
        let params = self.params.iter().map(|t| t0 + (t - a) * scale).collect();
        Self::new(self.points.clone(), params)
    }

    /// The sub-curve over `[ta, tb]`, or `None` if the range is empty.
    pub fn region(&self, ta: f64, tb: f64) -> Option<Self> {
        let (t0, t1) = self.domain();
        let (ta, tb) = (ta.clamp(t0, t1), tb.clamp(t0, t1));
        if tb <= ta {
            return None;
        }
        Some(self.slice(ta, tb))
    }

    /// Sub-curve over `[ta, tb]`; requires `ta < tb` inside the domain.
    fn slice(&self, ta: f64, tb: f64) -> Self {
        let mut points = vec![self.evaluate(ta)];
        let mut params = vec![ta];
        for (p, &t) in self.points.iter().zip(&self.params) {
            if t > ta && t < tb {
                points.push(*p);
                params.push(t);
            }
        }
        points.push(self.evaluate(tb));
        params.push(tb);
        Self { points, params }
    }

    /// Split the curve at a list of parameters.
    ///
    /// Parameters closer than `min_gap` (arc length) to either end, or to a
    /// previously accepted cut, are not honored; the returned flags and
    /// per-parameter outcomes report why.
    pub fn subdivide(&self, params: &[f64], min_gap: f64) -> Split<D> {
        let total = self.length();
        let mut order: Vec<(usize, f64, f64)> = params
            .iter()
            .enumerate()
            .map(|(k, &t)| (k, t, self.arc_length_at(t)))
            .collect();
        order.sort_by(|a, b| a.2.total_cmp(&b.2));

        let mut flags = SplitFlags::empty();
        let mut outcomes = vec![SplitOutcome::AtStart; params.len()];
        let mut cuts: Vec<(f64, f64)> = Vec::new();
        for (k, t, s) in order {
            outcomes[k] = if s < min_gap {
                flags |= SplitFlags::NEAR_START;
                SplitOutcome::AtStart
            } else if total - s < min_gap {
                flags |= SplitFlags::NEAR_END;
                SplitOutcome::AtEnd
            } else if cuts.last().is_some_and(|&(_, prev)| s - prev < min_gap) {
                flags |= SplitFlags::NEAR_EACH_OTHER;
                SplitOutcome::Merged(cuts.len())
            } else {
                cuts.push((t, s));
                SplitOutcome::Cut(cuts.len())
            };
        }

        let (t0, t1) = self.domain();
        let bounds: Vec<f64> = std::iter::once(t0)
            .chain(cuts.iter().map(|&(t, _)| t))
            .chain(std::iter::once(t1))
            .collect();
        let pieces = if cuts.is_empty() {
            vec![self.clone()]
        } else {
            bounds.windows(2).map(|w| self.slice(w[0], w[1])).collect()
        };

        Split {
            pieces,
            flags,
            outcomes,
        }
    }

    /// Map every vertex through `f`, keeping the parameters.
    pub fn map<const E: usize>(&self, f: impl Fn(&PointN<D>) -> PointN<E>) -> Polyline<E> {
        Polyline {
            points: self.points.iter().map(f).collect(),
            params: self.params.clone(),
        }
    }

    /// Component-wise bounding box `(min, max)`.
    pub fn bounds(&self) -> (PointN<D>, PointN<D>) {
        let first = self.points[0];
        self.points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p)))
    }

    /// Evenly spaced (by arc length) interior samples, excluding both ends.
    pub fn interior_samples(&self, count: usize) -> Vec<(f64, PointN<D>)> {
        let total = self.length();
        (1..=count)
            .map(|k| {
                let t = self.param_at_arc_length(total * k as f64 / (count + 1) as f64);
                (t, self.evaluate(t))
            })
            .collect()
    }
}

fn cross(a: &tsolid_kernel_math::Vec2, b: &tsolid_kernel_math::Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

impl Polyline<2> {
    /// Whether vertex `i` is a sharp corner: the direction turns by more
    /// than `angle` radians there. The ends of an open curve are never
    /// corners; the shared end vertex of a closed curve can be.
    pub fn is_corner_vertex(&self, i: usize, angle: f64) -> bool {
        let n = self.points.len();
        let (prev, next) = if i == 0 || i == n - 1 {
            if n < 3 || !self.is_closed(1e-12) {
                return false;
            }
            (self.points[n - 2], self.points[1])
        } else {
            (self.points[i - 1], self.points[i + 1])
        };
        let d_in = self.points[i] - prev;
        let d_out = next - self.points[i];
        let (l_in, l_out) = (d_in.norm(), d_out.norm());
        if l_in < 1e-15 || l_out < 1e-15 {
            return false;
        }
        (d_in.dot(&d_out) / (l_in * l_out)).clamp(-1.0, 1.0).acos() > angle
    }

    /// Whether a sharp corner lies within `radius` of `uv`.
    pub fn corner_near(&self, uv: &Point2, radius: f64, angle: f64) -> bool {
        (0..self.points.len())
            .any(|i| (self.points[i] - uv).norm() <= radius && self.is_corner_vertex(i, angle))
    }

    /// Planar intersections with `other`, as `(t_self, t_other)` pairs
    /// sorted by `t_self`. Touching within `tol` counts, and collinear
    /// overlaps report both ends of the overlap.
    pub fn intersect(&self, other: &UvCurve, tol: f64) -> Vec<(f64, f64)> {
        let mut hits: Vec<(f64, f64)> = Vec::new();
        for i in 0..self.points.len() - 1 {
            let (a0, a1) = (self.points[i], self.points[i + 1]);
            let r = a1 - a0;
            let r_len = r.norm();
            if r_len < 1e-15 {
                continue;
            }
            for j in 0..other.points.len() - 1 {
                let (b0, b1) = (other.points[j], other.points[j + 1]);
                let s = b1 - b0;
                let s_len = s.norm();
                if s_len < 1e-15 {
                    continue;
                }
                let qp = b0 - a0;
                let denom = cross(&r, &s);
                let mut local: Vec<(f64, f64)> = Vec::new();
                if denom.abs() > 1e-12 * r_len * s_len {
                    let u = cross(&qp, &s) / denom;
                    let w = cross(&qp, &r) / denom;
                    let (tu, tw) = (tol / r_len, tol / s_len);
                    if u >= -tu && u <= 1.0 + tu && w >= -tw && w <= 1.0 + tw {
                        local.push((u.clamp(0.0, 1.0), w.clamp(0.0, 1.0)));
                    }
                } else if cross(&qp, &r).abs() / r_len < tol {
                    let r2 = r_len * r_len;
                    let p0 = qp.dot(&r) / r2;
                    let p1 = (b1 - a0).dot(&r) / r2;
                    let lo = p0.min(p1).max(0.0);
                    let hi = p0.max(p1).min(1.0);
                    if hi >= lo - tol / r_len {
                        for u in [lo.min(hi), hi.max(lo)] {
                            let p = a0 + r * u;
                            let w = ((p - b0).dot(&s) / (s_len * s_len)).clamp(0.0, 1.0);
                            local.push((u, w));
                        }
                    }
                }
                for (u, w) in local {
                    let ta = self.params[i] + u * (self.params[i + 1] - self.params[i]);
                    let tb = other.params[j] + w * (other.params[j + 1] - other.params[j]);
                    hits.push((ta, tb));
                }
            }
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut out: Vec<(f64, f64)> = Vec::with_capacity(hits.len());
        for hit in hits {
            let duplicate = out
                .last()
                .is_some_and(|last| (self.evaluate(last.0) - self.evaluate(hit.0)).norm() < tol);
            if !duplicate {
                out.push(hit);
            }
        }
        out
    }

    /// Number of times a ray from `p` toward `+u` crosses this curve
    /// (half-open rule on vertices).
    pub fn crossings(&self, p: &Point2) -> usize {
        self.points
            .windows(2)
            .filter(|w| {
                let (a, b) = (w[0], w[1]);
                if (a.y > p.y) == (b.y > p.y) {
                    return false;
                }
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                p.x < x
            })
            .count()
    }
}

/// Even/odd point-in-region test against a set of closed trimming curves.
///
/// The curves need not be individually closed; only the union of all
/// curves has to form closed loops.
pub fn point_in_region<'a>(p: &Point2, curves: impl IntoIterator<Item = &'a UvCurve>) -> bool {
    curves.into_iter().map(|c| c.crossings(p)).sum::<usize>() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Vec<UvCurve> {
        let c = [
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ];
        (0..4).map(|i| UvCurve::line(c[i], c[(i + 1) % 4])).collect()
    }

    #[test]
    fn test_new_rejects_non_increasing_params() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(UvCurve::new(pts.clone(), vec![1.0, 1.0]).is_none());
        assert!(UvCurve::new(pts.clone(), vec![0.0]).is_none());
        assert!(UvCurve::new(pts, vec![0.0, 2.0]).is_some());
    }

    #[test]
    fn test_evaluate_and_arc_length() {
        let c = UvCurve::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 2.0),
        ])
        .unwrap();
        assert_relative_eq!(c.evaluate(1.5), Point2::new(1.0, 1.0));
        assert_relative_eq!(c.length(), 3.0);
        assert_relative_eq!(c.arc_length_at(1.5), 2.0);
        assert_relative_eq!(c.param_at_arc_length(2.0), 1.5);
        assert_relative_eq!(c.midpoint(), Point2::new(1.0, 0.5));
        assert_relative_eq!(c.param_at_distance_from(CurveEnd::End, 0.5), 1.75);
    }

    #[test]
    fn test_reverse_keeps_domain() {
        let c = UvCurve::new(
            vec![Point2::new(0.0, 0.0), Point2::new(2.0, 0.0)],
            vec![1.0, 3.0],
        )
        .unwrap();
        let r = c.reverse();
        assert_eq!(r.domain(), (1.0, 3.0));
        assert_eq!(r.start(), c.end());
        assert_relative_eq!(r.evaluate(1.5), c.evaluate(2.5));
    }

    #[test]
    fn test_subdivide_reports_proximity() {
        let c = UvCurve::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        let split = c.subdivide(&[0.5, 1e-9, 0.5 + 1e-9, 1.0], 1e-6);
        assert_eq!(split.pieces.len(), 2);
        assert_eq!(
            split.flags,
            SplitFlags::NEAR_START | SplitFlags::NEAR_END | SplitFlags::NEAR_EACH_OTHER
        );
        assert_eq!(split.outcomes[0], SplitOutcome::Cut(1));
        assert_eq!(split.outcomes[1], SplitOutcome::AtStart);
        assert_eq!(split.outcomes[2], SplitOutcome::Merged(1));
        assert_eq!(split.outcomes[3], SplitOutcome::AtEnd);
        assert_eq!(split.pieces[0].end(), split.pieces[1].start());
        assert_eq!(split.pieces[1].domain(), (0.5, 1.0));
    }

    #[test]
    fn test_subdivide_keeps_interior_vertices() {
        let c = UvCurve::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(3.0, 0.0),
        ])
        .unwrap();
        let split = c.subdivide(&[1.5], 1e-6);
        assert_eq!(split.pieces[0].points().len(), 3);
        assert_eq!(split.pieces[1].points().len(), 3);
    }

    #[test]
    fn test_intersect_crossing() {
        let a = UvCurve::line(Point2::new(0.0, 0.5), Point2::new(1.0, 0.5));
        let b = UvCurve::line(Point2::new(0.25, 0.0), Point2::new(0.25, 1.0));
        let hits = a.intersect(&b, 1e-9);
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].0, 0.25);
        assert_relative_eq!(hits[0].1, 0.5);
    }

    #[test]
    fn test_intersect_touching_endpoint() {
        let a = UvCurve::line(Point2::new(0.5, 0.0), Point2::new(0.5, 1.0));
        let edge = UvCurve::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        let hits = a.intersect(&edge, 1e-9);
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].0, 0.0);
        assert_relative_eq!(hits[0].1, 0.5);
    }

    #[test]
    fn test_intersect_dedupes_vertex_hits() {
        let a = UvCurve::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ])
        .unwrap();
        let b = UvCurve::line(Point2::new(1.0, -1.0), Point2::new(1.0, 1.0));
        assert_eq!(a.intersect(&b, 1e-9).len(), 1);
    }

    #[test]
    fn test_intersect_collinear_overlap() {
        let a = UvCurve::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        let b = UvCurve::line(Point2::new(0.5, 0.0), Point2::new(2.0, 0.0));
        let hits = a.intersect(&b, 1e-9);
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0].0, 0.5);
        assert_relative_eq!(hits[1].0, 1.0);
    }

    #[test]
    fn test_point_in_region_with_hole() {
        let mut curves = square(4.0);
        let hole: Vec<UvCurve> = square(2.0)
            .into_iter()
            .map(|c| c.map(|p| p + tsolid_kernel_math::Vec2::new(1.0, 1.0)))
            .collect();
        curves.extend(hole);
        assert!(point_in_region(&Point2::new(0.5, 0.5), &curves));
        assert!(!point_in_region(&Point2::new(2.0, 2.0), &curves));
        assert!(!point_in_region(&Point2::new(5.0, 2.0), &curves));
    }

    #[test]
    fn test_corners() {
        let c = UvCurve::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.0, 0.0),
        ])
        .unwrap();
        assert!(c.is_corner_vertex(1, 0.3));
        assert!(c.is_corner_vertex(0, 0.3));
        assert!(c.corner_near(&Point2::new(1.0, 1e-4), 1e-3, 0.3));
        assert!(!c.corner_near(&Point2::new(0.5, 0.0), 1e-3, 0.3));

        let straight = UvCurve::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.01),
        ])
        .unwrap();
        assert!(!straight.is_corner_vertex(1, 0.3));
        assert!(!straight.is_corner_vertex(0, 0.3));
    }

    #[test]
    fn test_region_and_interior_samples() {
        let c = UvCurve::line(Point2::new(0.0, 0.0), Point2::new(4.0, 0.0));
        let r = c.region(0.25, 0.75).unwrap();
        assert_relative_eq!(r.start(), Point2::new(1.0, 0.0));
        assert_relative_eq!(r.end(), Point2::new(3.0, 0.0));
        assert!(c.region(0.5, 0.5).is_none());
        let samples = c.interior_samples(3);
        assert_eq!(samples.len(), 3);
        assert_relative_eq!(samples[1].1, Point2::new(2.0, 0.0));
    }
}
