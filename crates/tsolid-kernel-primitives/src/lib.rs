#![warn(missing_docs)]

//! Planar trimmed-surface primitives for the tsolid kernel.
//!
//! Builds closed (or open) polyhedral models where every face is a
//! [`Plane`] patch trimmed by one loop, and every edge between two faces
//! is a single shared [`TrimSegment`].

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tsolid_kernel_geom::{Plane, SpaceCurve, Surface, UvCurve};
use tsolid_kernel_math::{Point2, Point3, Vec3};
use tsolid_kernel_topo::{
    Classification, Input, Loop, Model, SegRef, SegRefId, SegmentId, SurfaceId, TrimSegment,
};

/// Errors from polyhedron construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrimitiveError {
    /// A face names a vertex that does not exist.
    #[error("face {face} references vertex {index}, but only {count} vertices exist")]
    VertexIndex {
        /// Face index.
        face: usize,
        /// Offending vertex index.
        index: usize,
        /// Number of vertices.
        count: usize,
    },

    /// A face with fewer than three vertices, or zero area.
    #[error("face {0} is degenerate")]
    DegenerateFace(usize),

    /// An edge used by more than two faces, or twice in the same direction.
    #[error("edge ({0}, {1}) is not manifold")]
    NonManifoldEdge(usize, usize),
}

/// Build a planar trimmed model from vertices and faces.
///
/// Each face lists vertex indices counter-clockwise when viewed from
/// outside; the face normal is taken from that winding (Newell's method).
/// Edges used by two faces become shared segments, edges used once become
/// boundary segments.
pub fn polyhedron(vertices: &[Point3], faces: &[Vec<usize>]) -> Result<Model, PrimitiveError> {
    let mut edge_dirs: HashMap<(usize, usize), usize> = HashMap::new();
    for (fi, face) in faces.iter().enumerate() {
        if face.len() < 3 {
            return Err(PrimitiveError::DegenerateFace(fi));
        }
        for &index in face {
            if index >= vertices.len() {
                return Err(PrimitiveError::VertexIndex {
                    face: fi,
                    index,
                    count: vertices.len(),
                });
            }
        }
        if face_frame(vertices, face).is_none() {
            return Err(PrimitiveError::DegenerateFace(fi));
        }
        for k in 0..face.len() {
            let (a, b) = (face[k], face[(k + 1) % face.len()]);
            let key = (a.min(b), a.max(b));
            let uses = edge_dirs.entry(key).or_insert(0);
            *uses += 1;
            if *uses > 2 {
                return Err(PrimitiveError::NonManifoldEdge(key.0, key.1));
            }
        }
    }
    // A directed edge may appear only once.
    let mut directed: HashSet<(usize, usize)> = HashSet::new();
    for face in faces {
        for k in 0..face.len() {
            let (a, b) = (face[k], face[(k + 1) % face.len()]);
            if !directed.insert((a, b)) {
                return Err(PrimitiveError::NonManifoldEdge(a.min(b), a.max(b)));
            }
        }
    }
    Ok(build(vertices, faces))
}

/// Build an axis-aligned box with one corner at the origin and dimensions `(sx, sy, sz)`.
///
/// Vertex layout:
/// ```text
///     v4----v5
///    /|    /|
///   v7----v6|    z
///   | v0--|-v1   | y
///   |/    |/     |/
///   v3----v2     +---x
/// ```
pub fn make_box(sx: f64, sy: f64, sz: f64) -> Model {
    let vertices = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(sx, 0.0, 0.0),
        Point3::new(sx, sy, 0.0),
        Point3::new(0.0, sy, 0.0),
        Point3::new(0.0, 0.0, sz),
        Point3::new(sx, 0.0, sz),
        Point3::new(sx, sy, sz),
        Point3::new(0.0, sy, sz),
    ];
    let faces = [
        vec![0, 3, 2, 1], // bottom, -Z
        vec![4, 5, 6, 7], // top, +Z
        vec![0, 1, 5, 4], // front, -Y
        vec![2, 3, 7, 6], // back, +Y
        vec![0, 4, 7, 3], // left, -X
        vec![1, 2, 6, 5], // right, +X
    ];
    build(&vertices, &faces)
}

/// Face frame `(origin, x_axis, normal)`, or `None` if the face is degenerate.
fn face_frame(vertices: &[Point3], face: &[usize]) -> Option<(Point3, Vec3, Vec3)> {
    let mut n = Vec3::zeros();
    for k in 0..face.len() {
        let p = vertices[face[k]];
        let q = vertices[face[(k + 1) % face.len()]];
        n.x += (p.y - q.y) * (p.z + q.z);
        n.y += (p.z - q.z) * (p.x + q.x);
        n.z += (p.x - q.x) * (p.y + q.y);
    }
    let origin = vertices[face[0]];
    let x = vertices[face[1]] - origin;
    if n.norm() < 1e-12 || x.norm() < 1e-12 {
        return None;
    }
    Some((origin, x.normalize(), n.normalize()))
}

/// Assemble a model from validated input.
fn build(vertices: &[Point3], faces: &[Vec<usize>]) -> Model {
    let mut model = Model::new();
    let mut edges: HashMap<(usize, usize), (SegmentId, usize)> = HashMap::new();

    for face in faces {
        let Some((origin, x_axis, normal)) = face_frame(vertices, face) else {
            continue;
        };
        let plane = Plane::new(origin, x_axis, normal.cross(&x_axis));
        let uv: Vec<Point2> = face.iter().map(|&i| plane.project(&vertices[i])).collect();
        let (lo, hi) = uv
            .iter()
            .fold((uv[0], uv[0]), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
        let plane = plane.with_domain((lo.x, hi.x), (lo.y, hi.y));
        let surface = model.add_surface(Box::new(plane), Input::Input1);

        let mut refs = Vec::with_capacity(face.len());
        for k in 0..face.len() {
            let (a, b) = (face[k], face[(k + 1) % face.len()]);
            let (ua, ub) = (uv[k], uv[(k + 1) % face.len()]);
            let key = (a.min(b), a.max(b));
            let (segment, reversed) = match edges.get(&key) {
                Some(&(segment, from)) => {
                    let curve = if from == a {
                        UvCurve::line(ua, ub)
                    } else {
                        UvCurve::line(ub, ua)
                    };
                    let seg = &mut model.segments[segment];
                    seg.surfaces[1] = Some(surface);
                    seg.uv[1] = Some(curve);
                    (segment, from != a)
                }
                None => {
                    let seg = TrimSegment::boundary(surface, UvCurve::line(ua, ub))
                        .with_euclidean(SpaceCurve::line(vertices[a], vertices[b]));
                    let segment = model.add_segment(seg);
                    edges.insert(key, (segment, a));
                    (segment, false)
                }
            };
            refs.push(model.seg_refs.insert(SegRef {
                segment,
                surface,
                reversed,
                class: Classification::Unknown,
                next: None,
            }));
        }
        link(&mut model, surface, &refs);
    }
    model
}

fn link(model: &mut Model, surface: SurfaceId, refs: &[SegRefId]) {
    for (i, &r) in refs.iter().enumerate() {
        model.seg_refs[r].next = Some(refs[(i + 1) % refs.len()]);
    }
    let lp = model.loops.insert(Loop {
        first: refs[0],
        surface,
    });
    model.surfaces[surface].loops.push(lp);
}

/// Centroid of the model-space images of a surface's trimming curves.
///
/// Handy for orienting tests and picking faces by position.
pub fn surface_centroid(model: &Model, surface: SurfaceId) -> Option<Point3> {
    let s = model.surfaces.get(surface)?;
    let refs = model.surface_refs(surface).ok()?;
    if refs.is_empty() {
        return None;
    }
    let mut acc = Vec3::zeros();
    for &r in &refs {
        let uv = model.ref_raw_curve(r).ok()?.midpoint();
        acc += s.surface.evaluate(uv).coords;
    }
    Some(Point3::from(acc / refs.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_topology() {
        let model = make_box(1.0, 2.0, 3.0);
        let counts = model.counts();
        assert_eq!(counts.surfaces, 6);
        assert_eq!(counts.loops, 6);
        assert_eq!(counts.segments, 12);
        assert_eq!(counts.seg_refs, 24);
        model.validate(1e-12).unwrap();
        assert!(model.segments.values().all(TrimSegment::is_shared));
    }

    #[test]
    fn test_box_normals_point_outward() {
        let model = make_box(1.0, 2.0, 3.0);
        let center = Point3::new(0.5, 1.0, 1.5);
        for (id, s) in &model.surfaces {
            let c = surface_centroid(&model, id).unwrap();
            let ((u0, u1), (v0, v1)) = s.surface.domain();
            let uv = Point2::new(0.5 * (u0 + u1), 0.5 * (v0 + v1));
            let n = s.outward_normal(uv);
            assert!(n.dot(&(c - center)) > 0.0);
        }
    }

    #[test]
    fn test_shared_edges_agree_in_3d() {
        let model = make_box(2.0, 1.0, 1.0);
        for seg in model.segments.values() {
            let (s0, s1) = (seg.surfaces[0].unwrap(), seg.surfaces[1].unwrap());
            let (c0, c1) = (seg.uv[0].as_ref().unwrap(), seg.uv[1].as_ref().unwrap());
            for t in [0.0, 0.3, 1.0] {
                let p0 = model.surfaces[s0].surface.evaluate(c0.evaluate(t));
                let p1 = model.surfaces[s1].surface.evaluate(c1.evaluate(t));
                let pe = seg.euclidean.as_ref().unwrap().evaluate(t);
                assert_relative_eq!(p0, p1, epsilon = 1e-12);
                assert_relative_eq!(p0, pe, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_face_domain_matches_face() {
        let model = make_box(1.0, 1.0, 1.0);
        for s in model.surfaces.values() {
            let ((u0, u1), (v0, v1)) = s.surface.domain();
            assert_relative_eq!(u1 - u0, 1.0, epsilon = 1e-12);
            assert_relative_eq!(v1 - v0, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tetrahedron() {
        let vertices = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![0, 3, 2]];
        let model = polyhedron(&vertices, &faces).unwrap();
        assert_eq!(model.counts().segments, 6);
        model.validate(1e-12).unwrap();
    }

    #[test]
    fn test_open_sheet_has_boundary_edges() {
        let vertices = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let model = polyhedron(&vertices, &[vec![0, 1, 2, 3]]).unwrap();
        assert!(model.segments.values().all(|s| !s.is_shared()));
        model.validate(1e-12).unwrap();
    }

    #[test]
    fn test_polyhedron_errors() {
        let vertices = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert_eq!(
            polyhedron(&vertices, &[vec![0, 1, 7]]).unwrap_err(),
            PrimitiveError::VertexIndex {
                face: 0,
                index: 7,
                count: 3
            }
        );
        assert_eq!(
            polyhedron(&vertices, &[vec![0, 1, 2]]).unwrap_err(),
            PrimitiveError::DegenerateFace(0)
        );
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        assert_eq!(
            polyhedron(&square, &[vec![0, 1, 2], vec![0, 1, 2]]).unwrap_err(),
            PrimitiveError::NonManifoldEdge(0, 1)
        );
    }
}
