//! Structural invariants and summary counts.

use slotmap::SecondaryMap;
use tsolid_kernel_geom::CurveEnd;

use crate::{Model, Result, SegmentId, SurfaceId, TopologyError};

/// Entity totals of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelCounts {
    /// Trimmed surfaces.
    pub surfaces: usize,
    /// Trimming loops.
    pub loops: usize,
    /// Trimming segments.
    pub segments: usize,
    /// Segment references.
    pub seg_refs: usize,
}

impl Model {
    /// Entity totals.
    pub fn counts(&self) -> ModelCounts {
        ModelCounts {
            surfaces: self.surfaces.len(),
            loops: self.loops.len(),
            segments: self.segments.len(),
            seg_refs: self.seg_refs.len(),
        }
    }

    /// Check the structural invariants of the store.
    ///
    /// - every loop closes in UV within `tol`, in at most as many steps as
    ///   it has references, and only holds references of its own surface
    /// - every segment has an owning surface
    /// - every attached surface references the segment exactly once
    pub fn validate(&self, tol: f64) -> Result<()> {
        let mut uses: SecondaryMap<SegmentId, Vec<SurfaceId>> = SecondaryMap::new();

        for (sid, surface) in &self.surfaces {
            for &lp in &surface.loops {
                if self.trim_loop(lp)?.surface != sid {
                    return Err(TopologyError::trim_loop());
                }
                let refs = self.loop_refs(lp)?;
                for (i, &r) in refs.iter().enumerate() {
                    let seg_ref = self.seg_ref(r)?;
                    if seg_ref.surface != sid {
                        return Err(TopologyError::ForeignReference(r));
                    }
                    self.ref_side(r)?;
                    let end = self.ref_point(r, CurveEnd::End)?;
                    let next = self.ref_point(refs[(i + 1) % refs.len()], CurveEnd::Start)?;
                    if (end - next).norm() > tol {
                        return Err(TopologyError::LoopNotClosed(lp));
                    }
                    match uses.get_mut(seg_ref.segment) {
                        Some(v) => v.push(sid),
                        None => {
                            uses.insert(seg_ref.segment, vec![sid]);
                        }
                    }
                }
            }
        }

        for (gid, seg) in &self.segments {
            if seg.surfaces.iter().all(Option::is_none) {
                return Err(TopologyError::OrphanSegment(gid));
            }
            let users = uses.get(gid).map(Vec::as_slice).unwrap_or(&[]);
            for surface in seg.surfaces.iter().flatten() {
                let found = users.iter().filter(|s| *s == surface).count();
                if found != 1 {
                    return Err(TopologyError::ReferenceCount {
                        segment: gid,
                        surface: *surface,
                        found,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::unit_square;
    use crate::{Input, TrimSegment};
    use tsolid_kernel_geom::{Plane, UvCurve};
    use tsolid_kernel_math::Point2;

    #[test]
    fn test_counts() {
        let (model, _, _) = unit_square();
        assert_eq!(
            model.counts(),
            ModelCounts {
                surfaces: 1,
                loops: 1,
                segments: 4,
                seg_refs: 4
            }
        );
    }

    #[test]
    fn test_gap_in_loop_is_reported() {
        let (mut model, s, segs) = unit_square();
        let lp = model.surface(s).unwrap().loops[0];
        model.segment_mut(segs[1]).unwrap().uv[0] = Some(UvCurve::line(
            Point2::new(1.0, 0.1),
            Point2::new(1.0, 1.0),
        ));
        assert_eq!(model.validate(1e-6), Err(TopologyError::LoopNotClosed(lp)));
    }

    #[test]
    fn test_unreferenced_side_is_reported() {
        let (mut model, _, segs) = unit_square();
        let other = model.add_surface(Box::new(Plane::xy()), Input::Input2);
        let seg = model.segment_mut(segs[2]).unwrap();
        seg.surfaces[1] = Some(other);
        seg.uv[1] = seg.uv[0].clone();
        assert_eq!(
            model.validate(1e-6),
            Err(TopologyError::ReferenceCount {
                segment: segs[2],
                surface: other,
                found: 0
            })
        );
    }

    #[test]
    fn test_orphan_segment_is_reported() {
        let (mut model, _, _) = unit_square();
        let orphan = model.add_segment(TrimSegment::default());
        assert_eq!(model.validate(1e-6), Err(TopologyError::OrphanSegment(orphan)));
    }
}
