//! Structural edits: splitting segments with reference surgery, rigid
//! transforms, and moving one model's entities into another.

use slotmap::SecondaryMap;
use tsolid_kernel_geom::{SplitFlags, SplitOutcome};
use tsolid_kernel_math::Transform;

use crate::{Input, Model, Result, SegRef, SegRefId, SegmentId, SurfaceId, TopologyError};

/// Outcome of [`Model::split_segment`].
#[derive(Debug, Clone)]
pub struct SegmentSplit {
    /// The pieces in parameter order. The first is the original segment id.
    pub chain: Vec<SegmentId>,
    /// Proximity conditions met while splitting.
    pub flags: SplitFlags,
    /// One outcome per requested parameter.
    pub outcomes: Vec<SplitOutcome>,
}

impl SegmentSplit {
    /// Whether the segment was actually cut.
    pub fn was_cut(&self) -> bool {
        self.chain.len() > 1
    }
}

/// Key translation produced by [`Model::absorb`].
#[derive(Debug, Clone, Default)]
pub struct Absorbed {
    /// Absorbed model's surface key to the key in the receiving model.
    pub surfaces: SecondaryMap<SurfaceId, SurfaceId>,
    /// Absorbed model's segment key to the key in the receiving model.
    pub segments: SecondaryMap<SegmentId, SegmentId>,
}

impl Model {
    /// Split a segment at parameters measured on its `side` UV curve.
    ///
    /// The original segment keeps the first piece and new segments are
    /// created for the rest. Every UV image and the cached model-space
    /// curve are cut at the same parameters. Every reference to the
    /// segment, on either surface, is expanded into a run of references
    /// covering the pieces in traversal order; linked references are
    /// spliced into their loop in place.
    pub fn split_segment(
        &mut self,
        id: SegmentId,
        side: usize,
        params: &[f64],
        min_gap: f64,
    ) -> Result<SegmentSplit> {
        let segment = self.segment(id)?.clone();
        let curve = segment.uv[side]
            .as_ref()
            .ok_or(TopologyError::InvalidReference { kind: "segment side" })?;
        let split = curve.subdivide(params, min_gap);
        if split.pieces.len() < 2 {
            return Ok(SegmentSplit {
                chain: vec![id],
                flags: split.flags,
                outcomes: split.outcomes,
            });
        }

        let mut chain = Vec::with_capacity(split.pieces.len());
        for (k, piece) in split.pieces.iter().enumerate() {
            let (a, b) = piece.domain();
            let mut part = segment.clone();
            for (s, uv) in part.uv.iter_mut().enumerate() {
                *uv = if s == side {
                    Some(piece.clone())
                } else {
                    segment.uv[s].as_ref().and_then(|c| c.region(a, b))
                };
            }
            part.euclidean = segment.euclidean.as_ref().and_then(|c| c.region(a, b));
            if k == 0 {
                *self.segment_mut(id)? = part;
                chain.push(id);
            } else {
                chain.push(self.segments.insert(part));
            }
        }

        for r in self.refs_to_segment(id) {
            self.expand_ref(r, &chain)?;
        }

        Ok(SegmentSplit {
            chain,
            flags: split.flags,
            outcomes: split.outcomes,
        })
    }

    /// Replace a reference to the first piece of `chain` by one reference
    /// per piece, and return them in traversal order.
    fn expand_ref(&mut self, id: SegRefId, chain: &[SegmentId]) -> Result<Vec<SegRefId>> {
        let proto = *self.seg_ref(id)?;
        let ordered: Vec<SegmentId> = if proto.reversed {
            chain.iter().rev().copied().collect()
        } else {
            chain.to_vec()
        };
        self.seg_ref_mut(id)?.segment = ordered[0];
        let mut run = vec![id];
        for &segment in &ordered[1..] {
            let prev = run[run.len() - 1];
            let next = self.seg_ref(prev)?.next;
            let new_id = self.seg_refs.insert(SegRef {
                segment,
                next,
                ..proto
            });
            if next.is_some() {
                self.seg_ref_mut(prev)?.next = Some(new_id);
            }
            run.push(new_id);
        }
        Ok(run)
    }

    /// Apply a transform to every surface and cached curve.
    ///
    /// A mirroring transform flips every surface's orientation so the
    /// material side is preserved.
    pub fn transform(&mut self, t: &Transform) {
        let mirror = t.is_mirroring();
        for (_, s) in self.surfaces.iter_mut() {
            s.surface = s.surface.transform(t);
            if mirror {
                s.orientation = s.orientation.flipped();
            }
        }
        for (_, seg) in self.segments.iter_mut() {
            if let Some(c) = seg.euclidean.as_mut() {
                *c = c.map(|p| t.apply_point(p));
            }
        }
    }

    /// Tag every surface with `input`.
    pub fn set_input(&mut self, input: Input) {
        for (_, s) in self.surfaces.iter_mut() {
            s.input = input;
        }
    }

    /// Move every entity of `other` into this model, tagging its surfaces
    /// with `input`.
    pub fn absorb(&mut self, other: Model, input: Input) -> Result<Absorbed> {
        let mut map = Absorbed::default();
        let mut refs: SecondaryMap<SegRefId, SegRefId> = SecondaryMap::new();

        for (old, s) in &other.surfaces {
            let mut s = s.clone();
            s.loops.clear();
            s.input = input;
            map.surfaces.insert(old, self.surfaces.insert(s));
        }
        for (old, seg) in &other.segments {
            let mut seg = seg.clone();
            for slot in seg.surfaces.iter_mut() {
                *slot = match *slot {
                    Some(s) => Some(*map.surfaces.get(s).ok_or_else(TopologyError::surface)?),
                    None => None,
                };
            }
            map.segments.insert(old, self.segments.insert(seg));
        }
        for (old, r) in &other.seg_refs {
            let new = SegRef {
                segment: *map.segments.get(r.segment).ok_or_else(TopologyError::segment)?,
                surface: *map.surfaces.get(r.surface).ok_or_else(TopologyError::surface)?,
                next: None,
                ..*r
            };
            refs.insert(old, self.seg_refs.insert(new));
        }
        for (old, r) in &other.seg_refs {
            if let Some(next) = r.next {
                let next = *refs.get(next).ok_or_else(TopologyError::seg_ref)?;
                self.seg_ref_mut(refs[old])?.next = Some(next);
            }
        }
        for (old, s) in &other.surfaces {
            let surface = map.surfaces[old];
            for &lp in &s.loops {
                let first = other.trim_loop(lp)?.first;
                let first = *refs.get(first).ok_or_else(TopologyError::seg_ref)?;
                let id = self.loops.insert(crate::Loop { first, surface });
                self.surface_mut(surface)?.loops.push(id);
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::unit_square;
    use crate::{Orientation, TrimSegment};
    use approx::assert_relative_eq;
    use tsolid_kernel_geom::{CurveEnd, Plane, SpaceCurve, UvCurve};
    use tsolid_kernel_math::{Point2, Point3};

    #[test]
    fn test_split_forward_ref_keeps_order() {
        let (mut model, s, segs) = unit_square();
        let split = model.split_segment(segs[0], 0, &[0.25, 0.75], 1e-6).unwrap();
        assert_eq!(split.chain.len(), 3);
        assert_eq!(split.chain[0], segs[0]);

        let lp = model.surface(s).unwrap().loops[0];
        let refs = model.loop_refs(lp).unwrap();
        assert_eq!(refs.len(), 6);
        for w in refs.windows(2) {
            let (_, end) = model.ref_endpoints(w[0]).unwrap();
            let (start, _) = model.ref_endpoints(w[1]).unwrap();
            assert_relative_eq!(end, start, epsilon = 1e-12);
        }
        model.validate(1e-9).unwrap();
    }

    #[test]
    fn test_split_reversed_ref_keeps_order() {
        let (mut model, s, segs) = unit_square();
        let lp = model.surface(s).unwrap().loops[0];
        let first = model.loop_refs(lp).unwrap()[0];
        // Store the bottom edge backward and traverse it reversed.
        let flipped = model.segment(segs[0]).unwrap().uv[0].as_ref().unwrap().reverse();
        model.segment_mut(segs[0]).unwrap().uv[0] = Some(flipped);
        model.seg_ref_mut(first).unwrap().reversed = true;

        model.split_segment(segs[0], 0, &[0.5], 1e-6).unwrap();
        let refs = model.loop_refs(lp).unwrap();
        assert_eq!(refs.len(), 5);
        assert_relative_eq!(
            model.ref_point(refs[0], CurveEnd::Start).unwrap(),
            Point2::new(0.0, 0.0)
        );
        assert_relative_eq!(
            model.ref_point(refs[0], CurveEnd::End).unwrap(),
            Point2::new(0.5, 0.0)
        );
        assert_relative_eq!(
            model.ref_point(refs[1], CurveEnd::End).unwrap(),
            Point2::new(1.0, 0.0)
        );
        model.validate(1e-9).unwrap();
    }

    #[test]
    fn test_split_cuts_every_image_at_same_parameter() {
        let mut model = Model::new();
        let a = model.add_surface(Box::new(Plane::xy()), Input::Input1);
        let b = model.add_surface(Box::new(Plane::xy()), Input::Input2);
        let seg = model.add_segment(
            TrimSegment::shared(
                a,
                UvCurve::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)),
                b,
                UvCurve::line(Point2::new(0.0, 0.0), Point2::new(0.0, 2.0)),
            )
            .with_euclidean(SpaceCurve::line(Point3::origin(), Point3::new(4.0, 0.0, 0.0))),
        );
        let r = model.new_ref(seg, b, true);
        let split = model.split_segment(seg, 0, &[0.25, 1e-9], 1e-6).unwrap();
        assert_eq!(split.outcomes, vec![SplitOutcome::Cut(1), SplitOutcome::AtStart]);
        let second = model.segment(split.chain[1]).unwrap();
        assert_relative_eq!(second.uv[1].as_ref().unwrap().start(), Point2::new(0.0, 0.5));
        assert_relative_eq!(
            second.euclidean.as_ref().unwrap().start(),
            Point3::new(1.0, 0.0, 0.0)
        );
        // An unlinked reversed reference gains a sibling but stays unlinked.
        assert_eq!(model.seg_ref(r).unwrap().segment, split.chain[1]);
        assert_eq!(model.seg_refs.len(), 2);
        assert!(model.seg_refs.values().all(|x| x.next.is_none()));
    }

    #[test]
    fn test_split_refused_near_ends() {
        let (mut model, _, segs) = unit_square();
        let split = model.split_segment(segs[1], 0, &[1e-9, 1.0], 1e-6).unwrap();
        assert!(!split.was_cut());
        assert_eq!(split.flags, SplitFlags::NEAR_START | SplitFlags::NEAR_END);
        assert_eq!(model.segments.len(), 4);
    }

    #[test]
    fn test_absorb_remaps_keys() {
        let (mut first, _, _) = unit_square();
        let (second, s2, _) = unit_square();
        let map = first.absorb(second, Input::Input2).unwrap();
        assert_eq!(first.surfaces.len(), 2);
        assert_eq!(first.segments.len(), 8);
        let moved = map.surfaces[s2];
        assert_eq!(first.surface(moved).unwrap().input, Input::Input2);
        assert_eq!(first.surface_refs(moved).unwrap().len(), 4);
        first.validate(1e-9).unwrap();
    }

    #[test]
    fn test_mirror_transform_flips_orientation() {
        let (mut model, s, _) = unit_square();
        model.transform(&Transform::scale(-1.0, 1.0, 1.0));
        assert_eq!(model.surface(s).unwrap().orientation, Orientation::Reversed);
        let n = model.surface(s).unwrap().outward_normal(Point2::new(0.5, 0.5));
        assert_relative_eq!(n.z, 1.0);
    }
}
