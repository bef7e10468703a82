//! Final sweep over the rebuilt model.

use std::collections::HashSet;

use tsolid_kernel_topo::{LoopId, Model, SegRefId, SegmentId, SegmentTags, SurfaceId};

use crate::config::BooleanConfig;
use crate::error::Result;
use crate::loop_merge::close_junctions;

/// Purge everything no loop reaches, shrink each surface's domain to its
/// trimming curves, and make adjoining loop end points exactly equal.
pub(crate) fn cleanup(model: &mut Model, config: &BooleanConfig) -> Result<()> {
    sweep(model)?;
    clip_domains(model, config.domain_margin)?;
    let loops: Vec<LoopId> = model.loops.keys().collect();
    for lp in loops {
        close_junctions(model, lp)?;
    }
    for (_, seg) in model.segments.iter_mut() {
        seg.tags.remove(SegmentTags::NEW | SegmentTags::USED);
    }
    debug_bool!("cleanup: {:?}", model.counts());
    Ok(())
}

/// Mark and sweep from the surviving loops.
fn sweep(model: &mut Model) -> Result<()> {
    let mut live: HashSet<SegRefId> = HashSet::new();
    let mut empty: Vec<(SurfaceId, LoopId)> = Vec::new();
    for (lp, l) in &model.loops {
        // A loop whose entry reference is gone holds nothing.
        if !model.seg_refs.contains_key(l.first) {
            empty.push((l.surface, lp));
            continue;
        }
        live.extend(model.loop_refs(lp)?);
    }
    for (s, lp) in empty {
        model.loops.remove(lp);
        if let Ok(surface) = model.surface_mut(s) {
            surface.loops.retain(|&l| l != lp);
        }
    }

    for &r in &live {
        let segment = model.seg_ref(r)?.segment;
        model.segment_mut(segment)?.tags.insert(SegmentTags::USED);
    }
    model.seg_refs.retain(|id, _| live.contains(&id));

    let dead: Vec<SurfaceId> = model
        .surfaces
        .iter()
        .filter(|(_, s)| s.loops.is_empty())
        .map(|(id, _)| id)
        .collect();
    for s in dead {
        model.remove_surface(s);
    }
    model
        .segments
        .retain(|_, seg| seg.tags.contains(SegmentTags::USED));
    model.detach_dead_surfaces();

    // A surface may survive while no longer using a segment it shared.
    let used: HashSet<(SegmentId, SurfaceId)> = model
        .seg_refs
        .values()
        .map(|r| (r.segment, r.surface))
        .collect();
    for (id, seg) in model.segments.iter_mut() {
        for i in 0..2 {
            if seg.surfaces[i].is_some_and(|s| !used.contains(&(id, s))) {
                seg.surfaces[i] = None;
                seg.uv[i] = None;
            }
        }
        if seg.surfaces[0].is_none() {
            seg.surfaces.swap(0, 1);
            seg.uv.swap(0, 1);
        }
    }
    Ok(())
}

/// Restrict every domain to the UV bounds of its curves, padded by
/// `margin` times the original extent and never past the original.
fn clip_domains(model: &mut Model, margin: f64) -> Result<()> {
    let ids: Vec<SurfaceId> = model.surfaces.keys().collect();
    for s in ids {
        let Some((lo, hi)) = model.uv_bounds(s)? else {
            continue;
        };
        let surface = model.surface_mut(s)?;
        let (u, v) = surface.surface.domain();
        let u = clip(lo.x, hi.x, u, margin);
        let v = clip(lo.y, hi.y, v, margin);
        surface.surface = surface.surface.restrict(u, v);
    }
    Ok(())
}

fn clip(lo: f64, hi: f64, range: (f64, f64), margin: f64) -> (f64, f64) {
    let extent = range.1 - range.0;
    // Unbounded domains pad relative to the curves instead.
    let extent = if extent.is_finite() { extent } else { hi - lo };
    let pad = margin * extent;
    ((lo - pad).max(range.0), (hi + pad).min(range.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsolid_kernel_geom::{Plane, UvCurve};
    use tsolid_kernel_math::Point2;
    use tsolid_kernel_primitives::make_box;
    use tsolid_kernel_topo::{Input, TrimSegment};

    #[test]
    fn test_clip_pads_and_clamps() {
        let (a, b) = clip(0.2, 0.6, (0.0, 1.0), 0.1);
        assert!((a - 0.1).abs() < 1e-12 && (b - 0.7).abs() < 1e-12);
        assert_eq!(clip(0.0, 0.95, (0.0, 1.0), 0.1), (0.0, 1.0));
        let (a, b) = clip(1.0, 3.0, (f64::NEG_INFINITY, f64::INFINITY), 0.5);
        assert_eq!((a, b), (0.0, 4.0));
    }

    #[test]
    fn test_sweep_drops_unreachable() {
        let mut model = make_box(1.0, 1.0, 1.0);
        let before = model.counts();

        // A loose surface and a loose segment nothing links.
        let loose = model.add_surface(Box::new(Plane::xy()), Input::Input1);
        let g = model.add_segment(TrimSegment::boundary(
            loose,
            UvCurve::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)),
        ));
        model.new_ref(g, loose, false);

        // One face removed: its four edges become boundary edges.
        let face = model.surfaces.keys().next().unwrap();
        model.remove_surface(face);

        cleanup(&mut model, &BooleanConfig::default()).unwrap();
        let after = model.counts();
        assert_eq!(after.surfaces, before.surfaces - 1);
        assert_eq!(after.segments, before.segments);
        assert_eq!(after.seg_refs, before.seg_refs - 4);
        assert_eq!(
            model.segments.values().filter(|s| !s.is_shared()).count(),
            4
        );
        assert!(model.segments.values().all(|s| s.tags.is_empty()));
        model.validate(0.0).unwrap();
    }

    #[test]
    fn test_domain_shrinks_to_loop() {
        let mut model = Model::new();
        let s = model.add_surface(
            Box::new(Plane::xy().with_domain((0.0, 10.0), (0.0, 10.0))),
            Input::Input1,
        );
        let c = [
            Point2::new(2.0, 2.0),
            Point2::new(4.0, 2.0),
            Point2::new(4.0, 5.0),
            Point2::new(2.0, 5.0),
        ];
        let segs: Vec<_> = (0..4)
            .map(|i| {
                let g = model.add_segment(TrimSegment::boundary(s, UvCurve::line(c[i], c[(i + 1) % 4])));
                (g, false)
            })
            .collect();
        model.add_loop(s, &segs).unwrap();

        cleanup(&mut model, &BooleanConfig::default()).unwrap();
        let ((u0, u1), (v0, v1)) = model.surface(s).unwrap().surface.domain();
        assert!((u0 - 1.9).abs() < 1e-12 && (u1 - 4.1).abs() < 1e-12);
        assert!((v0 - 1.9).abs() < 1e-12 && (v1 - 5.1).abs() < 1e-12);
    }
}
