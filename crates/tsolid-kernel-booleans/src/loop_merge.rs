//! Rebuilding closed trimming loops from the kept references.

use tsolid_kernel_geom::CurveEnd;
use tsolid_kernel_math::{midpoint, Point2};
use tsolid_kernel_topo::{LoopId, Model, SegRefId, SurfaceId};

use crate::classify::RefLists;
use crate::config::BooleanConfig;
use crate::error::{BooleanError, Result};
use crate::matching::ends_near;

/// Chain every surface's kept references into closed loops.
///
/// A reference whose curve closes on itself forms a loop alone. Otherwise
/// the walk repeatedly picks the reference with the nearest matching end,
/// traversing it forward or backward accordingly, until the chain returns
/// to its start. Each finished loop has its junctions averaged so it
/// closes exactly.
pub(crate) fn rebuild_loops(model: &mut Model, lists: RefLists, config: &BooleanConfig) -> Result<()> {
    for (s, mut pool) in lists {
        if !model.surfaces.contains_key(s) {
            continue;
        }
        while !pool.is_empty() {
            let first = pool.remove(0);
            let chain = walk(model, s, first, &mut pool, config)?;
            let lp = model.link_loop(s, &chain)?;
            close_junctions(model, lp)?;
        }
        debug_bool!("surface {s:?}: {} loops", model.surface(s)?.loops.len());
    }
    Ok(())
}

/// Follow matching end points from `first` back to its start.
fn walk(
    model: &mut Model,
    s: SurfaceId,
    first: SegRefId,
    pool: &mut Vec<SegRefId>,
    config: &BooleanConfig,
) -> Result<Vec<SegRefId>> {
    let start = model.ref_point(first, CurveEnd::Start)?;
    let mut end = model.ref_point(first, CurveEnd::End)?;
    let mut chain = vec![first];

    'walk: loop {
        for tol in config.widening_tolerances() {
            if (end - start).norm() <= tol {
                break 'walk;
            }
            if let Some(m) = ends_near(model, pool, None, end, tol)?.first().copied() {
                if tol > config.match_tolerance {
                    log::warn!(
                        "loop on surface {s:?} continued at widened tolerance {tol:e}"
                    );
                }
                pool.retain(|&r| r != m.seg_ref);
                // Traverse from the matching end.
                model.seg_ref_mut(m.seg_ref)?.reversed = m.end == CurveEnd::End;
                end = model.ref_point(m.seg_ref, CurveEnd::End)?;
                chain.push(m.seg_ref);
                continue 'walk;
            }
        }
        return Err(BooleanError::EndpointMatch {
            surface: s,
            uv: end,
            tolerance: config.match_tolerance_ceiling,
        });
    }
    Ok(chain)
}

/// Move each pair of adjoining end points (including the wrap-around) to
/// their mean, so the loop closes exactly.
pub(crate) fn close_junctions(model: &mut Model, lp: LoopId) -> Result<()> {
    let refs = model.loop_refs(lp)?;
    for (i, &a) in refs.iter().enumerate() {
        let b = refs[(i + 1) % refs.len()];
        let pa: Point2 = model.ref_point(a, CurveEnd::End)?;
        let pb = model.ref_point(b, CurveEnd::Start)?;
        let mean = midpoint(&pa, &pb);
        model.set_ref_point(a, CurveEnd::End, mean)?;
        model.set_ref_point(b, CurveEnd::Start, mean)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsolid_kernel_geom::{Plane, UvCurve};
    use tsolid_kernel_topo::{Input, TrimSegment};

    /// Unlinked references on one surface, one per `(from, to)` curve.
    fn pieces(curves: &[((f64, f64), (f64, f64))]) -> (Model, SurfaceId, Vec<SegRefId>) {
        let mut model = Model::new();
        let s = model.add_surface(Box::new(Plane::xy()), Input::Input1);
        let refs = curves
            .iter()
            .map(|&(a, b)| {
                let g = model.add_segment(TrimSegment::boundary(
                    s,
                    UvCurve::line(Point2::new(a.0, a.1), Point2::new(b.0, b.1)),
                ));
                model.new_ref(g, s, false)
            })
            .collect();
        (model, s, refs)
    }

    #[test]
    fn test_mixed_directions_close() {
        // A square whose edges are stored in arbitrary directions, with a
        // small gap at one corner.
        let (mut model, s, refs) = pieces(&[
            ((0.0, 0.0), (1.0, 0.0)),
            ((1.0, 1.0), (1.0, 0.0)),
            ((0.0, 1.0), (0.0, 3e-7)),
            ((1.0, 1.0), (0.0, 1.0)),
        ]);
        let mut lists = RefLists::new();
        lists.insert(s, refs.clone());
        rebuild_loops(&mut model, lists, &BooleanConfig::default()).unwrap();

        assert_eq!(model.loops.len(), 1);
        let lp = model.surface(s).unwrap().loops[0];
        let order = model.loop_refs(lp).unwrap();
        assert_eq!(order, vec![refs[0], refs[1], refs[3], refs[2]]);
        assert!(model.seg_ref(refs[1]).unwrap().reversed);
        assert!(!model.seg_ref(refs[3]).unwrap().reversed);
        model.validate(0.0).unwrap();
        // The gap was split evenly.
        assert_eq!(
            model.ref_point(refs[0], CurveEnd::Start).unwrap(),
            Point2::new(0.0, 1.5e-7)
        );
    }

    #[test]
    fn test_closed_curve_is_its_own_loop() {
        let mut model = Model::new();
        let s = model.add_surface(Box::new(Plane::xy()), Input::Input1);
        let ring = UvCurve::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.0, 0.0),
        ])
        .unwrap();
        let g = model.add_segment(TrimSegment::boundary(s, ring));
        let r = model.new_ref(g, s, false);
        let mut lists = RefLists::new();
        lists.insert(s, vec![r]);
        rebuild_loops(&mut model, lists, &BooleanConfig::default()).unwrap();
        let lp = model.surface(s).unwrap().loops[0];
        assert_eq!(model.loop_refs(lp).unwrap(), vec![r]);
    }

    #[test]
    fn test_open_chain_fails() {
        let (mut model, s, refs) = pieces(&[((0.0, 0.0), (1.0, 0.0)), ((1.0, 0.0), (1.0, 1.0))]);
        let mut lists = RefLists::new();
        lists.insert(s, refs);
        let err = rebuild_loops(&mut model, lists, &BooleanConfig::default()).unwrap_err();
        assert!(matches!(err, BooleanError::EndpointMatch { surface, .. } if surface == s));
    }
}
