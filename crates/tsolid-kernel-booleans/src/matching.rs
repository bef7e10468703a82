//! End-point matching between segment references of one surface.
//!
//! Both the classifier and the loop merger need "which references start or
//! end here", with the tolerance widened step by step when nothing is
//! found at the base value.

use tsolid_kernel_geom::CurveEnd;
use tsolid_kernel_math::Point2;
use tsolid_kernel_topo::{Model, SegRefId};

use crate::config::BooleanConfig;
use crate::error::Result;

/// A reference whose stored curve has an end at the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EndMatch {
    /// The matching reference.
    pub seg_ref: SegRefId,
    /// Which end of the stored (unreversed) curve matched.
    pub end: CurveEnd,
    /// UV distance from the query point.
    pub distance: f64,
}

/// Ends of `refs` within `tol` of `p`, nearest first, skipping `skip`.
///
/// A closed curve touching `p` with both ends is reported once.
pub(crate) fn ends_near(
    model: &Model,
    refs: &[SegRefId],
    skip: Option<SegRefId>,
    p: Point2,
    tol: f64,
) -> Result<Vec<EndMatch>> {
    let mut out = Vec::new();
    for &r in refs {
        if Some(r) == skip {
            continue;
        }
        let curve = model.ref_raw_curve(r)?;
        let best = [CurveEnd::Start, CurveEnd::End]
            .into_iter()
            .map(|end| (end, (curve.end_point(end) - p).norm()))
            .filter(|&(_, d)| d <= tol)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((end, distance)) = best {
            out.push(EndMatch {
                seg_ref: r,
                end,
                distance,
            });
        }
    }
    out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Ok(out)
}

/// [`ends_near`] at the base matching tolerance, widened ×10 per step up
/// to the ceiling until at least one end matches.
///
/// Returns the matches with the tolerance that produced them, or `None`
/// if nothing matched even at the ceiling.
pub(crate) fn ends_near_widening(
    model: &Model,
    refs: &[SegRefId],
    skip: Option<SegRefId>,
    p: Point2,
    config: &BooleanConfig,
) -> Result<Option<(Vec<EndMatch>, f64)>> {
    for tol in config.widening_tolerances() {
        let found = ends_near(model, refs, skip, p, tol)?;
        if !found.is_empty() {
            if tol > config.match_tolerance {
                log::warn!(
                    "end point ({:.6}, {:.6}) matched only at widened tolerance {tol:e}",
                    p.x,
                    p.y
                );
            }
            return Ok(Some((found, tol)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsolid_kernel_geom::{Plane, UvCurve};
    use tsolid_kernel_topo::{Input, TrimSegment};

    fn fan() -> (Model, Vec<SegRefId>) {
        let mut model = Model::new();
        let s = model.add_surface(Box::new(Plane::xy()), Input::Input1);
        let mut refs = Vec::new();
        for (a, b) in [
            ((0.0, 0.0), (1.0, 0.0)),
            ((0.0, 1.0), (0.0, 0.0)),
            ((1.0, 1.0), (0.0, 3e-5)),
            ((5.0, 5.0), (6.0, 6.0)),
        ] {
            let seg = model.add_segment(TrimSegment::boundary(
                s,
                UvCurve::line(Point2::new(a.0, a.1), Point2::new(b.0, b.1)),
            ));
            refs.push(model.new_ref(seg, s, false));
        }
        (model, refs)
    }

    #[test]
    fn test_ends_near_reports_matching_end() {
        let (model, refs) = fan();
        let found = ends_near(&model, &refs, None, Point2::origin(), 1e-6).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].seg_ref, refs[0]);
        assert_eq!(found[0].end, CurveEnd::Start);
        assert_eq!(found[1].seg_ref, refs[1]);
        assert_eq!(found[1].end, CurveEnd::End);

        let skipped = ends_near(&model, &refs, Some(refs[0]), Point2::origin(), 1e-6).unwrap();
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_widening_stops_at_first_hit() {
        let (model, refs) = fan();
        let config = BooleanConfig::default();
        let query = Point2::new(0.0, 3e-5);
        let (found, tol) = ends_near_widening(&model, &refs[2..], None, query, &config)
            .unwrap()
            .unwrap();
        assert_eq!(tol, 1e-6);
        assert_eq!(found.len(), 1);

        let (found, tol) = ends_near_widening(&model, &refs[..2], None, query, &config)
            .unwrap()
            .unwrap();
        assert!((tol - 1e-4).abs() < 1e-18);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_widening_gives_up_at_ceiling() {
        let (model, refs) = fan();
        let config = BooleanConfig::default();
        let far = Point2::new(3.0, 3.0);
        assert!(ends_near_widening(&model, &refs, None, far, &config)
            .unwrap()
            .is_none());
    }
}
