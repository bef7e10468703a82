//! Turning raw solver chains into shared trimming segments.

use tsolid_kernel_geom::{CurveEnd, Domain, SpaceCurve, UvCurve};
use tsolid_kernel_math::Point2;
use tsolid_kernel_topo::{Model, SegmentId, SegmentTags, SurfaceId, TrimSegment};

use crate::config::BooleanConfig;
use crate::error::{ensure_finite, BooleanError, Result};
use crate::ssi::Chain;

/// Solver output for one surface pair: `(first operand surface,
/// second operand surface, chains)`.
pub(crate) type PairChains = (SurfaceId, SurfaceId, Vec<Chain>);

/// Create one NEW segment per usable chain.
///
/// Slot 0 of every segment is the first-operand surface. Both UV curves
/// are parametrized by chain index, and the model-space curve is the first
/// UV curve evaluated on its surface. Chains with fewer than two points
/// are dropped.
pub(crate) fn build_segments(
    model: &mut Model,
    pairs: Vec<PairChains>,
    config: &BooleanConfig,
) -> Result<Vec<SegmentId>> {
    let mut created = Vec::new();
    for (sa, sb, chains) in pairs {
        let domain_a = model.surface(sa)?.surface.domain();
        let domain_b = model.surface(sb)?.surface.domain();
        for chain in chains {
            if chain.len() < 2 {
                log::warn!("dropping a single-point intersection chain");
                continue;
            }
            ensure_finite("intersection chain", chain.as_flattened())?;

            let uv_a: Vec<Point2> = chain.iter().map(|p| Point2::new(p[0], p[1])).collect();
            let uv_b: Vec<Point2> = chain.iter().map(|p| Point2::new(p[2], p[3])).collect();
            let (Some(mut uv_a), Some(mut uv_b)) =
                (UvCurve::from_points(uv_a), UvCurve::from_points(uv_b))
            else {
                continue;
            };
            snap_ends(&mut uv_a, &domain_a, config.snap_tolerance);
            snap_ends(&mut uv_b, &domain_b, config.snap_tolerance);

            let surface = &model.surface(sa)?.surface;
            let euclidean: SpaceCurve = uv_a.map(|uv| surface.evaluate(*uv));
            if !euclidean.is_finite() {
                return Err(BooleanError::FloatingPoint {
                    stage: "segment building",
                });
            }

            let mut segment = TrimSegment::shared(sa, uv_a, sb, uv_b).with_euclidean(euclidean);
            segment.tags = SegmentTags::NEW;
            created.push(model.add_segment(segment));
        }
    }
    debug_bool!("built {} new segments", created.len());
    Ok(created)
}

/// Close a curve whose ends nearly meet, or pull its end coordinates onto
/// the domain boundary when they lie within `snap` of it.
fn snap_ends(curve: &mut UvCurve, domain: &Domain, snap: f64) {
    if curve.is_closed(snap) {
        let start = curve.start();
        curve.set_end_point(CurveEnd::End, start);
        return;
    }
    let ((u0, u1), (v0, v1)) = *domain;
    let pull = |x: f64, lo: f64, hi: f64| {
        if (x - lo).abs() < snap {
            lo
        } else if (x - hi).abs() < snap {
            hi
        } else {
            x
        }
    };
    for end in [CurveEnd::Start, CurveEnd::End] {
        let p = curve.end_point(end);
        curve.set_end_point(end, Point2::new(pull(p.x, u0, u1), pull(p.y, v0, v1)));
    }
}
