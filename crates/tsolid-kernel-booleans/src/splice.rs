//! Cutting new intersection curves and existing trimming curves at their
//! crossings, then dropping new pieces outside the trimmed regions.
//!
//! Runs in two passes: first against the loops of the first operand's
//! surfaces (segment slot 0), then against the second operand's (slot 1).
//! Pieces dropped in the first pass never reach the second.

use tsolid_kernel_geom::{domain_contains, point_in_region, CurveEnd, SplitOutcome};
use tsolid_kernel_math::Point2;
use tsolid_kernel_topo::{Model, SegmentId, SurfaceId, TopologyError};

use crate::config::BooleanConfig;
use crate::error::Result;

/// Segment ends meeting at one crossing, on one surface's side.
type Junction = Vec<(SegmentId, CurveEnd)>;

/// A crossing between the new curve and one old curve.
struct Crossing {
    /// Parameter on the new curve.
    t_new: f64,
    /// Old-side ends at the crossing, on the old segment's slot `old_side`.
    old: Junction,
    old_side: usize,
    /// Whether the old curve was actually cut here.
    old_cut: bool,
}

/// Splice every new segment into both operands and drop the pieces that
/// fall outside a trimmed region. Returns the surviving new segments.
pub(crate) fn splice_and_filter(
    model: &mut Model,
    new_segments: Vec<SegmentId>,
    config: &BooleanConfig,
) -> Result<Vec<SegmentId>> {
    let mut new = new_segments;
    for side in 0..2 {
        let mut kept = Vec::with_capacity(new.len());
        for n in new {
            let surface = model.segment(n)?.surfaces[side]
                .ok_or(TopologyError::InvalidReference { kind: "segment side" })?;
            for piece in splice_one(model, n, side, surface, config)? {
                if in_region(model, piece, side, surface)? {
                    kept.push(piece);
                } else {
                    debug_bool!("  dropping new piece {piece:?} outside surface {surface:?}");
                    model.segments.remove(piece);
                }
            }
        }
        debug_bool!("splice pass {side}: {} new pieces kept", kept.len());
        new = kept;
    }
    Ok(new)
}

/// Give every new segment one unlinked reference from each of its surfaces.
pub(crate) fn attach_refs(model: &mut Model, new_segments: &[SegmentId]) -> Result<()> {
    for &n in new_segments {
        let surfaces = model.segment(n)?.surfaces;
        for s in surfaces.into_iter().flatten() {
            model.new_ref(n, s, false);
        }
    }
    Ok(())
}

/// Cut new segment `n` and the old curves of `surface` at their crossings.
/// Returns the pieces of `n` in parameter order.
fn splice_one(
    model: &mut Model,
    n: SegmentId,
    side: usize,
    surface: SurfaceId,
    config: &BooleanConfig,
) -> Result<Vec<SegmentId>> {
    let curve_new = model
        .segment(n)?
        .uv[side]
        .clone()
        .ok_or(TopologyError::InvalidReference { kind: "segment side" })?;

    let mut olds: Vec<(SegmentId, usize)> = Vec::new();
    for r in model.surface_refs(surface)? {
        let entry = (model.seg_ref(r)?.segment, model.ref_side(r)?);
        if !olds.contains(&entry) {
            olds.push(entry);
        }
    }

    let mut crossings: Vec<Crossing> = Vec::new();
    for (old, old_side) in olds {
        let hits = {
            let curve_old = model.segment(old)?.uv[old_side]
                .as_ref()
                .ok_or(TopologyError::InvalidReference { kind: "segment side" })?;
            curve_new.intersect(curve_old, config.match_tolerance)
        };
        if hits.is_empty() {
            continue;
        }
        let params: Vec<f64> = hits.iter().map(|h| h.1).collect();
        let split = model.split_segment(old, old_side, &params, config.split_tolerance)?;
        for (&(t_new, _), &outcome) in hits.iter().zip(&split.outcomes) {
            crossings.push(Crossing {
                t_new,
                old: junction(&split.chain, outcome),
                old_side,
                old_cut: matches!(outcome, SplitOutcome::Cut(_)),
            });
        }
    }
    if crossings.is_empty() {
        return Ok(vec![n]);
    }

    let params: Vec<f64> = crossings.iter().map(|c| c.t_new).collect();
    let split = model.split_segment(n, side, &params, config.split_tolerance)?;
    if !split.flags.is_empty() {
        log::warn!("new segment {n:?}: splits refused near ends ({:?}), end points corrected", split.flags);
    }

    // Reconcile the two end points at each crossing. An old end that
    // refused the cut wins, then a new end that refused it; when both were
    // cut the old cut point wins.
    for (crossing, &outcome) in crossings.iter().zip(&split.outcomes) {
        let new_ends = junction(&split.chain, outcome);
        let new_cut = matches!(outcome, SplitOutcome::Cut(_));
        let canonical = if !crossing.old_cut || new_cut {
            junction_point(model, &crossing.old, crossing.old_side)?
        } else {
            junction_point(model, &new_ends, side)?
        };
        snap_junction(model, &crossing.old, crossing.old_side, canonical)?;
        snap_junction(model, &new_ends, side, canonical)?;
    }
    Ok(split.chain)
}

/// Ends of the pieces meeting where a split parameter landed.
fn junction(chain: &[SegmentId], outcome: SplitOutcome) -> Junction {
    match outcome {
        SplitOutcome::Cut(j) | SplitOutcome::Merged(j) => {
            vec![(chain[j - 1], CurveEnd::End), (chain[j], CurveEnd::Start)]
        }
        SplitOutcome::AtStart => vec![(chain[0], CurveEnd::Start)],
        SplitOutcome::AtEnd => vec![(chain[chain.len() - 1], CurveEnd::End)],
    }
}

fn junction_point(model: &Model, ends: &Junction, side: usize) -> Result<Point2> {
    let (seg, end) = ends[0];
    let curve = model.segment(seg)?.uv[side]
        .as_ref()
        .ok_or(TopologyError::InvalidReference { kind: "segment side" })?;
    Ok(curve.end_point(end))
}

fn snap_junction(model: &mut Model, ends: &Junction, side: usize, p: Point2) -> Result<()> {
    for &(seg, end) in ends {
        if let Some(curve) = model.segment_mut(seg)?.uv[side].as_mut() {
            curve.set_end_point(end, p);
        }
    }
    Ok(())
}

/// Whether the middle of a new piece lies in the trimmed region of
/// `surface`. A surface without loops is bounded by its domain.
fn in_region(model: &Model, piece: SegmentId, side: usize, surface: SurfaceId) -> Result<bool> {
    let mid = model
        .segment(piece)?
        .uv[side]
        .as_ref()
        .ok_or(TopologyError::InvalidReference { kind: "segment side" })?
        .midpoint();
    let refs = model.surface_refs(surface)?;
    if refs.is_empty() {
        let domain = model.surface(surface)?.surface.domain();
        return Ok(domain_contains(&domain, &mid, 0.0));
    }
    let curves = refs
        .iter()
        .map(|&r| model.ref_raw_curve(r))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(point_in_region(&mid, curves))
}
