//! Marking segment references as kept (`Inside`) or removed (`Outside`).
//!
//! Works on flat per-surface reference lists: every loop is dissolved
//! first, and the new intersection references are added unlinked. Each
//! surface touched by an intersection curve is classified starting at the
//! curve ends, where a perturbed point on the neighboring curve is
//! compared against the other operand's outward normal.

use slotmap::SecondaryMap;
use tsolid_kernel_geom::{CurveEnd, UvCurve};
use tsolid_kernel_math::Point2;
use tsolid_kernel_topo::{Classification, Model, SegRefId, SurfaceId, TopologyError};

use crate::api::BooleanOp;
use crate::config::BooleanConfig;
use crate::error::{ensure_finite, BooleanError, Result};
use crate::matching::{ends_near, ends_near_widening, EndMatch};

/// Unlinked references per surface, between loop dissolution and rebuild.
pub(crate) type RefLists = SecondaryMap<SurfaceId, Vec<SegRefId>>;

/// Samples taken along each new curve for the nearest-sample fallback.
const FALLBACK_SAMPLES: usize = 9;

/// Dissolve every loop and gather all references, including the unlinked
/// ones created for new segments, into per-surface lists.
pub(crate) fn flatten(model: &mut Model) -> Result<RefLists> {
    let ids: Vec<SurfaceId> = model.surfaces.keys().collect();
    let mut lists = RefLists::new();
    for s in ids {
        lists.insert(s, model.dissolve_loops(s)?);
    }
    let mut fresh = Vec::new();
    for (id, r) in &model.seg_refs {
        if model.segment(r.segment)?.is_new() {
            fresh.push((r.surface, id));
        }
    }
    for (s, id) in fresh {
        lists
            .get_mut(s)
            .ok_or(TopologyError::InvalidReference { kind: "surface" })?
            .push(id);
    }
    Ok(lists)
}

/// Classify every surface touched by a new curve.
pub(crate) fn classify(
    model: &mut Model,
    lists: &mut RefLists,
    op: BooleanOp,
    config: &BooleanConfig,
) -> Result<()> {
    let mut targets = Vec::new();
    for (s, refs) in lists.iter() {
        if has_new(model, refs)? {
            targets.push(s);
        }
    }
    for s in targets {
        classify_surface(model, lists, s, op, config)?;
    }
    Ok(())
}

fn has_new(model: &Model, refs: &[SegRefId]) -> Result<bool> {
    for &r in refs {
        if is_new(model, r)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_new(model: &Model, r: SegRefId) -> Result<bool> {
    Ok(model.segment(model.seg_ref(r)?.segment)?.is_new())
}

fn class_of(model: &Model, r: SegRefId) -> Result<Classification> {
    Ok(model.seg_ref(r)?.class)
}

/// Classify the references of one surface that carries new curves, then
/// delete the ones marked `Outside` together with their mirrors.
pub(crate) fn classify_surface(
    model: &mut Model,
    lists: &mut RefLists,
    s: SurfaceId,
    op: BooleanOp,
    config: &BooleanConfig,
) -> Result<()> {
    let refs = lists
        .get(s)
        .cloned()
        .ok_or(TopologyError::InvalidReference { kind: "surface" })?;
    let mut new_refs = Vec::new();
    for &r in &refs {
        if is_new(model, r)? {
            new_refs.push(r);
        }
    }
    model.surface_mut(s)?.kept = Classification::Inside;
    for &n in &new_refs {
        model.seg_ref_mut(n)?.class = Classification::Inside;
    }

    // Junctions at the ends of the new curves.
    for &n in &new_refs {
        let curve = model.ref_raw_curve(n)?.clone();
        if curve.is_closed(config.match_tolerance) {
            let start = curve.start();
            let side = model.ref_side(n)?;
            let segment = model.seg_ref(n)?.segment;
            if let Some(c) = model.segment_mut(segment)?.uv[side].as_mut() {
                c.set_end_point(CurveEnd::End, start);
            }
            continue;
        }
        for end in [CurveEnd::Start, CurveEnd::End] {
            let p = curve.end_point(end);
            let (found, _) = ends_near_widening(model, &refs, Some(n), p, config)?
                .ok_or(BooleanError::NeighborLookup { surface: s, uv: p })?;
            let lone = found.len() == 1;
            let mut olds = Vec::new();
            for m in &found {
                if !is_new(model, m.seg_ref)? {
                    olds.push(*m);
                }
            }
            for m in olds.into_iter().take(2) {
                let verdict = match class_of(model, m.seg_ref)? {
                    Classification::Unknown if lone => Classification::Inside,
                    Classification::Unknown => junction_verdict(model, s, n, end, &m, op, config)?,
                    known => known,
                };
                log::trace!("surface {s:?}: junction neighbor {:?} is {verdict:?}", m.seg_ref);
                model.seg_ref_mut(m.seg_ref)?.class = verdict;
                spread(model, &refs, m.seg_ref, m.end, verdict, config.match_tolerance)?;
            }
        }
    }

    // References no junction reached: test from the nearest new-curve sample.
    let samples = fallback_samples(model, &new_refs, config)?;
    for &r in &refs {
        if class_of(model, r)? != Classification::Unknown {
            continue;
        }
        let mid = model.ref_raw_curve(r)?.midpoint();
        let nearest = samples.iter().min_by(|a, b| {
            (a.2 - mid).norm().total_cmp(&(b.2 - mid).norm())
        });
        let Some(&(n, t, p)) = nearest else {
            continue;
        };
        let dir = mid - p;
        let len = dir.norm();
        if len < 1e-12 {
            log::warn!("reference midpoint coincides with an intersection curve; left unclassified");
            continue;
        }
        let q = p + dir * (config.perturb_distance.min(len) / len);
        let other_uv = other_side_curve(model, n)?.evaluate(t);
        let other = other_surface(model, n)?;
        let verdict = side_test(model, s, other, p, q, other_uv, op)?;
        log::trace!("surface {s:?}: untouched reference {r:?} is {verdict:?}");
        model.seg_ref_mut(r)?.class = verdict;
        spread(model, &refs, r, CurveEnd::Start, verdict, config.match_tolerance)?;
        spread(model, &refs, r, CurveEnd::End, verdict, config.match_tolerance)?;
    }

    delete_outside(model, lists, s, config.match_tolerance)
}

/// Side test at a junction, perturbing along the old neighbor `m`.
fn junction_verdict(
    model: &Model,
    s: SurfaceId,
    n: SegRefId,
    end: CurveEnd,
    m: &EndMatch,
    op: BooleanOp,
    config: &BooleanConfig,
) -> Result<Classification> {
    let p = model.ref_raw_curve(n)?.end_point(end);
    let old = model.ref_raw_curve(m.seg_ref)?;
    let along = match m.end {
        CurveEnd::Start => old.clone(),
        CurveEnd::End => old.reverse(),
    };
    let q = perturbed(&along, config);
    let other_uv = other_side_curve(model, n)?.end_point(end);
    side_test(model, s, other_surface(model, n)?, p, q, other_uv, op)
}

/// A point a short arc distance from the start of `curve`, moved closer
/// when it would land on a sharp corner.
fn perturbed(curve: &UvCurve, config: &BooleanConfig) -> Point2 {
    let mut d = config.perturb_distance.min(0.5 * curve.length());
    for _ in 0..4 {
        let q = curve.evaluate(curve.param_at_arc_length(d));
        if !curve.corner_near(&q, 0.1 * d, config.corner_angle) {
            return q;
        }
        d *= 0.5;
    }
    curve.evaluate(curve.param_at_arc_length(d))
}

/// Verdict for the side of `p` toward `q` on surface `s`, judged against
/// the outward normal of `other` at `other_uv`.
fn side_test(
    model: &Model,
    s: SurfaceId,
    other: SurfaceId,
    p: Point2,
    q: Point2,
    other_uv: Point2,
    op: BooleanOp,
) -> Result<Classification> {
    let surface = model.surface(s)?;
    let step = surface.surface.evaluate(q) - surface.surface.evaluate(p);
    let normal = model.surface(other)?.outward_normal(other_uv);
    let dot = normal.dot(&step);
    ensure_finite("side test", &[dot])?;
    let outside_other = dot > 0.0;
    Ok(if outside_other == op.keeps_outside(surface.input) {
        Classification::Inside
    } else {
        Classification::Outside
    })
}

fn other_surface(model: &Model, n: SegRefId) -> Result<SurfaceId> {
    let r = model.seg_ref(n)?;
    Ok(model
        .segment(r.segment)?
        .other_surface(r.surface)
        .ok_or(TopologyError::ForeignReference(n))?)
}

fn other_side_curve(model: &Model, n: SegRefId) -> Result<&UvCurve> {
    let other = other_surface(model, n)?;
    let r = model.seg_ref(n)?;
    Ok(model
        .segment(r.segment)?
        .uv_on(other)
        .ok_or(TopologyError::ForeignReference(n))?)
}

/// Interior samples of the new curves, away from sharp corners, as
/// `(reference, parameter, point)`.
fn fallback_samples(
    model: &Model,
    new_refs: &[SegRefId],
    config: &BooleanConfig,
) -> Result<Vec<(SegRefId, f64, Point2)>> {
    let mut out = Vec::new();
    for &n in new_refs {
        let curve = model.ref_raw_curve(n)?;
        for (t, p) in curve.interior_samples(FALLBACK_SAMPLES) {
            if !curve.corner_near(&p, config.match_tolerance, config.corner_angle) {
                out.push((n, t, p));
            }
        }
    }
    Ok(out)
}

/// Carry `verdict` from `start` through junctions with exactly one
/// neighbor, leaving through the end opposite to `entered`. Stops at a
/// branching junction, a new curve, or an already classified reference.
fn spread(
    model: &mut Model,
    refs: &[SegRefId],
    start: SegRefId,
    entered: CurveEnd,
    verdict: Classification,
    tol: f64,
) -> Result<()> {
    let mut cur = start;
    let mut exit = entered.opposite();
    for _ in 0..refs.len() {
        let p = model.ref_raw_curve(cur)?.end_point(exit);
        let found = ends_near(model, refs, Some(cur), p, tol)?;
        let [next] = found.as_slice() else {
            break;
        };
        if is_new(model, next.seg_ref)? || class_of(model, next.seg_ref)? != Classification::Unknown {
            break;
        }
        model.seg_ref_mut(next.seg_ref)?.class = verdict;
        cur = next.seg_ref;
        exit = next.end.opposite();
    }
    Ok(())
}

/// Mark unclassified single neighbors at both ends of `r` as `Outside`.
/// Returns whether any reference was marked.
fn mark_outside_neighbors(model: &mut Model, refs: &[SegRefId], r: SegRefId, tol: f64) -> Result<bool> {
    let mut marked = false;
    for end in [CurveEnd::Start, CurveEnd::End] {
        let p = model.ref_raw_curve(r)?.end_point(end);
        let found = ends_near(model, refs, Some(r), p, tol)?;
        if let [next] = found.as_slice() {
            if !is_new(model, next.seg_ref)? && class_of(model, next.seg_ref)? == Classification::Unknown {
                model.seg_ref_mut(next.seg_ref)?.class = Classification::Outside;
                marked = true;
            }
        }
    }
    Ok(marked)
}

/// Whether the `Outside` references of `t` may be deleted now: `t` carries
/// no new curve, or its own classification already ran.
fn settled(model: &Model, lists: &RefLists, t: SurfaceId) -> Result<bool> {
    if model.surface(t)?.kept == Classification::Inside {
        return Ok(true);
    }
    Ok(!has_new(model, lists.get(t).map(Vec::as_slice).unwrap_or(&[]))?)
}

fn drop_ref(model: &mut Model, lists: &mut RefLists, r: SegRefId) -> Result<()> {
    let t = model.seg_ref(r)?.surface;
    if let Some(list) = lists.get_mut(t) {
        list.retain(|&x| x != r);
    }
    model.remove_ref(r);
    Ok(())
}

/// Delete the `Outside` references of `s` and their mirrors, one at a
/// time, until none is left. Neighbors marked on the way are deleted in
/// the same sweep, and so are marks left on settled adjacent surfaces.
fn delete_outside(model: &mut Model, lists: &mut RefLists, s: SurfaceId, tol: f64) -> Result<()> {
    let index = model.ref_index();
    let mut pending = vec![s];
    let mut deleted = 0usize;
    while let Some(t) = pending.pop() {
        loop {
            let refs = lists.get(t).cloned().unwrap_or_default();
            let mut doomed = None;
            for &r in &refs {
                if class_of(model, r)? == Classification::Outside {
                    doomed = Some(r);
                    break;
                }
            }
            let Some(r) = doomed else {
                break;
            };
            mark_outside_neighbors(model, &refs, r, tol)?;
            if let Some(m) = model.mirror(&index, r)? {
                let u = model.seg_ref(m)?.surface;
                let list = lists.get(u).cloned().unwrap_or_default();
                if mark_outside_neighbors(model, &list, m, tol)? && u != t && settled(model, lists, u)? {
                    pending.push(u);
                }
                drop_ref(model, lists, m)?;
            }
            drop_ref(model, lists, r)?;
            deleted += 1;
        }
    }
    log::debug!("surface {s:?}: {deleted} outside references deleted");
    debug_bool!(
        "surface {s:?}: {} references kept",
        lists.get(s).map_or(0, Vec::len)
    );
    Ok(())
}
