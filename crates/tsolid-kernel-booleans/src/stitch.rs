//! Combining two models without a Boolean, optionally fusing coincident
//! boundary edges.

use tsolid_kernel_math::Point3;
use tsolid_kernel_topo::{Input, Model, SegmentId};

use crate::config::BooleanConfig;
use crate::error::Result;

/// Merge two models into one.
///
/// The result holds every surface and segment of both operands. With
/// `stitch`, each pair of boundary segments on different surfaces whose
/// model-space images coincide within `stitch_tolerance` (in either
/// direction) becomes one shared segment.
pub fn boolean_merge(a: &Model, b: &Model, stitch: bool, config: &BooleanConfig) -> Result<Model> {
    config.validate()?;
    let mut model = a.clone();
    model.set_input(Input::Input1);
    model.absorb(b.clone(), Input::Input2)?;
    if stitch {
        let fused = stitch_boundaries(&mut model, config.stitch_tolerance)?;
        log::debug!("merge stitched {fused} boundary pairs");
    }
    Ok(model)
}

/// Model-space start, middle and end of a segment's first image.
fn space_samples(model: &Model, id: SegmentId) -> Result<Option<[Point3; 3]>> {
    let seg = model.segment(id)?;
    if let Some(c) = &seg.euclidean {
        return Ok(Some([c.start(), c.midpoint(), c.end()]));
    }
    let (Some(s), Some(uv)) = (seg.surfaces[0], seg.uv[0].as_ref()) else {
        return Ok(None);
    };
    let surface = &model.surface(s)?.surface;
    Ok(Some([
        surface.evaluate(uv.start()),
        surface.evaluate(uv.midpoint()),
        surface.evaluate(uv.end()),
    ]))
}

/// How `q` lies on `p`: `Some(false)` same direction, `Some(true)` opposite.
fn coincidence(p: &[Point3; 3], q: &[Point3; 3], tol: f64) -> Option<bool> {
    let near = |x: &Point3, y: &Point3| (x - y).norm() <= tol;
    if !near(&p[1], &q[1]) {
        return None;
    }
    if near(&p[0], &q[0]) && near(&p[2], &q[2]) {
        Some(false)
    } else if near(&p[0], &q[2]) && near(&p[2], &q[0]) {
        Some(true)
    } else {
        None
    }
}

/// Fuse coincident boundary segments. Returns the number of pairs fused.
fn stitch_boundaries(model: &mut Model, tol: f64) -> Result<usize> {
    let mut open = Vec::new();
    for (id, seg) in &model.segments {
        if seg.surfaces[0].is_some() && seg.surfaces[1].is_none() {
            open.push(id);
        }
    }
    let mut samples = Vec::with_capacity(open.len());
    for &id in &open {
        samples.push(space_samples(model, id)?);
    }

    let mut taken = vec![false; open.len()];
    let mut fused = 0;
    for i in 0..open.len() {
        let Some(p) = samples[i] else { continue };
        for j in i + 1..open.len() {
            if taken[i] || taken[j] {
                continue;
            }
            let Some(q) = samples[j] else { continue };
            if model.segment(open[i])?.surfaces[0] == model.segment(open[j])?.surfaces[0] {
                continue;
            }
            if let Some(opposite) = coincidence(&p, &q, tol) {
                fuse(model, open[i], open[j], opposite)?;
                taken[i] = true;
                taken[j] = true;
                fused += 1;
            }
        }
    }
    Ok(fused)
}

/// Move `from`'s surface and curve into the free slot of `into`, and
/// redirect `from`'s references.
fn fuse(model: &mut Model, into: SegmentId, from: SegmentId, opposite: bool) -> Result<()> {
    let (surface, curve) = {
        let seg = model.segment(from)?;
        (seg.surfaces[0], seg.uv[0].clone())
    };
    let (t0, t1) = model
        .segment(into)?
        .uv[0]
        .as_ref()
        .map(|c| c.domain())
        .unwrap_or((0.0, 1.0));
    let curve = curve
        .map(|c| if opposite { c.reverse() } else { c })
        .and_then(|c| c.reparametrized(t0, t1));

    let target = model.segment_mut(into)?;
    target.surfaces[1] = surface;
    target.uv[1] = curve;
    for r in model.refs_to_segment(from) {
        let seg_ref = model.seg_ref_mut(r)?;
        seg_ref.segment = into;
        seg_ref.reversed ^= opposite;
    }
    model.segments.remove(from);
    Ok(())
}
