//! Boolean pipeline - intersection, splicing, classification, loop rebuild.

use std::collections::HashMap;

use rayon::prelude::*;
use tsolid_kernel_topo::{Input, Model, SegmentId, SurfaceId, TopologyError};

use crate::api::{BooleanOp, BooleanResult, IntersectionCurve};
use crate::config::BooleanConfig;
use crate::error::{BooleanError, Result};
use crate::segments::PairChains;
use crate::ssi::Intersector;
use crate::{bbox, classify, cleanup, loop_merge, propagate, segments, splice};

/// Run one Boolean operation on private copies of `a` and `b`.
pub(crate) fn run(
    a: &Model,
    b: &Model,
    op: BooleanOp,
    config: &BooleanConfig,
    solver: &dyn Intersector,
) -> Result<BooleanResult> {
    config.validate()?;
    debug_bool!("\n========== BOOLEAN {op:?} START ==========");
    debug_bool!("A: {:?}", a.counts());
    debug_bool!("B: {:?}", b.counts());

    let mut box_a = bbox::model_bounds(a)?;
    box_a.expand(config.match_tolerance);
    if !box_a.overlaps(&bbox::model_bounds(b)?) {
        return Err(BooleanError::Disjoint);
    }

    // Work on one combined copy; surfaces remember their operand.
    let mut model = a.clone();
    model.set_input(Input::Input1);
    let first: Vec<SurfaceId> = model.surfaces.keys().collect();
    let absorbed = model.absorb(b.clone(), Input::Input2)?;
    let second: Vec<SurfaceId> = absorbed.surfaces.values().copied().collect();

    // 1. Candidate pairs
    let pairs = bbox::candidate_pairs(&model, &first, &second, config.match_tolerance)?;
    debug_bool!("\n--- Stage 1: AABB filtering ---");
    debug_bool!("Candidate surface pairs: {}", pairs.len());

    // 2. Solver fan-out, the only parallel stage
    let mut chains: Vec<PairChains> = pairs
        .par_iter()
        .map(|&(sa, sb)| -> Result<PairChains> {
            let found = solver.intersect(
                model.surface(sa)?.surface.as_ref(),
                model.surface(sb)?.surface.as_ref(),
                config,
            )?;
            Ok((sa, sb, found))
        })
        .collect::<Result<Vec<_>>>()?;
    chains.retain(|(_, _, c)| !c.is_empty());
    log::debug!("{} surface pairs intersect", chains.len());

    // 3. Segments
    let new = segments::build_segments(&mut model, chains, config)?;
    if new.is_empty() {
        return Err(BooleanError::Disjoint);
    }

    // 4. Splice and filter
    let new = splice::splice_and_filter(&mut model, new, config)?;
    log::debug!("{} intersection segments after splicing", new.len());
    if new.is_empty() {
        return Err(BooleanError::Disjoint);
    }

    if config.intersection_curves_only {
        let back: HashMap<SurfaceId, SurfaceId> = absorbed
            .surfaces
            .iter()
            .map(|(old, &id)| (id, old))
            .collect();
        return Ok(BooleanResult::Curves(collect_curves(&model, &new, &back)?));
    }

    // 5. Classification
    splice::attach_refs(&mut model, &new)?;
    let mut lists = classify::flatten(&mut model)?;
    classify::classify(&mut model, &mut lists, op, config)?;

    // 6. Propagation to untouched surfaces
    propagate::propagate(&mut model, &mut lists)?;
    debug_bool!("\n--- Stage 6: {} surfaces kept ---", lists.len());

    match op {
        BooleanOp::Subtraction => {
            for (_, s) in model.surfaces.iter_mut() {
                if s.input == Input::Input2 {
                    s.orientation = s.orientation.flipped();
                }
            }
        }
        BooleanOp::Cut => {
            let tools: Vec<SurfaceId> = model
                .surfaces
                .iter()
                .filter(|(_, s)| s.input == Input::Input2)
                .map(|(id, _)| id)
                .collect();
            for s in tools {
                lists.remove(s);
                model.remove_surface(s);
            }
        }
        BooleanOp::Union | BooleanOp::Intersection => {}
    }

    // 7. Loops
    loop_merge::rebuild_loops(&mut model, lists, config)?;

    // 8. Cleanup
    cleanup::cleanup(&mut model, config)?;
    log::debug!("boolean {op:?} produced {:?}", model.counts());
    Ok(BooleanResult::Model(Box::new(model)))
}

/// Package the surviving new segments for the caller. `back` maps the
/// second operand's surfaces in the combined model to their original keys.
fn collect_curves(
    model: &Model,
    new: &[SegmentId],
    back: &HashMap<SurfaceId, SurfaceId>,
) -> Result<Vec<IntersectionCurve>> {
    let mut curves = Vec::with_capacity(new.len());
    for &n in new {
        let seg = model.segment(n)?;
        let (Some(sa), Some(sb), Some(uv_first), Some(uv_second)) = (
            seg.surfaces[0],
            seg.surfaces[1],
            seg.uv[0].clone(),
            seg.uv[1].clone(),
        ) else {
            return Err(TopologyError::InvalidReference { kind: "segment side" }.into());
        };
        let euclidean = match &seg.euclidean {
            Some(c) => c.clone(),
            None => {
                let surface = &model.surface(sa)?.surface;
                uv_first.map(|uv| surface.evaluate(*uv))
            }
        };
        curves.push(IntersectionCurve {
            euclidean,
            uv_first,
            uv_second,
            surface_first: sa,
            surface_second: *back
                .get(&sb)
                .ok_or(TopologyError::InvalidReference { kind: "surface" })?,
        });
    }
    Ok(curves)
}
