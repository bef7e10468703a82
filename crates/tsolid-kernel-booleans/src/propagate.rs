//! Spreading verdicts to surfaces no intersection curve touched.
//!
//! A kept reference whose mirror is still undecided keeps the mirror's
//! whole surface. Rounds repeat until nothing changes, bounded by the
//! surface count. Surfaces left without a kept reference are removed.

use tsolid_kernel_topo::{Classification, Model, SurfaceId};

use crate::classify::RefLists;
use crate::error::Result;

/// Propagate `Inside` across mirrors, then drop surfaces and references
/// that were not kept.
pub(crate) fn propagate(model: &mut Model, lists: &mut RefLists) -> Result<()> {
    let index = model.ref_index();
    let rounds = model.surfaces.len() + 1;
    for _ in 0..rounds {
        let mut changed = false;
        let ids: Vec<SurfaceId> = lists.keys().collect();
        for s in ids {
            let refs = lists.get(s).cloned().unwrap_or_default();
            for r in refs {
                if model.seg_ref(r)?.class != Classification::Inside {
                    continue;
                }
                let Some(m) = model.mirror(&index, r)? else {
                    continue;
                };
                if model.seg_ref(m)?.class != Classification::Unknown {
                    continue;
                }
                let t = model.seg_ref(m)?.surface;
                keep_surface(model, lists, t)?;
                changed = true;
            }
        }
        debug_bool!("propagation round: changed = {changed}");
        if !changed {
            break;
        }
    }

    let mut dead = Vec::new();
    for (s, refs) in lists.iter() {
        let mut kept = false;
        for &r in refs {
            kept |= model.seg_ref(r)?.class == Classification::Inside;
        }
        if !kept {
            dead.push(s);
        }
    }
    for s in dead {
        debug_bool!("removing surface {s:?}");
        lists.remove(s);
        model.remove_surface(s);
    }

    for (s, refs) in lists.iter_mut() {
        let mut stale = Vec::new();
        for &r in refs.iter() {
            if model.seg_ref(r)?.class != Classification::Inside {
                stale.push(r);
            }
        }
        if !stale.is_empty() {
            log::warn!(
                "surface {s:?} kept with {} unresolved references; dropping them",
                stale.len()
            );
            refs.retain(|r| !stale.contains(r));
            for r in stale {
                model.remove_ref(r);
            }
        }
    }
    Ok(())
}

/// Mark a surface kept, along with every reference not yet decided.
fn keep_surface(model: &mut Model, lists: &RefLists, t: SurfaceId) -> Result<()> {
    model.surface_mut(t)?.kept = Classification::Inside;
    for &r in lists.get(t).map(Vec::as_slice).unwrap_or(&[]) {
        let seg_ref = model.seg_ref_mut(r)?;
        if seg_ref.class == Classification::Unknown {
            seg_ref.class = Classification::Inside;
        }
    }
    Ok(())
}
