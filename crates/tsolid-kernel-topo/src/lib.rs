#![warn(missing_docs)]

//! Topology store for trimmed-surface models.
//!
//! A [`Model`] owns four arenas:
//!
//! - [`TrimmedSurface`]: a parametric patch plus the loops trimming it
//! - [`TrimSegment`]: one curve shared by at most two adjacent surfaces,
//!   holding each surface's UV image of it
//! - [`SegRef`]: a directed use of a segment from one loop
//! - [`Loop`]: a cyclic singly-linked chain of segment references
//!
//! All cross-references are `slotmap` keys, so entities can be inserted
//! and removed while other handles stay valid.

use bitflags::bitflags;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use tsolid_kernel_geom::{CurveEnd, SpaceCurve, Surface, UvCurve};
use tsolid_kernel_math::{Dir3, Point2};

mod edit;
mod error;
mod validate;

pub use edit::{Absorbed, SegmentSplit};
pub use error::{Result, TopologyError};
pub use validate::ModelCounts;

new_key_type! {
    /// Handle to a trimmed surface.
    pub struct SurfaceId;
    /// Handle to a trimming segment.
    pub struct SegmentId;
    /// Handle to a segment reference.
    pub struct SegRefId;
    /// Handle to a trimming loop.
    pub struct LoopId;
}

/// References per segment, see [`Model::ref_index`].
pub type RefIndex = SecondaryMap<SegmentId, Vec<SegRefId>>;

/// Tri-state verdict used while classifying a Boolean operation.
///
/// `Inside` means "kept in the result".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Classification {
    /// Not decided yet.
    #[default]
    Unknown,
    /// Survives into the result.
    Inside,
    /// Removed from the result.
    Outside,
}

/// Which operand of a Boolean operation a surface came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Input {
    /// The first operand.
    #[default]
    Input1,
    /// The second operand.
    Input2,
}

/// Whether a surface's material side follows its parametric normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Outward normal is `d_du × d_dv`.
    #[default]
    Forward,
    /// Outward normal is `-(d_du × d_dv)`.
    Reversed,
}

impl Orientation {
    /// The opposite orientation.
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reversed,
            Orientation::Reversed => Orientation::Forward,
        }
    }
}

bitflags! {
    /// Per-segment bookkeeping tags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SegmentTags: u8 {
        /// Produced by the current Boolean operation.
        const NEW = 0b01;
        /// Reachable from some loop (set during cleanup).
        const USED = 0b10;
    }
}

/// A parametric surface restricted by its trimming loops.
#[derive(Debug, Clone)]
pub struct TrimmedSurface {
    /// Underlying geometry.
    pub surface: Box<dyn Surface>,
    /// Outer boundary and holes, in no particular order.
    pub loops: Vec<LoopId>,
    /// Surface-level verdict during classification.
    pub kept: Classification,
    /// Operand this surface came from.
    pub input: Input,
    /// Material side.
    pub orientation: Orientation,
}

impl TrimmedSurface {
    /// Create an untrimmed surface record.
    pub fn new(surface: Box<dyn Surface>, input: Input) -> Self {
        Self {
            surface,
            loops: Vec::new(),
            kept: Classification::Unknown,
            input,
            orientation: Orientation::Forward,
        }
    }

    /// Outward normal at `uv`, respecting the orientation flag.
    pub fn outward_normal(&self, uv: Point2) -> Dir3 {
        let n = self.surface.normal(uv);
        match self.orientation {
            Orientation::Forward => n,
            Orientation::Reversed => -n,
        }
    }
}

/// One geometric curve shared by up to two surfaces.
///
/// Slot `i` of `uv` is the curve in the parameter plane of `surfaces[i]`.
/// Both UV curves and the cached model-space curve share one parameter
/// domain, and map equal parameters to the same 3D point.
#[derive(Debug, Clone, Default)]
pub struct TrimSegment {
    /// UV image per adjacent surface.
    pub uv: [Option<UvCurve>; 2],
    /// Adjacent surfaces.
    pub surfaces: [Option<SurfaceId>; 2],
    /// Cached model-space image.
    pub euclidean: Option<SpaceCurve>,
    /// Bookkeeping tags.
    pub tags: SegmentTags,
}

impl TrimSegment {
    /// A segment shared by two surfaces.
    pub fn shared(first: SurfaceId, uv_first: UvCurve, second: SurfaceId, uv_second: UvCurve) -> Self {
        Self {
            uv: [Some(uv_first), Some(uv_second)],
            surfaces: [Some(first), Some(second)],
            euclidean: None,
            tags: SegmentTags::empty(),
        }
    }

    /// A true boundary edge of a single surface.
    pub fn boundary(surface: SurfaceId, uv: UvCurve) -> Self {
        Self {
            uv: [Some(uv), None],
            surfaces: [Some(surface), None],
            euclidean: None,
            tags: SegmentTags::empty(),
        }
    }

    /// Attach a cached model-space curve.
    pub fn with_euclidean(mut self, curve: SpaceCurve) -> Self {
        self.euclidean = Some(curve);
        self
    }

    /// Slot index of `surface`, if the segment is attached to it.
    pub fn side_of(&self, surface: SurfaceId) -> Option<usize> {
        self.surfaces.iter().position(|s| *s == Some(surface))
    }

    /// UV curve on `surface`.
    pub fn uv_on(&self, surface: SurfaceId) -> Option<&UvCurve> {
        self.side_of(surface).and_then(|i| self.uv[i].as_ref())
    }

    /// The adjacent surface other than `surface`.
    pub fn other_surface(&self, surface: SurfaceId) -> Option<SurfaceId> {
        match self.side_of(surface)? {
            0 => self.surfaces[1],
            _ => self.surfaces[0],
        }
    }

    /// Whether the segment is attached to two surfaces.
    pub fn is_shared(&self) -> bool {
        self.surfaces.iter().all(Option::is_some)
    }

    /// Whether the segment was produced by the current Boolean operation.
    pub fn is_new(&self) -> bool {
        self.tags.contains(SegmentTags::NEW)
    }
}

/// A directed use of a trimming segment by one surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegRef {
    /// The referenced segment.
    pub segment: SegmentId,
    /// The surface whose loop this reference belongs to.
    pub surface: SurfaceId,
    /// Traverse the surface's UV curve backward.
    pub reversed: bool,
    /// Classification verdict.
    pub class: Classification,
    /// Next reference in the loop; `None` while the reference is not linked.
    pub next: Option<SegRefId>,
}

/// A closed cycle of segment references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loop {
    /// Entry point of the cycle.
    pub first: SegRefId,
    /// Owning surface.
    pub surface: SurfaceId,
}

/// A trimmed-surface model.
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Trimmed surfaces.
    pub surfaces: SlotMap<SurfaceId, TrimmedSurface>,
    /// Trimming segments.
    pub segments: SlotMap<SegmentId, TrimSegment>,
    /// Segment references.
    pub seg_refs: SlotMap<SegRefId, SegRef>,
    /// Trimming loops.
    pub loops: SlotMap<LoopId, Loop>,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Look up a surface.
    pub fn surface(&self, id: SurfaceId) -> Result<&TrimmedSurface> {
        self.surfaces.get(id).ok_or_else(TopologyError::surface)
    }

    /// Look up a surface mutably.
    pub fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut TrimmedSurface> {
        self.surfaces.get_mut(id).ok_or_else(TopologyError::surface)
    }

    /// Look up a segment.
    pub fn segment(&self, id: SegmentId) -> Result<&TrimSegment> {
        self.segments.get(id).ok_or_else(TopologyError::segment)
    }

    /// Look up a segment mutably.
    pub fn segment_mut(&mut self, id: SegmentId) -> Result<&mut TrimSegment> {
        self.segments.get_mut(id).ok_or_else(TopologyError::segment)
    }

    /// Look up a segment reference.
    pub fn seg_ref(&self, id: SegRefId) -> Result<&SegRef> {
        self.seg_refs.get(id).ok_or_else(TopologyError::seg_ref)
    }

    /// Look up a segment reference mutably.
    pub fn seg_ref_mut(&mut self, id: SegRefId) -> Result<&mut SegRef> {
        self.seg_refs.get_mut(id).ok_or_else(TopologyError::seg_ref)
    }

    /// Look up a loop.
    pub fn trim_loop(&self, id: LoopId) -> Result<&Loop> {
        self.loops.get(id).ok_or_else(TopologyError::trim_loop)
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Add an untrimmed surface.
    pub fn add_surface(&mut self, surface: Box<dyn Surface>, input: Input) -> SurfaceId {
        self.surfaces.insert(TrimmedSurface::new(surface, input))
    }

    /// Add a trimming segment.
    pub fn add_segment(&mut self, segment: TrimSegment) -> SegmentId {
        self.segments.insert(segment)
    }

    /// Create an unlinked reference from `surface` to `segment`.
    pub fn new_ref(&mut self, segment: SegmentId, surface: SurfaceId, reversed: bool) -> SegRefId {
        self.seg_refs.insert(SegRef {
            segment,
            surface,
            reversed,
            class: Classification::Unknown,
            next: None,
        })
    }

    /// Build a loop on `surface` from `(segment, reversed)` pairs in traversal order.
    pub fn add_loop(&mut self, surface: SurfaceId, refs: &[(SegmentId, bool)]) -> Result<LoopId> {
        self.surface(surface)?;
        let mut ids = Vec::with_capacity(refs.len());
        for &(segment, reversed) in refs {
            if self.segment(segment)?.side_of(surface).is_none() {
                return Err(TopologyError::InvalidReference {
                    kind: "segment side",
                });
            }
            ids.push(self.new_ref(segment, surface, reversed));
        }
        self.link_loop(surface, &ids)
    }

    /// Link existing references into a new loop on `surface`.
    pub fn link_loop(&mut self, surface: SurfaceId, refs: &[SegRefId]) -> Result<LoopId> {
        let first = *refs.first().ok_or(TopologyError::InvalidReference { kind: "empty loop" })?;
        for (i, &r) in refs.iter().enumerate() {
            let next = refs[(i + 1) % refs.len()];
            self.seg_ref_mut(r)?.next = Some(next);
        }
        let id = self.loops.insert(Loop { first, surface });
        self.surface_mut(surface)?.loops.push(id);
        Ok(id)
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// References of a loop in traversal order.
    ///
    /// Fails with [`TopologyError::LoopNotClosed`] if the chain is broken or
    /// does not return to its start within the arena size.
    pub fn loop_refs(&self, id: LoopId) -> Result<Vec<SegRefId>> {
        let lp = self.trim_loop(id)?;
        let mut out = Vec::new();
        let mut cur = lp.first;
        loop {
            out.push(cur);
            cur = self
                .seg_ref(cur)?
                .next
                .ok_or(TopologyError::LoopNotClosed(id))?;
            if cur == lp.first {
                return Ok(out);
            }
            if out.len() > self.seg_refs.len() {
                return Err(TopologyError::LoopNotClosed(id));
            }
        }
    }

    /// All references in all loops of a surface.
    pub fn surface_refs(&self, id: SurfaceId) -> Result<Vec<SegRefId>> {
        let mut out = Vec::new();
        for &lp in &self.surface(id)?.loops {
            out.extend(self.loop_refs(lp)?);
        }
        Ok(out)
    }

    /// Remove every loop of a surface and return their references, unlinked.
    pub fn dissolve_loops(&mut self, id: SurfaceId) -> Result<Vec<SegRefId>> {
        let refs = self.surface_refs(id)?;
        for lp in std::mem::take(&mut self.surface_mut(id)?.loops) {
            self.loops.remove(lp);
        }
        for &r in &refs {
            self.seg_ref_mut(r)?.next = None;
        }
        Ok(refs)
    }

    /// References pointing at `segment`, from any surface.
    pub fn refs_to_segment(&self, segment: SegmentId) -> Vec<SegRefId> {
        self.seg_refs
            .iter()
            .filter(|(_, r)| r.segment == segment)
            .map(|(id, _)| id)
            .collect()
    }

    /// References grouped by the segment they point at.
    ///
    /// Build once before a run of [`Model::mirror`] lookups; references
    /// removed afterwards are skipped by the lookup.
    pub fn ref_index(&self) -> RefIndex {
        let mut index = RefIndex::new();
        for (id, r) in &self.seg_refs {
            if let Some(entry) = index.entry(r.segment) {
                entry.or_default().push(id);
            }
        }
        index
    }

    /// The reference to the same segment from the adjacent surface.
    pub fn mirror(&self, index: &RefIndex, id: SegRefId) -> Result<Option<SegRefId>> {
        let r = self.seg_ref(id)?;
        let Some(other) = self.segment(r.segment)?.other_surface(r.surface) else {
            return Ok(None);
        };
        Ok(index
            .get(r.segment)
            .into_iter()
            .flatten()
            .copied()
            .find(|&k| k != id && self.seg_refs.get(k).is_some_and(|m| m.surface == other)))
    }

    // =========================================================================
    // Reference geometry
    // =========================================================================

    /// Slot index of a reference's surface on its segment.
    pub fn ref_side(&self, id: SegRefId) -> Result<usize> {
        let r = self.seg_ref(id)?;
        self.segment(r.segment)?
            .side_of(r.surface)
            .ok_or(TopologyError::ForeignReference(id))
    }

    /// The UV curve a reference points at, as stored (ignores `reversed`).
    pub fn ref_raw_curve(&self, id: SegRefId) -> Result<&UvCurve> {
        let r = self.seg_ref(id)?;
        self.segment(r.segment)?
            .uv_on(r.surface)
            .ok_or(TopologyError::ForeignReference(id))
    }

    /// The UV curve in traversal direction.
    pub fn ref_curve(&self, id: SegRefId) -> Result<UvCurve> {
        let curve = self.ref_raw_curve(id)?;
        Ok(if self.seg_ref(id)?.reversed {
            curve.reverse()
        } else {
            curve.clone()
        })
    }

    /// UV point at one end of a reference, in traversal direction.
    pub fn ref_point(&self, id: SegRefId, end: CurveEnd) -> Result<Point2> {
        let curve = self.ref_raw_curve(id)?;
        let end = if self.seg_ref(id)?.reversed {
            end.opposite()
        } else {
            end
        };
        Ok(curve.end_point(end))
    }

    /// `(start, end)` UV points of a reference, in traversal direction.
    pub fn ref_endpoints(&self, id: SegRefId) -> Result<(Point2, Point2)> {
        Ok((
            self.ref_point(id, CurveEnd::Start)?,
            self.ref_point(id, CurveEnd::End)?,
        ))
    }

    /// Overwrite the UV point at one end of a reference (traversal direction).
    pub fn set_ref_point(&mut self, id: SegRefId, end: CurveEnd, p: Point2) -> Result<()> {
        let side = self.ref_side(id)?;
        let r = *self.seg_ref(id)?;
        let end = if r.reversed { end.opposite() } else { end };
        let curve = self.segment_mut(r.segment)?.uv[side]
            .as_mut()
            .ok_or(TopologyError::ForeignReference(id))?;
        curve.set_end_point(end, p);
        Ok(())
    }

    /// UV bounding box `(min, max)` of every curve referenced from a surface.
    pub fn uv_bounds(&self, id: SurfaceId) -> Result<Option<(Point2, Point2)>> {
        let mut bounds: Option<(Point2, Point2)> = None;
        for r in self.surface_refs(id)? {
            let (lo, hi) = self.ref_raw_curve(r)?.bounds();
            bounds = Some(match bounds {
                Some((a, b)) => (a.inf(&lo), b.sup(&hi)),
                None => (lo, hi),
            });
        }
        Ok(bounds)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a reference. Loops through it are not repaired.
    pub fn remove_ref(&mut self, id: SegRefId) {
        self.seg_refs.remove(id);
    }

    /// Remove a surface with its loops and references. Segments are kept;
    /// their slot for this surface is left for cleanup to clear.
    pub fn remove_surface(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.remove(id) else {
            return;
        };
        for lp in surface.loops {
            self.loops.remove(lp);
        }
        self.seg_refs.retain(|_, r| r.surface != id);
    }

    /// Detach segments from surfaces that no longer exist, compacting a
    /// surviving second slot into the first.
    pub fn detach_dead_surfaces(&mut self) {
        let surfaces = &self.surfaces;
        for (_, seg) in self.segments.iter_mut() {
            for i in 0..2 {
                if seg.surfaces[i].is_some_and(|s| !surfaces.contains_key(s)) {
                    seg.surfaces[i] = None;
                    seg.uv[i] = None;
                }
            }
            if seg.surfaces[0].is_none() && seg.surfaces[1].is_some() {
                seg.surfaces.swap(0, 1);
                seg.uv.swap(0, 1);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tsolid_kernel_geom::Plane;

    /// Unit square on the XY plane trimmed by four boundary edges.
    pub(crate) fn unit_square() -> (Model, SurfaceId, Vec<SegmentId>) {
        let mut model = Model::new();
        let plane = Plane::xy().with_domain((0.0, 1.0), (0.0, 1.0));
        let s = model.add_surface(Box::new(plane), Input::Input1);
        let c = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let segs: Vec<SegmentId> = (0..4)
            .map(|i| {
                model.add_segment(TrimSegment::boundary(
                    s,
                    UvCurve::line(c[i], c[(i + 1) % 4]),
                ))
            })
            .collect();
        let refs: Vec<(SegmentId, bool)> = segs.iter().map(|&g| (g, false)).collect();
        model.add_loop(s, &refs).unwrap();
        (model, s, segs)
    }

    #[test]
    fn test_loop_traversal_closes() {
        let (model, s, _) = unit_square();
        let lp = model.surface(s).unwrap().loops[0];
        let refs = model.loop_refs(lp).unwrap();
        assert_eq!(refs.len(), 4);
        let (start, _) = model.ref_endpoints(refs[0]).unwrap();
        let (_, end) = model.ref_endpoints(refs[3]).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn test_broken_chain_is_reported() {
        let (mut model, s, _) = unit_square();
        let lp = model.surface(s).unwrap().loops[0];
        let refs = model.loop_refs(lp).unwrap();
        model.seg_ref_mut(refs[2]).unwrap().next = None;
        assert_eq!(model.loop_refs(lp), Err(TopologyError::LoopNotClosed(lp)));
    }

    #[test]
    fn test_reversed_ref_endpoints() {
        let (mut model, _, _) = unit_square();
        let (id, _) = model.seg_refs.iter().next().unwrap();
        let (a, b) = model.ref_endpoints(id).unwrap();
        model.seg_ref_mut(id).unwrap().reversed = true;
        assert_eq!(model.ref_endpoints(id).unwrap(), (b, a));
        model
            .set_ref_point(id, CurveEnd::Start, Point2::new(5.0, 5.0))
            .unwrap();
        assert_eq!(model.ref_raw_curve(id).unwrap().end(), Point2::new(5.0, 5.0));
    }

    #[test]
    fn test_dissolve_and_relink() {
        let (mut model, s, _) = unit_square();
        let refs = model.dissolve_loops(s).unwrap();
        assert_eq!(refs.len(), 4);
        assert!(model.loops.is_empty());
        assert!(model.seg_refs.values().all(|r| r.next.is_none()));
        let lp = model.link_loop(s, &refs).unwrap();
        assert_eq!(model.loop_refs(lp).unwrap(), refs);
    }

    #[test]
    fn test_remove_surface_detaches_segments() {
        let (mut model, s, segs) = unit_square();
        model.remove_surface(s);
        assert!(model.seg_refs.is_empty());
        model.detach_dead_surfaces();
        assert!(model.segment(segs[0]).unwrap().surfaces[0].is_none());
    }

    #[test]
    fn test_mirror_lookup_through_index() {
        let mut model = Model::new();
        let a = model.add_surface(Box::new(Plane::xy()), Input::Input1);
        let b = model.add_surface(Box::new(Plane::xy()), Input::Input2);
        let line = UvCurve::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        let g = model.add_segment(TrimSegment::shared(a, line.clone(), b, line.clone()));
        let lone = model.add_segment(TrimSegment::boundary(a, line));
        let ra = model.new_ref(g, a, false);
        let rb = model.new_ref(g, b, true);
        let rl = model.new_ref(lone, a, false);

        let index = model.ref_index();
        assert_eq!(index[g], vec![ra, rb]);
        assert_eq!(model.mirror(&index, ra).unwrap(), Some(rb));
        assert_eq!(model.mirror(&index, rb).unwrap(), Some(ra));
        assert_eq!(model.mirror(&index, rl).unwrap(), None);

        // Removed references are skipped by a stale index.
        model.remove_ref(rb);
        assert_eq!(model.mirror(&index, ra).unwrap(), None);
    }

    #[test]
    fn test_orientation_flips_normal() {
        let (mut model, s, _) = unit_square();
        let uv = Point2::new(0.5, 0.5);
        assert!(model.surface(s).unwrap().outward_normal(uv).z > 0.0);
        let surf = model.surface_mut(s).unwrap();
        surf.orientation = surf.orientation.flipped();
        assert!(model.surface(s).unwrap().outward_normal(uv).z < 0.0);
    }
}
