//! Error types for topology operations.

use thiserror::Error;

use crate::{LoopId, SegRefId, SegmentId, SurfaceId};

/// Consistency failures of the topology store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    /// A key that no longer resolves in its arena.
    #[error("invalid {kind} reference")]
    InvalidReference {
        /// Which arena the key belongs to.
        kind: &'static str,
    },

    /// A trimming segment with no owning surface.
    #[error("trimming segment {0:?} has no owning surface")]
    OrphanSegment(SegmentId),

    /// Traversal of a loop does not return to its start.
    #[error("loop {0:?} does not close")]
    LoopNotClosed(LoopId),

    /// A segment reference on a surface the segment is not attached to.
    #[error("segment reference {0:?} points at a segment of another surface")]
    ForeignReference(SegRefId),

    /// A shared segment not referenced exactly once per adjacent surface.
    #[error("segment {segment:?} is referenced {found} times from surface {surface:?}")]
    ReferenceCount {
        /// The segment.
        segment: SegmentId,
        /// The adjacent surface.
        surface: SurfaceId,
        /// Number of loop references found.
        found: usize,
    },
}

impl TopologyError {
    pub(crate) fn surface() -> Self {
        Self::InvalidReference { kind: "surface" }
    }

    pub(crate) fn segment() -> Self {
        Self::InvalidReference { kind: "segment" }
    }

    pub(crate) fn seg_ref() -> Self {
        Self::InvalidReference { kind: "segment reference" }
    }

    pub(crate) fn trim_loop() -> Self {
        Self::InvalidReference { kind: "loop" }
    }
}

/// Result alias for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;
