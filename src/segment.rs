//! Segments and the arena pool that owns them.
//!
//! The simplifier represents the still-ancestral material of each
//! input node as a singly linked chain of segments.  Rather than
//! heap-allocating chain nodes individually, segments live in a
//! [``SegmentPool``] and link to one another through
//! `Option<SegmentId>` indexes.  Releasing a segment returns its slot
//! to a free list for reuse.

use crate::tsdef::{IdType, Position};
use std::ops::{Index, IndexMut};

/// Index of a segment within a [``SegmentPool``].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentId(usize);

/// A half-open interval `[left, right)` of a genome, mapped to an
/// output node, with an optional link to the next segment in its
/// chain.
///
/// Chain invariants: `left < right` for every segment, and
/// `right <= next.left` (segments are disjoint and sorted).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// Left edge of interval
    pub left: Position,
    /// Right edge of interval
    pub right: Position,
    /// The output node covering the interval
    pub node: IdType,
    /// The next segment in the chain
    pub next: Option<SegmentId>,
}

/// Arena allocator for [``Segment``]s.
pub struct SegmentPool {
    segments_: Vec<Segment>,
    free_: Vec<SegmentId>,
}

impl SegmentPool {
    /// Create a pool whose backing storage is pre-reserved for
    /// `capacity` segments.  The pool grows on demand beyond the
    /// hint.
    pub fn with_capacity(capacity: usize) -> Self {
        SegmentPool {
            segments_: Vec::with_capacity(capacity),
            free_: vec![],
        }
    }

    /// Acquire a segment slot and initialize it.
    pub fn alloc(
        &mut self,
        left: Position,
        right: Position,
        node: IdType,
        next: Option<SegmentId>,
    ) -> SegmentId {
        let seg = Segment {
            left,
            right,
            node,
            next,
        };
        match self.free_.pop() {
            Some(id) => {
                self.segments_[id.0] = seg;
                id
            }
            None => {
                self.segments_.push(seg);
                SegmentId(self.segments_.len() - 1)
            }
        }
    }

    /// Release a segment slot back to the pool.
    pub fn free(&mut self, id: SegmentId) {
        debug_assert!(!self.free_.contains(&id));
        self.free_.push(id);
    }

    /// Number of segments currently allocated.
    pub fn num_allocated(&self) -> usize {
        self.segments_.len() - self.free_.len()
    }

    /// Drop all allocations.  Backing storage is retained.
    pub fn reset(&mut self) {
        self.segments_.clear();
        self.free_.clear();
    }
}

impl Index<SegmentId> for SegmentPool {
    type Output = Segment;

    fn index(&self, id: SegmentId) -> &Segment {
        &self.segments_[id.0]
    }
}

impl IndexMut<SegmentId> for SegmentPool {
    fn index_mut(&mut self, id: SegmentId) -> &mut Segment {
        &mut self.segments_[id.0]
    }
}
