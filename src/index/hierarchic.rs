//! Hierarchic index manager.
//!
//! Every element (and every vertex, edge, face) ever created in a forest gets
//! a raw integer identity per codimension. Identities are issued from a
//! high-water mark and recycled through a bounded free list. Recycling is
//! delayed: an index freed during an adaptation cycle only becomes reusable
//! once the cycle is closed with [`HierarchicIndexManager::finish_cycle`], so
//! no index changes owner while a traversal or adaptation pass is in flight.

use crate::debug_invariants::DebugInvariants;
use crate::grid_error::GridError;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Default bound on free-list entries per codimension.
pub const DEFAULT_INDEX_STACK_CAPACITY: usize = 100_000;

/// Index bookkeeping for one codimension.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct IndexStack {
    /// One past the largest index ever issued.
    high_water: usize,
    /// Reusable indices, smallest first.
    free: BinaryHeap<Reverse<usize>>,
    /// Indices freed during the open cycle.
    pending: Vec<usize>,
    /// Indices freed during the last closed cycle.
    released: Vec<usize>,
    /// `allocated[i]` is true while index `i` belongs to a live entity.
    allocated: Vec<bool>,
    capacity: usize,
}

impl IndexStack {
    /// Create an empty stack whose free list holds at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            high_water: 0,
            free: BinaryHeap::new(),
            pending: Vec::new(),
            released: Vec::new(),
            allocated: Vec::new(),
            capacity,
        }
    }

    /// Issue an index: the smallest reusable one, else the high-water mark.
    pub fn get_index(&mut self) -> usize {
        let index = match self.free.pop() {
            Some(Reverse(i)) => i,
            None => {
                let i = self.high_water;
                self.high_water += 1;
                self.allocated.push(false);
                i
            }
        };
        self.allocated[index] = true;
        index
    }

    /// Return `index` to the pool. It becomes reusable after the cycle closes.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not currently allocated, or if the free list
    /// would exceed its capacity (pathological refinement depth).
    pub fn free_index(&mut self, index: usize) {
        assert!(
            self.allocated.get(index).copied().unwrap_or(false),
            "freeing hierarchic index {index} which is not allocated"
        );
        assert!(
            self.free.len() + self.pending.len() < self.capacity,
            "index stack overflow: more than {} free indices",
            self.capacity
        );
        self.allocated[index] = false;
        self.pending.push(index);
    }

    /// Make indices freed during the open cycle reusable.
    pub fn finish_cycle(&mut self) {
        self.released = std::mem::take(&mut self.pending);
        self.free.extend(self.released.iter().copied().map(Reverse));
    }

    /// One past the largest index ever issued; sizes auxiliary arrays.
    pub fn max_index(&self) -> usize {
        self.high_water
    }

    /// Raise the high-water mark to `max`, so indices issued afterwards never
    /// collide with indices of a restored grid.
    pub fn set_max_index(&mut self, max: usize) {
        if max > self.high_water {
            self.allocated.resize(max, false);
            self.high_water = max;
        }
    }

    /// Indices freed during the last closed cycle.
    pub fn released(&self) -> &[usize] {
        &self.released
    }

    /// Number of indices held by live entities.
    pub fn in_use(&self) -> usize {
        self.allocated.iter().filter(|&&a| a).count()
    }

    /// Returns true if `index` is held by a live entity.
    pub fn is_allocated(&self, index: usize) -> bool {
        self.allocated.get(index).copied().unwrap_or(false)
    }

    fn validate(&self) -> Result<(), GridError> {
        if self.allocated.len() != self.high_water {
            return Err(GridError::InvariantViolation(format!(
                "allocation map has {} entries for high-water mark {}",
                self.allocated.len(),
                self.high_water
            )));
        }
        for &Reverse(i) in self.free.iter() {
            if i >= self.high_water || self.allocated[i] {
                return Err(GridError::InvariantViolation(format!(
                    "free index {i} is allocated or beyond the high-water mark"
                )));
            }
        }
        Ok(())
    }
}

/// Per-codimension hierarchic index pools for one forest.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HierarchicIndexManager {
    stacks: Vec<IndexStack>,
}

impl HierarchicIndexManager {
    /// Create pools for codimensions `0..=dim`.
    pub fn new(dim: usize, capacity: usize) -> Self {
        Self {
            stacks: (0..=dim).map(|_| IndexStack::with_capacity(capacity)).collect(),
        }
    }

    /// Number of codimensions managed.
    pub fn codims(&self) -> usize {
        self.stacks.len()
    }

    /// Issue a new hierarchic index for `codim`.
    pub fn new_index(&mut self, codim: usize) -> usize {
        self.stacks[codim].get_index()
    }

    /// Release `index` of `codim`; reusable after [`Self::finish_cycle`].
    pub fn free_index(&mut self, codim: usize, index: usize) {
        self.stacks[codim].free_index(index);
    }

    /// High-water mark of `codim`.
    pub fn max_index(&self, codim: usize) -> usize {
        self.stacks[codim].max_index()
    }

    /// Restore the high-water mark of `codim` from persisted state.
    pub fn set_max_index(&mut self, codim: usize, max: usize) {
        self.stacks[codim].set_max_index(max);
    }

    /// Indices of `codim` released by the last closed cycle.
    pub fn released(&self, codim: usize) -> &[usize] {
        self.stacks[codim].released()
    }

    /// Returns true if `index` of `codim` is held by a live entity.
    pub fn is_allocated(&self, codim: usize, index: usize) -> bool {
        self.stacks[codim].is_allocated(index)
    }

    /// Close the adaptation cycle for every codimension.
    pub fn finish_cycle(&mut self) {
        for stack in &mut self.stacks {
            stack.finish_cycle();
        }
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
    }

    /// Access the pool of one codimension.
    pub fn stack(&self, codim: usize) -> &IndexStack {
        &self.stacks[codim]
    }
}

impl DebugInvariants for HierarchicIndexManager {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "HierarchicIndexManager");
    }

    fn validate_invariants(&self) -> Result<(), GridError> {
        self.stacks.iter().try_for_each(IndexStack::validate)
    }
}
