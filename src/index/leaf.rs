//! Adaptive leaf index set.
//!
//! Leaf entities of every codimension carry an index that survives
//! adaptation: indices are only handed out to entities that do not have one
//! yet, and only [`AdaptiveLeafIndexSet::compress`] renumbers. Between two
//! compressions the index range may contain holes (entities that vanished or
//! stopped being leaves) and a growth region above the last compact size.
//!
//! Each slot, keyed by hierarchic index, is in one of three states:
//! - `New`: the index was assigned, or moved by compression, in this cycle;
//!   storage following the set must initialize or relocate the entry,
//! - `Used`: a stable index whose data is valid,
//! - `Unused`: a hole.

use crate::debug_invariants::DebugInvariants;
use crate::forest::traits::HierarchicGrid;
use crate::grid_error::GridError;
use crate::topology::element::Entity;
use crate::traverse::hierarchic::HierarchicCursor;
use crate::traverse::walk::LeafWalk;
use itertools::{EitherOrBoth, Itertools};

/// State of a leaf index slot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IndexState {
    New,
    Used,
    #[default]
    Unused,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct LeafCodimIndex {
    pub(crate) leaf_index: Vec<Option<usize>>,
    pub(crate) state: Vec<IndexState>,
    /// Pre-compression index of slots moved by the last `compress`.
    old_index: Vec<Option<usize>>,
    pub(crate) next_free: usize,
    /// Visited flags of the running `mark_all_used` pass.
    #[serde(skip)]
    visited: Vec<bool>,
}

impl LeafCodimIndex {
    fn grow(&mut self, len: usize) {
        if len > self.leaf_index.len() {
            self.leaf_index.resize(len, None);
            self.state.resize(len, IndexState::Unused);
            self.old_index.resize(len, None);
        }
    }

    /// Forget slot `h`; returns true if it held an index.
    fn clear_slot(&mut self, h: usize) -> bool {
        if h >= self.leaf_index.len() {
            return false;
        }
        self.state[h] = IndexState::Unused;
        self.old_index[h] = None;
        self.leaf_index[h].take().is_some()
    }

    /// Give slot `h` the next free index if it has none. A slot that kept
    /// its index through a `mark_all_used` pass but went `Unused` is live
    /// again under that index; `next_free` only grows between compressions,
    /// so nobody else holds it.
    fn insert_new(&mut self, codim: usize, h: usize) -> Result<(), GridError> {
        let len = self.leaf_index.len();
        let slot = self
            .leaf_index
            .get_mut(h)
            .ok_or(GridError::IndexOutOfRange { codim, index: h, len })?;
        match *slot {
            None => {
                *slot = Some(self.next_free);
                self.next_free += 1;
                self.state[h] = IndexState::New;
            }
            Some(_) if self.state[h] == IndexState::Unused => self.state[h] = IndexState::Used,
            Some(_) => {}
        }
        Ok(())
    }

    /// Record `h` as live in the running pass.
    fn insert(&mut self, codim: usize, h: usize) -> Result<(), GridError> {
        let len = self.leaf_index.len();
        if h >= len {
            return Err(GridError::IndexOutOfRange { codim, index: h, len });
        }
        if std::mem::replace(&mut self.visited[h], true) {
            return Ok(());
        }
        match self.leaf_index[h] {
            None => {
                self.leaf_index[h] = Some(self.next_free);
                self.next_free += 1;
                self.state[h] = IndexState::New;
            }
            Some(_) if self.state[h] == IndexState::New => {}
            Some(_) => self.state[h] = IndexState::Used,
        }
        Ok(())
    }

    fn is_live(&self, h: usize) -> bool {
        self.state.get(h).is_some_and(|&s| s != IndexState::Unused)
    }

    /// Fill holes below the live count with the indices above it.
    fn compress(&mut self) -> usize {
        let live: Vec<usize> = (0..self.leaf_index.len())
            .filter(|&h| self.is_live(h))
            .collect();
        let n = live.len();
        let holes: Vec<usize> = (0..n)
            .merge_join_by(
                live.iter()
                    .filter_map(|&h| self.leaf_index[h])
                    .filter(|&i| i < n)
                    .sorted_unstable(),
                |a, b| a.cmp(b),
            )
            .filter_map(|pair| match pair {
                EitherOrBoth::Left(hole) => Some(hole),
                _ => None,
            })
            .collect();
        for h in 0..self.leaf_index.len() {
            if !self.is_live(h) {
                self.leaf_index[h] = None;
            }
            self.old_index[h] = None;
        }
        let mut holes = holes.into_iter();
        let mut moved = 0;
        for &h in &live {
            let Some(old) = self.leaf_index[h] else {
                continue;
            };
            if old < n {
                continue;
            }
            let Some(hole) = holes.next() else {
                break;
            };
            self.leaf_index[h] = Some(hole);
            self.old_index[h] = Some(old);
            self.state[h] = IndexState::New;
            moved += 1;
        }
        self.next_free = n;
        moved
    }

    fn validate(&self, codim: usize, compressed: bool) -> Result<(), GridError> {
        let live = (0..self.leaf_index.len()).filter(|&h| self.is_live(h));
        let mut seen = vec![false; self.next_free];
        let mut count = 0;
        for h in live {
            let Some(i) = self.leaf_index[h] else {
                return Err(GridError::InvariantViolation(format!(
                    "leaf codim {codim}: live slot {h} has no index"
                )));
            };
            if i >= self.next_free || std::mem::replace(&mut seen[i], true) {
                return Err(GridError::InvariantViolation(format!(
                    "leaf codim {codim}: index {i} duplicated or beyond {}",
                    self.next_free
                )));
            }
            count += 1;
        }
        if compressed && count != self.next_free {
            return Err(GridError::InvariantViolation(format!(
                "leaf codim {codim}: {count} live indices after compress, size {}",
                self.next_free
            )));
        }
        Ok(())
    }
}

/// Leaf-consecutive indices for codimensions `0..=dim`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdaptiveLeafIndexSet {
    pub(crate) codims: Vec<LeafCodimIndex>,
    /// True while no index was handed out since the last `compress`.
    compressed: bool,
}

impl AdaptiveLeafIndexSet {
    /// Empty set for a grid of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            codims: vec![LeafCodimIndex::default(); dim + 1],
            compressed: true,
        }
    }

    /// Set indexing every leaf entity of `grid`.
    pub fn for_grid<G>(grid: &G) -> Result<Self, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        let mut set = Self::new(grid.dimension());
        set.resize(grid)?;
        Ok(set)
    }

    /// Follow a topology change: grow the slot arrays to the grid's
    /// hierarchic index bounds, forget slots whose hierarchic index was
    /// released, and index new leaves.
    ///
    /// Indices marked `New` by the previous cycle become `Used`.
    pub fn resize<G>(&mut self, grid: &G) -> Result<(), GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        for (codim, slots) in self.codims.iter_mut().enumerate() {
            slots.grow(grid.max_hierarchic_index(codim));
            for &h in grid.released_indices(codim) {
                if slots.clear_slot(h) {
                    self.compressed = false;
                }
            }
            for (state, old) in slots.state.iter_mut().zip(slots.old_index.iter_mut()) {
                if *state == IndexState::New {
                    *state = IndexState::Used;
                }
                *old = None;
            }
        }
        self.mark_all_below_old(grid)
    }

    /// Walk every macro element's tree and give each leaf entity without an
    /// index the next free one.
    fn mark_all_below_old<G>(&mut self, grid: &G) -> Result<(), GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        let max_level = grid.max_level();
        let before = self.codims[0].next_free;
        for &root in grid.macro_elements() {
            let mut cursor = HierarchicCursor::at_root(grid, root, max_level);
            while let Some(e) = cursor.current() {
                if grid.is_leaf(e) {
                    self.insert_entity_new(grid, e)?;
                }
                cursor.advance(grid);
            }
        }
        if self.codims[0].next_free != before {
            self.compressed = false;
        }
        Ok(())
    }

    fn insert_entity_new<G>(&mut self, grid: &G, e: G::Element) -> Result<(), GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        for (codim, slots) in self.codims.iter_mut().enumerate() {
            for i in 0..grid.sub_entity_count(e, codim) {
                slots.insert_new(codim, grid.sub_index(e, codim, i))?;
            }
        }
        Ok(())
    }

    /// Mark every entity of the leaf view live, assigning indices to those
    /// without one; everything not visited ends the pass `Unused`.
    pub fn mark_all_used<G>(&mut self, grid: &G) -> Result<(), GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        for (codim, slots) in self.codims.iter_mut().enumerate() {
            slots.grow(grid.max_hierarchic_index(codim));
            slots.visited.clear();
            slots.visited.resize(slots.leaf_index.len(), false);
        }
        for e in LeafWalk::new(grid, grid.max_level()) {
            for (codim, slots) in self.codims.iter_mut().enumerate() {
                for i in 0..grid.sub_entity_count(e, codim) {
                    slots.insert(codim, grid.sub_index(e, codim, i))?;
                }
            }
        }
        for slots in &mut self.codims {
            for (state, &visited) in slots.state.iter_mut().zip(&slots.visited) {
                if !visited {
                    *state = IndexState::Unused;
                }
            }
            slots.visited = Vec::new();
        }
        Ok(())
    }

    /// Make the leaf indices consecutive again.
    ///
    /// Live entities whose index lies at or above the live count are moved
    /// into the holes below it and marked `New`; their previous index stays
    /// available through [`Self::old_index`]. Returns true if anything moved.
    pub fn compress<G>(&mut self, grid: &G) -> Result<bool, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        self.mark_all_used(grid)?;
        let moved: Vec<usize> = self.codims.iter_mut().map(LeafCodimIndex::compress).collect();
        self.compressed = true;
        log::debug!(
            "leaf index set compressed: sizes {:?}, relocated {:?}",
            self.codims.iter().map(|c| c.next_free).collect::<Vec<_>>(),
            moved
        );
        crate::debug_invariants!(self.validate_invariants(), "AdaptiveLeafIndexSet");
        Ok(moved.iter().any(|&m| m > 0))
    }

    /// Number of leaf indices in use for `codim`, holes included before
    /// compression.
    pub fn size(&self, codim: usize) -> usize {
        self.codims.get(codim).map_or(0, |c| c.next_free)
    }

    /// Returns true if no index was handed out since the last compression.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Leaf index of `entity`.
    pub fn index<G>(&self, grid: &G, entity: Entity<G::Element>) -> Result<usize, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        self.lookup(entity.codim, entity.hierarchic_index(grid))
    }

    /// Leaf index of sub-entity `i` of codimension `codim` of element `e`.
    pub fn sub_index<G>(
        &self,
        grid: &G,
        e: G::Element,
        codim: usize,
        i: usize,
    ) -> Result<usize, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        self.lookup(codim, grid.sub_index(e, codim, i))
    }

    fn lookup(&self, codim: usize, h: usize) -> Result<usize, GridError> {
        let slots = self.slots(codim)?;
        match (slots.leaf_index.get(h), slots.state.get(h)) {
            (Some(Some(i)), Some(state)) if *state != IndexState::Unused => Ok(*i),
            (Some(_), _) => {
                log::warn!("no leaf index for codim {codim} hierarchic index {h}");
                Err(GridError::MissingIndex { codim, index: h })
            }
            (None, _) => Err(GridError::IndexOutOfRange {
                codim,
                index: h,
                len: slots.leaf_index.len(),
            }),
        }
    }

    /// True iff the slot of hierarchic index `h` is `New`.
    pub fn index_new(&self, codim: usize, h: usize) -> bool {
        self.state(codim, h) == IndexState::New
    }

    /// State of the slot of hierarchic index `h`.
    pub fn state(&self, codim: usize, h: usize) -> IndexState {
        self.codims
            .get(codim)
            .and_then(|c| c.state.get(h))
            .copied()
            .unwrap_or_default()
    }

    /// Index the entity had before the last compression (its current index
    /// if it did not move).
    pub fn old_index(&self, codim: usize, h: usize) -> Option<usize> {
        let slots = self.codims.get(codim)?;
        slots
            .old_index
            .get(h)
            .copied()
            .flatten()
            .or_else(|| self.new_index(codim, h))
    }

    /// Current index of the slot of hierarchic index `h`.
    pub fn new_index(&self, codim: usize, h: usize) -> Option<usize> {
        self.codims.get(codim)?.leaf_index.get(h).copied().flatten()
    }

    /// Hierarchic indices of `codim` moved by the last compression, with
    /// their old and new leaf index.
    pub fn relocations(&self, codim: usize) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.codims.get(codim).into_iter().flat_map(|slots| {
            slots
                .old_index
                .iter()
                .enumerate()
                .filter_map(|(h, old)| Some((h, (*old)?, slots.leaf_index[h]?)))
        })
    }

    fn slots(&self, codim: usize) -> Result<&LeafCodimIndex, GridError> {
        self.codims.get(codim).ok_or(GridError::InvalidCodim {
            codim,
            dim: self.codims.len().saturating_sub(1),
        })
    }

    /// Rebuild from persisted per-codim index arrays: assigned slots become
    /// `Used`, the others `Unused`.
    pub(crate) fn from_parts(parts: Vec<(usize, Vec<Option<usize>>)>) -> Self {
        let codims = parts
            .into_iter()
            .map(|(next_free, leaf_index)| LeafCodimIndex {
                state: leaf_index
                    .iter()
                    .map(|i| match i {
                        Some(_) => IndexState::Used,
                        None => IndexState::Unused,
                    })
                    .collect(),
                old_index: vec![None; leaf_index.len()],
                leaf_index,
                next_free,
                visited: Vec::new(),
            })
            .collect::<Vec<_>>();
        let compressed = codims
            .iter()
            .all(|c| c.leaf_index.iter().flatten().count() == c.next_free);
        Self { codims, compressed }
    }
}

impl DebugInvariants for AdaptiveLeafIndexSet {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "AdaptiveLeafIndexSet");
    }

    fn validate_invariants(&self) -> Result<(), GridError> {
        self.codims
            .iter()
            .enumerate()
            .try_for_each(|(codim, slots)| slots.validate(codim, self.compressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{AdaptGrid, GridOptions, OneDGrid};

    fn chain(n: usize) -> OneDGrid {
        let coords: Vec<f64> = (0..=n).map(|i| i as f64).collect();
        OneDGrid::new(&coords, GridOptions::default()).unwrap()
    }

    fn element_index(set: &AdaptiveLeafIndexSet, g: &OneDGrid, e: crate::ElementId) -> usize {
        set.index(g, Entity::element(e)).unwrap()
    }

    #[test]
    fn initial_indices_follow_leaf_order() {
        let g = chain(4);
        let set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        assert_eq!(set.size(0), 4);
        assert_eq!(set.size(1), 5);
        for (n, &e) in g.macro_elements().iter().enumerate() {
            assert_eq!(element_index(&set, &g, e), n);
            assert!(set.index_new(0, e.index()));
        }
    }

    #[test]
    fn uniform_refinement_reuses_parent_indices() {
        let mut g = chain(4);
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        for e in g.macro_elements().to_vec() {
            g.refine_element(e).unwrap();
        }
        g.end_adaptation();
        set.resize(&g).unwrap();
        assert_eq!(set.size(0), 12);
        assert!(!set.is_compressed());

        assert!(set.compress(&g).unwrap());
        assert_eq!(set.size(0), 8);
        assert_eq!(set.size(1), 9);
        let mut used: Vec<usize> = LeafWalk::new(&g, g.max_level())
            .map(|e| element_index(&set, &g, e))
            .collect();
        used.sort_unstable();
        assert_eq!(used, (0..8).collect::<Vec<_>>());
        // four children moved into the parents' slots
        assert_eq!(set.relocations(0).count(), 4);
        assert!(set.relocations(0).all(|(_, old, new)| old >= 8 && new < 4));
        assert!(set.validate_invariants().is_ok());
    }

    #[test]
    fn coarsening_without_intervening_compress_keeps_parent_index() {
        let mut g = chain(4);
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        set.compress(&g).unwrap();
        let e2 = g.macro_elements()[2];
        g.refine_element(e2).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();

        g.coarsen_children(e2).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();
        assert_eq!(element_index(&set, &g, e2), 2);
        assert!(!set.index_new(0, e2.index()));
        assert!(2 < set.size(0));

        assert!(!set.compress(&g).unwrap());
        assert_eq!(set.size(0), 4);
        assert!(set.validate_invariants().is_ok());
    }

    #[test]
    fn coarsening_after_mark_all_used_revives_parent_index() {
        let mut g = chain(4);
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        set.compress(&g).unwrap();
        let e2 = g.macro_elements()[2];
        g.refine_element(e2).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();

        // the refined parent keeps its index but goes Unused
        set.mark_all_used(&g).unwrap();
        assert_eq!(set.state(0, e2.index()), IndexState::Unused);
        assert_eq!(set.new_index(0, e2.index()), Some(2));

        g.coarsen_children(e2).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();
        assert_eq!(element_index(&set, &g, e2), 2);
        assert_eq!(set.state(0, e2.index()), IndexState::Used);
        assert!(set.validate_invariants().is_ok());

        assert!(!set.compress(&g).unwrap());
        assert_eq!(set.size(0), 4);
        assert_eq!(element_index(&set, &g, e2), 2);
    }

    #[test]
    fn coarsening_after_compress_fills_the_hole() {
        let mut g = chain(4);
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        let e2 = g.macro_elements()[2];
        g.refine_element(e2).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();
        set.compress(&g).unwrap();
        assert_eq!(set.size(0), 5);

        g.coarsen_children(e2).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();
        assert!(set.index_new(0, e2.index()));
        set.compress(&g).unwrap();
        assert_eq!(set.size(0), 4);
        let mut used: Vec<usize> = g
            .macro_elements()
            .iter()
            .map(|&e| element_index(&set, &g, e))
            .collect();
        used.sort_unstable();
        assert_eq!(used, vec![0, 1, 2, 3]);
    }

    #[test]
    fn insert_beyond_arrays_fails() {
        let mut g = chain(1);
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        let e = g.macro_elements()[0];
        g.refine_element(e).unwrap();
        let err = set.codims[0].insert_new(0, 2).unwrap_err();
        assert_eq!(
            err,
            GridError::IndexOutOfRange {
                codim: 0,
                index: 2,
                len: 1
            }
        );
        let child = g.children(e)[0];
        assert!(matches!(
            set.index(&g, Entity::element(child)),
            Err(GridError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn refined_parent_index_is_missing_after_compress() {
        let mut g = chain(2);
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        let e0 = g.macro_elements()[0];
        g.refine_element(e0).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();
        set.compress(&g).unwrap();
        assert_eq!(
            set.index(&g, Entity::element(e0)),
            Err(GridError::MissingIndex {
                codim: 0,
                index: e0.index()
            })
        );
        assert_eq!(set.old_index(0, e0.index()), None);
    }

    #[test]
    fn serde_roundtrip() {
        let g = chain(3);
        let set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: AdaptiveLeafIndexSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
