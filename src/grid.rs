//! `Grid<G>`: traversal, indexing and adaptation over one forest backend.
//!
//! The facade owns the forest together with everything derived from it:
//! lazily computed level index sets and marker vectors (one slot per level,
//! dropped on every adaptation cycle), the leaf marker, and the adaptive
//! leaf index set, which is resized after every cycle and compacted on
//! request.
//!
//! Topology only changes through [`Grid::adapt`] and [`Grid::global_refine`],
//! so cached data can never be observed half-updated.

use crate::adapt::{self, AdaptReport, AdaptivityOptions};
use crate::debug_invariants::DebugInvariants;
use crate::forest::traits::AdaptGrid;
use crate::grid_error::GridError;
use crate::index::leaf::AdaptiveLeafIndexSet;
use crate::index::level::LevelIndexSet;
use crate::topology::cache::{InvalidateCache, LevelCache};
use crate::topology::element::Entity;
use crate::topology::partition::{PartitionIteratorType, PartitionType, classify_element};
use crate::traverse::entity_iter::{EntityIterator, LeafIterator, LevelIterator};
use crate::traverse::hierarchic::HierarchicIterator;
use crate::traverse::marker::MarkerVector;
use crate::traverse::walk::{LeafWalk, LevelWalk, View};
use once_cell::sync::OnceCell;
use std::borrow::Cow;

/// A forest together with its traversal caches and index sets.
#[derive(Debug)]
pub struct Grid<G: AdaptGrid> {
    forest: G,
    options: AdaptivityOptions,
    level_sets: LevelCache<LevelIndexSet>,
    level_markers: LevelCache<MarkerVector>,
    leaf_marker: OnceCell<MarkerVector>,
    leaf_set: AdaptiveLeafIndexSet,
}

impl<G: AdaptGrid> Grid<G> {
    /// Wrap `forest` with default adaptivity options.
    pub fn new(forest: G) -> Result<Self, GridError> {
        Self::with_options(forest, AdaptivityOptions::default())
    }

    pub fn with_options(forest: G, options: AdaptivityOptions) -> Result<Self, GridError> {
        let levels = forest.max_level() + 1;
        let leaf_set = AdaptiveLeafIndexSet::for_grid(&forest)?;
        Ok(Self {
            forest,
            options,
            level_sets: LevelCache::with_levels(levels),
            level_markers: LevelCache::with_levels(levels),
            leaf_marker: OnceCell::new(),
            leaf_set,
        })
    }

    /// The underlying forest.
    pub fn forest(&self) -> &G {
        &self.forest
    }

    pub fn into_forest(self) -> G {
        self.forest
    }

    pub fn options(&self) -> &AdaptivityOptions {
        &self.options
    }

    pub fn dimension(&self) -> usize {
        self.forest.dimension()
    }

    pub fn max_level(&self) -> usize {
        self.forest.max_level()
    }

    fn check_level(&self, level: usize) -> Result<(), GridError> {
        let max_level = self.forest.max_level();
        if level > max_level {
            return Err(GridError::LevelOutOfRange { level, max_level });
        }
        Ok(())
    }

    fn check_codim(&self, codim: usize) -> Result<(), GridError> {
        let dim = self.forest.dimension();
        if codim > dim {
            return Err(GridError::InvalidCodim { codim, dim });
        }
        Ok(())
    }

    fn check_element(&self, e: G::Element) -> Result<(), GridError> {
        if !self.forest.contains(e) {
            return Err(GridError::InvalidElement(self.forest.hierarchic_index(e)));
        }
        Ok(())
    }

    fn level_marker(&self, level: usize) -> Result<&MarkerVector, GridError> {
        self.check_level(level)?;
        let forest = &self.forest;
        self.level_markers
            .get_or_try_init(level, || Ok(MarkerVector::for_level(forest, level)))
            .ok_or(GridError::LevelOutOfRange {
                level,
                max_level: forest.max_level(),
            })?
    }

    fn leaf_marker(&self, max_level: usize) -> Cow<'_, MarkerVector> {
        if max_level == self.forest.max_level() {
            Cow::Borrowed(
                self.leaf_marker
                    .get_or_init(|| MarkerVector::for_leaves(&self.forest, max_level)),
            )
        } else {
            Cow::Owned(MarkerVector::for_leaves(&self.forest, max_level))
        }
    }

    /// First entity of codimension `codim` and partition `partition` on
    /// `level`.
    pub fn lbegin(
        &self,
        codim: usize,
        partition: PartitionIteratorType,
        level: usize,
    ) -> Result<LevelIterator<'_, G>, GridError> {
        self.check_codim(codim)?;
        self.check_level(level)?;
        let marker = if codim > 0 {
            Some(Cow::Borrowed(self.level_marker(level)?))
        } else {
            None
        };
        Ok(EntityIterator::new(
            &self.forest,
            LevelWalk::new(&self.forest, level),
            View::Level(level),
            codim,
            partition,
            marker,
        ))
    }

    /// End position matching [`Self::lbegin`].
    pub fn lend(
        &self,
        codim: usize,
        partition: PartitionIteratorType,
        level: usize,
    ) -> Result<LevelIterator<'_, G>, GridError> {
        self.check_codim(codim)?;
        self.check_level(level)?;
        Ok(EntityIterator::end(
            &self.forest,
            LevelWalk::exhausted(&self.forest),
            View::Level(level),
            codim,
            partition,
        ))
    }

    /// First leaf entity of codimension `codim` and partition `partition`,
    /// counting elements on `max_level` as leaves.
    pub fn leafbegin(
        &self,
        codim: usize,
        partition: PartitionIteratorType,
        max_level: usize,
    ) -> Result<LeafIterator<'_, G>, GridError> {
        self.check_codim(codim)?;
        self.check_level(max_level)?;
        let marker = (codim > 0).then(|| self.leaf_marker(max_level));
        Ok(EntityIterator::new(
            &self.forest,
            LeafWalk::new(&self.forest, max_level),
            View::Leaf(max_level),
            codim,
            partition,
            marker,
        ))
    }

    /// End position matching [`Self::leafbegin`].
    pub fn leafend(
        &self,
        codim: usize,
        partition: PartitionIteratorType,
        max_level: usize,
    ) -> Result<LeafIterator<'_, G>, GridError> {
        self.check_codim(codim)?;
        self.check_level(max_level)?;
        Ok(EntityIterator::end(
            &self.forest,
            LeafWalk::exhausted(&self.forest, max_level),
            View::Leaf(max_level),
            codim,
            partition,
        ))
    }

    /// Leaf elements of the whole grid.
    pub fn leaf_elements(&self) -> LeafWalk<'_, G> {
        LeafWalk::new(&self.forest, self.forest.max_level())
    }

    /// Strict descendants of `e` down to `max_level`.
    pub fn hbegin(&self, e: G::Element, max_level: usize) -> Result<HierarchicIterator<'_, G>, GridError> {
        self.check_element(e)?;
        Ok(HierarchicIterator::begin(&self.forest, e, max_level))
    }

    pub fn hend(&self, max_level: usize) -> HierarchicIterator<'_, G> {
        HierarchicIterator::end(&self.forest, max_level)
    }

    /// Index set of `level`, computed on first use after each adaptation.
    pub fn level_index_set(&self, level: usize) -> Result<&LevelIndexSet, GridError> {
        let marker = self.level_marker(level)?;
        let forest = &self.forest;
        self.level_sets
            .get_or_try_init(level, || LevelIndexSet::compute(forest, level, marker))
            .ok_or(GridError::LevelOutOfRange {
                level,
                max_level: forest.max_level(),
            })?
    }

    /// Number of entities of `codim` on `level`.
    pub fn size(&self, level: usize, codim: usize) -> Result<usize, GridError> {
        self.check_codim(codim)?;
        Ok(self.level_index_set(level)?.size(codim))
    }

    /// Size of the leaf index range of `codim`.
    pub fn leaf_size(&self, codim: usize) -> usize {
        self.leaf_set.size(codim)
    }

    pub fn leaf_index_set(&self) -> &AdaptiveLeafIndexSet {
        &self.leaf_set
    }

    /// Leaf index of `entity`.
    pub fn leaf_index(&self, entity: Entity<G::Element>) -> Result<usize, GridError> {
        self.check_element(entity.element)?;
        self.leaf_set.index(&self.forest, entity)
    }

    /// Level index of `entity` on the level of the element it was reached
    /// through.
    pub fn level_index(&self, entity: Entity<G::Element>) -> Result<usize, GridError> {
        self.check_element(entity.element)?;
        let level = entity.level(&self.forest);
        self.level_index_set(level)?.index(&self.forest, entity)
    }

    /// Partition type of `entity` among the elements of its level.
    pub fn level_partition_type(&self, entity: Entity<G::Element>) -> Result<PartitionType, GridError> {
        self.check_element(entity.element)?;
        let level = entity.level(&self.forest);
        if entity.codim == 0 {
            return Ok(classify_element(&self.forest, entity.element, |n| {
                self.forest.level(n) == level
            }));
        }
        let h = entity.hierarchic_index(&self.forest);
        self.level_marker(level)?
            .partition_type(entity.codim, h)
            .ok_or(GridError::MissingIndex {
                codim: entity.codim,
                index: h,
            })
    }

    /// Partition type of `entity` in the leaf view.
    pub fn leaf_partition_type(&self, entity: Entity<G::Element>) -> Result<PartitionType, GridError> {
        self.check_element(entity.element)?;
        let max_level = self.forest.max_level();
        let view = View::Leaf(max_level);
        if !view.contains(&self.forest, entity.element) {
            return Err(GridError::NotLeaf(self.forest.hierarchic_index(entity.element)));
        }
        if entity.codim == 0 {
            return Ok(classify_element(&self.forest, entity.element, |n| {
                view.contains(&self.forest, n)
            }));
        }
        let h = entity.hierarchic_index(&self.forest);
        self.leaf_marker(max_level)
            .partition_type(entity.codim, h)
            .ok_or(GridError::MissingIndex {
                codim: entity.codim,
                index: h,
            })
    }

    /// Mark leaf `e` for refinement (`> 0`) or coarsening (`< 0`).
    pub fn mark(&mut self, e: G::Element, refcount: i32) -> Result<bool, GridError> {
        self.forest.mark(e, refcount)
    }

    pub fn get_mark(&self, e: G::Element) -> i32 {
        self.forest.get_mark(e)
    }

    /// Returns true if the next [`Self::adapt`] may coarsen an element.
    pub fn pre_adapt(&self) -> bool {
        adapt::pre_adapt(&self.forest)
    }

    /// Run one adaptation cycle and bring the caches and the leaf index set
    /// up to date.
    pub fn adapt(&mut self) -> Result<AdaptReport, GridError> {
        let report = adapt::adapt(&mut self.forest, &self.options)?;
        self.invalidate_cache();
        self.leaf_set.resize(&self.forest)?;
        if self.options.check_invariants {
            self.leaf_set.validate_invariants()?;
        }
        Ok(report)
    }

    /// Clear all marks after [`Self::adapt`].
    pub fn post_adapt(&mut self) {
        self.forest.clear_marks();
    }

    /// Refine every leaf `times` times.
    pub fn global_refine(&mut self, times: usize) -> Result<AdaptReport, GridError> {
        let mut total = AdaptReport {
            max_level: self.forest.max_level(),
            ..AdaptReport::default()
        };
        for _ in 0..times {
            let leaves: Vec<G::Element> = self.leaf_elements().collect();
            for e in leaves {
                self.forest.mark(e, 1)?;
            }
            total.merge(self.adapt()?);
            self.post_adapt();
        }
        Ok(total)
    }

    /// Compact the leaf index set. Returns true if storage following the
    /// set must move entries (see [`AdaptiveLeafIndexSet::relocations`]).
    pub fn compress(&mut self) -> Result<bool, GridError> {
        let moved = self.leaf_set.compress(&self.forest)?;
        if self.options.check_invariants {
            self.leaf_set.validate_invariants()?;
        }
        Ok(moved)
    }

    /// Assign `e` and its descendants to `rank`. Partition types change, so
    /// markers are dropped.
    pub fn set_owner(&mut self, e: G::Element, rank: usize) -> Result<(), GridError> {
        self.forest.set_owner(e, rank)?;
        self.level_markers.invalidate_cache();
        self.leaf_marker.take();
        Ok(())
    }

    /// Validate the leaf index set and every computed level index set.
    pub fn validate(&self) -> Result<(), GridError> {
        self.leaf_set.validate_invariants()?;
        for level in 0..self.level_sets.levels() {
            if let Some(set) = self.level_sets.get(level) {
                set.validate_invariants()?;
            }
        }
        Ok(())
    }
}

impl<G: AdaptGrid> InvalidateCache for Grid<G> {
    fn invalidate_cache(&mut self) {
        let levels = self.forest.max_level() + 1;
        self.level_sets.reset(levels);
        self.level_markers.reset(levels);
        self.leaf_marker.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::traits::HierarchicGrid;
    use crate::forest::{GridOptions, OneDGrid, SimplexGridBuilder};
    use crate::topology::partition::PartitionIteratorType as It;

    fn chain(n: usize) -> Grid<OneDGrid> {
        let coords: Vec<f64> = (0..=n).map(|i| i as f64).collect();
        Grid::new(OneDGrid::new(&coords, GridOptions::default()).unwrap()).unwrap()
    }

    #[test]
    fn level_beyond_max_fails_fast() {
        let g = chain(2);
        assert_eq!(
            g.lbegin(0, It::All, 1).unwrap_err(),
            GridError::LevelOutOfRange {
                level: 1,
                max_level: 0
            }
        );
        assert!(g.size(3, 0).is_err());
        assert!(matches!(g.lbegin(2, It::All, 0), Err(GridError::InvalidCodim { .. })));
    }

    #[test]
    fn empty_grid_begin_equals_end() {
        let g = Grid::new(
            SimplexGridBuilder::<2>::new(GridOptions::default())
                .create_grid()
                .unwrap(),
        )
        .unwrap();
        assert!(g.lbegin(0, It::All, 0).unwrap() == g.lend(0, It::All, 0).unwrap());
        assert!(g.leafbegin(2, It::All, 0).unwrap() == g.leafend(2, It::All, 0).unwrap());
        assert_eq!(g.size(0, 0).unwrap(), 0);
    }

    #[test]
    fn level_sets_are_cached_until_adapt() {
        let mut g = chain(2);
        let first = g.level_index_set(0).unwrap() as *const LevelIndexSet;
        let again = g.level_index_set(0).unwrap() as *const LevelIndexSet;
        assert_eq!(first, again);
        let e = g.forest().macro_elements()[0];
        g.mark(e, 1).unwrap();
        g.adapt().unwrap();
        assert_eq!(g.level_sets.computed(), 0);
        assert_eq!(g.size(1, 0).unwrap(), 2);
        assert_eq!(g.size(0, 0).unwrap(), 2);
    }

    #[test]
    fn global_refine_doubles_leaves() {
        let mut g = chain(3);
        let report = g.global_refine(2).unwrap();
        assert_eq!(report.refined, 3 + 6);
        assert_eq!(report.max_level, 2);
        assert!(g.compress().unwrap());
        assert_eq!(g.leaf_size(0), 12);
        assert_eq!(g.leaf_size(1), 13);
        assert_eq!(g.leafbegin(0, It::All, 2).unwrap().count(), 12);
        assert_eq!(g.leafbegin(0, It::All, 1).unwrap().count(), 6);
    }

    #[test]
    fn hierarchic_iteration_rejects_stale_handles() {
        let mut g = chain(1);
        let m = g.forest().macro_elements()[0];
        g.mark(m, 1).unwrap();
        g.adapt().unwrap();
        let child = g.forest().children(m)[0];
        assert_eq!(g.hbegin(m, 1).unwrap().count(), 2);
        assert!(g.hbegin(m, 1).unwrap() != g.hend(1));
        for c in g.forest().children(m).to_vec() {
            g.mark(c, -1).unwrap();
        }
        g.adapt().unwrap();
        assert_eq!(
            g.hbegin(child, 1).unwrap_err(),
            GridError::InvalidElement(child.index())
        );
    }

    #[test]
    fn entity_lookups_reject_stale_handles() {
        let mut g = chain(1);
        let m = g.forest().macro_elements()[0];
        g.mark(m, 1).unwrap();
        g.adapt().unwrap();
        g.post_adapt();
        let child = g.forest().children(m)[0];
        for c in g.forest().children(m).to_vec() {
            g.mark(c, -1).unwrap();
        }
        g.adapt().unwrap();
        g.post_adapt();

        let stale = GridError::InvalidElement(child.index());
        for entity in [Entity::element(child), Entity::sub_entity(child, 1, 0)] {
            assert_eq!(g.level_index(entity).unwrap_err(), stale);
            assert_eq!(g.leaf_index(entity).unwrap_err(), stale);
            assert_eq!(g.level_partition_type(entity).unwrap_err(), stale);
            assert_eq!(g.leaf_partition_type(entity).unwrap_err(), stale);
        }
        assert_eq!(g.level_index(Entity::element(m)).unwrap(), 0);
    }

    #[test]
    fn partition_types_of_single_entities() {
        let mut g = chain(3);
        let m = g.forest().macro_elements().to_vec();
        g.set_owner(m[2], 1).unwrap();
        assert_eq!(
            g.level_partition_type(Entity::element(m[1])).unwrap(),
            PartitionType::Border
        );
        assert_eq!(
            g.leaf_partition_type(Entity::element(m[2])).unwrap(),
            PartitionType::Ghost
        );
        // the vertex between m[1] and m[2]
        assert_eq!(
            g.leaf_partition_type(Entity::sub_entity(m[2], 1, 0)).unwrap(),
            PartitionType::Border
        );
    }
}
