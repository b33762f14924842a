//! Level index set: consecutive per-level indices for every codimension.
//!
//! For one level the set is a bijection between the live entities of a
//! codimension on that level and `0..size(codim)`. It is recomputed in full
//! by [`LevelIndexSet::calc_new_index`] from a level traversal; index lookups
//! are array reads keyed by hierarchic index.

use crate::debug_invariants::{DebugInvariants, check_consecutive};
use crate::forest::traits::HierarchicGrid;
use crate::grid_error::GridError;
use crate::topology::element::Entity;
use crate::topology::partition::PartitionIteratorType;
use crate::traverse::entity_iter::LevelIterator;
use crate::traverse::marker::MarkerVector;
use crate::traverse::walk::{LevelWalk, View};
use std::borrow::Cow;

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
struct CodimIndex {
    /// `index[h]` = level index of the entity with hierarchic index `h`.
    index: Vec<Option<usize>>,
    size: usize,
}

/// Consecutive indices of the entities of one level.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LevelIndexSet {
    level: usize,
    codims: Vec<CodimIndex>,
}

impl LevelIndexSet {
    /// Empty set for `level` of a grid of dimension `dim`.
    pub fn new(level: usize, dim: usize) -> Self {
        Self {
            level,
            codims: vec![CodimIndex::default(); dim + 1],
        }
    }

    /// Build and compute the set for `level` of `grid`.
    pub fn compute<G>(grid: &G, level: usize, marker: &MarkerVector) -> Result<Self, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        let mut set = Self::new(level, grid.dimension());
        set.calc_new_index(grid, marker)?;
        Ok(set)
    }

    /// Recompute all indices from a level traversal, codimension `dim` down
    /// to `0`. The `n`-th entity visited gets index `n`.
    ///
    /// `marker` must have been built for this level of the current grid.
    pub fn calc_new_index<G>(&mut self, grid: &G, marker: &MarkerVector) -> Result<(), GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        if self.level > grid.max_level() {
            return Err(GridError::LevelOutOfRange {
                level: self.level,
                max_level: grid.max_level(),
            });
        }
        debug_assert_eq!(marker.view(), View::Level(self.level));
        let dim = grid.dimension();
        self.codims.resize(dim + 1, CodimIndex::default());
        for codim in (0..=dim).rev() {
            let slots = &mut self.codims[codim];
            slots.index.clear();
            slots.index.resize(grid.max_hierarchic_index(codim), None);
            let it: LevelIterator<'_, G> = LevelIterator::new(
                grid,
                LevelWalk::new(grid, self.level),
                View::Level(self.level),
                codim,
                PartitionIteratorType::All,
                (codim > 0).then_some(Cow::Borrowed(marker)),
            );
            let mut n = 0;
            for entity in it {
                slots.index[entity.hierarchic_index(grid)] = Some(n);
                n += 1;
            }
            slots.size = n;
        }
        log::trace!(
            "level {} index set: sizes {:?}",
            self.level,
            self.codims.iter().map(|c| c.size).collect::<Vec<_>>()
        );
        crate::debug_invariants!(self.validate_invariants(), "LevelIndexSet");
        Ok(())
    }

    /// The level this set indexes.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of entities of `codim` on this level.
    pub fn size(&self, codim: usize) -> usize {
        self.codims.get(codim).map_or(0, |c| c.size)
    }

    /// Index of `entity`, which must have been reached through an element of
    /// this level.
    pub fn index<G>(&self, grid: &G, entity: Entity<G::Element>) -> Result<usize, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        let found = entity.level(grid);
        if found != self.level {
            return Err(GridError::LevelMismatch {
                expected: self.level,
                found,
            });
        }
        self.lookup(entity.codim, entity.hierarchic_index(grid))
    }

    /// Index of sub-entity `i` of codimension `codim` of element `e`.
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
        self.index(grid, Entity::sub_entity(e, codim, i))
    }

    /// Returns true if `entity` has an index in this set.
    pub fn contains<G>(&self, grid: &G, entity: Entity<G::Element>) -> bool
    where
        G: HierarchicGrid + ?Sized,
    {
        self.index(grid, entity).is_ok()
    }

    fn lookup(&self, codim: usize, h: usize) -> Result<usize, GridError> {
        let slots = self.codims.get(codim).ok_or(GridError::InvalidCodim {
            codim,
            dim: self.codims.len().saturating_sub(1),
        })?;
        match slots.index.get(h) {
            Some(Some(i)) => Ok(*i),
            Some(None) => Err(GridError::MissingIndex { codim, index: h }),
            None => Err(GridError::IndexOutOfRange {
                codim,
                index: h,
                len: slots.index.len(),
            }),
        }
    }
}

impl DebugInvariants for LevelIndexSet {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "LevelIndexSet");
    }

    fn validate_invariants(&self) -> Result<(), GridError> {
        for (codim, slots) in self.codims.iter().enumerate() {
            check_consecutive(
                slots.index.iter().copied(),
                slots.size,
                &format!("level {} codim {codim}", self.level),
            )?;
        }
        Ok(())
    }
}
