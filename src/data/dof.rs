//! Degree-of-freedom storage that follows the adaptive leaf index set.
//!
//! A `LeafDofVector` holds one value per leaf entity of one codimension,
//! stored densely at the entity's leaf index. After an adaptation cycle the
//! vector is grown with [`LeafDofVector::resize`] (new slots start at
//! `T::default()`); after [`AdaptiveLeafIndexSet::compress`] it is compacted
//! with [`LeafDofVector::compress`], which moves relocated values from their
//! old index to their new one and drops the tail.

use crate::forest::traits::HierarchicGrid;
use crate::grid_error::GridError;
use crate::index::leaf::AdaptiveLeafIndexSet;
use crate::topology::element::Entity;

/// Dense per-leaf-entity values of one codimension.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LeafDofVector<T> {
    codim: usize,
    values: Vec<T>,
}

impl<T: Clone + Default> LeafDofVector<T> {
    /// Default-initialized vector sized to the current leaf index range.
    pub fn new(codim: usize, set: &AdaptiveLeafIndexSet) -> Self {
        Self {
            codim,
            values: vec![T::default(); set.size(codim)],
        }
    }

    pub fn codim(&self) -> usize {
        self.codim
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Grow (or shrink) to the index range of `set`; new slots are default.
    pub fn resize(&mut self, set: &AdaptiveLeafIndexSet) {
        self.values.resize(set.size(self.codim), T::default());
    }

    /// Follow a compression of `set`. Returns the number of moved values.
    pub fn compress(&mut self, set: &AdaptiveLeafIndexSet) -> usize {
        let mut moved = 0;
        for (_, old, new) in set.relocations(self.codim) {
            if let Some(value) = self.values.get(old).cloned() {
                if new >= self.values.len() {
                    self.values.resize(new + 1, T::default());
                }
                self.values[new] = value;
                moved += 1;
            }
        }
        self.values.resize(set.size(self.codim), T::default());
        moved
    }

    /// Value of `entity`.
    pub fn get<G>(
        &self,
        grid: &G,
        set: &AdaptiveLeafIndexSet,
        entity: Entity<G::Element>,
    ) -> Result<&T, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        let i = self.slot(grid, set, entity)?;
        Ok(&self.values[i])
    }

    /// Mutable value of `entity`.
    pub fn get_mut<G>(
        &mut self,
        grid: &G,
        set: &AdaptiveLeafIndexSet,
        entity: Entity<G::Element>,
    ) -> Result<&mut T, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        let i = self.slot(grid, set, entity)?;
        Ok(&mut self.values[i])
    }

    fn slot<G>(
        &self,
        grid: &G,
        set: &AdaptiveLeafIndexSet,
        entity: Entity<G::Element>,
    ) -> Result<usize, GridError>
    where
        G: HierarchicGrid + ?Sized,
    {
        if entity.codim != self.codim {
            return Err(GridError::InvalidCodim {
                codim: entity.codim,
                dim: grid.dimension(),
            });
        }
        let i = set.index(grid, entity)?;
        if i >= self.values.len() {
            return Err(GridError::IndexOutOfRange {
                codim: self.codim,
                index: i,
                len: self.values.len(),
            });
        }
        Ok(i)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{AdaptGrid, GridOptions, OneDGrid};
    use crate::traverse::LeafWalk;

    #[test]
    fn values_survive_compression() {
        let mut g = OneDGrid::new(&[0.0, 1.0, 2.0, 3.0], GridOptions::default()).unwrap();
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        let mut dofs = LeafDofVector::<f64>::new(0, &set);
        for e in LeafWalk::new(&g, 0) {
            let (a, b) = g.interval(e);
            *dofs.get_mut(&g, &set, Entity::element(e)).unwrap() = 0.5 * (a + b);
        }

        let m0 = g.macro_elements()[0];
        g.refine_element(m0).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();
        dofs.resize(&set);
        assert_eq!(dofs.len(), 5);
        for &c in g.children(m0) {
            assert_eq!(*dofs.get(&g, &set, Entity::element(c)).unwrap(), 0.0);
            let (a, b) = g.interval(c);
            *dofs.get_mut(&g, &set, Entity::element(c)).unwrap() = 0.5 * (a + b);
        }

        assert!(set.compress(&g).unwrap());
        assert_eq!(dofs.compress(&set), 1);
        assert_eq!(dofs.len(), 4);
        for e in LeafWalk::new(&g, g.max_level()) {
            let (a, b) = g.interval(e);
            assert_eq!(*dofs.get(&g, &set, Entity::element(e)).unwrap(), 0.5 * (a + b));
        }
    }

    #[test]
    fn wrong_codim_is_rejected() {
        let g = OneDGrid::new(&[0.0, 1.0], GridOptions::default()).unwrap();
        let set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        let dofs = LeafDofVector::<u8>::new(1, &set);
        let e = g.macro_elements()[0];
        assert!(matches!(
            dofs.get(&g, &set, Entity::element(e)),
            Err(GridError::InvalidCodim { codim: 0, .. })
        ));
        assert_eq!(*dofs.get(&g, &set, Entity::sub_entity(e, 1, 1)).unwrap(), 0);
    }
}
