//! `ElementId` and `Entity`: handles for mesh elements and their sub-entities.
//!
//! An `ElementId` wraps the codim-0 hierarchic index of an element. Backends
//! keep their element storage keyed by that index, so the handle doubles as
//! the raw identity the index sets are keyed by.
//!
//! An `Entity` names either an element (codim 0) or one of its sub-entities
//! (vertices, edges, faces) through the element that reached it and the local
//! sub-entity number, so entities of every codimension travel through the
//! same traversal code without per-codim types.

use crate::forest::traits::HierarchicGrid;
use std::fmt;

/// Handle of an element in a backend forest.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ElementId(u32);

impl ElementId {
    /// Wraps a hierarchic index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit the 32-bit handle.
    #[inline]
    pub fn new(index: usize) -> Self {
        ElementId(u32::try_from(index).expect("hierarchic index exceeds u32 range"))
    }

    /// The codim-0 hierarchic index of this element.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementId").field(&self.0).finish()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An entity of some codimension, reached through an element.
///
/// For `codim == 0` the entity is the element itself and `local == 0`.
/// Two entities compare equal when they reach the same element through the
/// same local number; use [`Entity::hierarchic_index`] to compare identities
/// of shared sub-entities reached from different elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entity<E> {
    /// Element through which this entity was reached.
    pub element: E,
    /// Codimension of the entity.
    pub codim: usize,
    /// Local sub-entity number within `element`.
    pub local: usize,
}

impl<E: Copy> Entity<E> {
    /// The element itself as a codim-0 entity.
    pub fn element(element: E) -> Self {
        Self {
            element,
            codim: 0,
            local: 0,
        }
    }

    /// Sub-entity `local` of codimension `codim` of `element`.
    pub fn sub_entity(element: E, codim: usize, local: usize) -> Self {
        Self {
            element,
            codim,
            local,
        }
    }

    /// Hierarchic index of this entity within its codimension.
    pub fn hierarchic_index<G>(&self, grid: &G) -> usize
    where
        G: HierarchicGrid<Element = E> + ?Sized,
    {
        if self.codim == 0 {
            grid.hierarchic_index(self.element)
        } else {
            grid.sub_index(self.element, self.codim, self.local)
        }
    }

    /// Refinement level of the element this entity was reached through.
    pub fn level<G>(&self, grid: &G) -> usize
    where
        G: HierarchicGrid<Element = E> + ?Sized,
    {
        grid.level(self.element)
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    assert_eq_size!(ElementId, u32);
}
