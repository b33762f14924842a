//! Entity iterators: codimension expansion, marker de-duplication and the
//! partition filter on top of an element walk.
//!
//! The iterator keeps its current position explicitly, so a traversal can be
//! handled as a begin/end pair: [`EntityIterator::entity`] reads the
//! position, [`EntityIterator::increment`] moves it, and two iterators
//! compare equal when they stand on the same entity or are both at the end.
//! The `Iterator` impl yields the current entity and then increments.

use crate::forest::traits::HierarchicGrid;
use crate::topology::element::Entity;
use crate::topology::partition::{PartitionIteratorType, classify_element};
use crate::traverse::marker::MarkerVector;
use crate::traverse::walk::{LeafWalk, LevelWalk, View};
use std::borrow::Cow;

/// Entities of one codimension and partition over the elements of a walk.
pub struct EntityIterator<'a, G: HierarchicGrid + ?Sized, W> {
    grid: &'a G,
    walk: W,
    view: View,
    codim: usize,
    partition: PartitionIteratorType,
    /// Required for `codim > 0`.
    marker: Option<Cow<'a, MarkerVector>>,
    /// Element whose sub-entities are being expanded, and the next local number.
    expanding: Option<(G::Element, usize)>,
    current: Option<Entity<G::Element>>,
}

/// Entities of one level.
pub type LevelIterator<'a, G> = EntityIterator<'a, G, LevelWalk<'a, G>>;

/// Entities of the leaf view.
pub type LeafIterator<'a, G> = EntityIterator<'a, G, LeafWalk<'a, G>>;

impl<'a, G, W> EntityIterator<'a, G, W>
where
    G: HierarchicGrid + ?Sized,
    W: Iterator<Item = G::Element>,
{
    /// Iterator positioned at the first matching entity of `walk`.
    ///
    /// # Panics
    ///
    /// Panics if `codim > 0` and no marker is supplied.
    pub fn new(
        grid: &'a G,
        walk: W,
        view: View,
        codim: usize,
        partition: PartitionIteratorType,
        marker: Option<Cow<'a, MarkerVector>>,
    ) -> Self {
        assert!(
            codim == 0 || marker.is_some(),
            "codim {codim} traversal needs a marker vector"
        );
        let mut it = Self {
            grid,
            walk,
            view,
            codim,
            partition,
            marker,
            expanding: None,
            current: None,
        };
        it.increment();
        it
    }

    /// The end position for the same traversal.
    pub fn end(
        grid: &'a G,
        walk: W,
        view: View,
        codim: usize,
        partition: PartitionIteratorType,
    ) -> Self {
        Self {
            grid,
            walk,
            view,
            codim,
            partition,
            marker: None,
            expanding: None,
            current: None,
        }
    }

    /// Entity at the current position, `None` at the end.
    pub fn entity(&self) -> Option<Entity<G::Element>> {
        self.current
    }

    pub fn codim(&self) -> usize {
        self.codim
    }

    /// Move to the next matching entity.
    pub fn increment(&mut self) {
        self.current = if self.codim == 0 {
            self.next_element()
        } else {
            self.next_sub_entity()
        };
    }

    fn next_element(&mut self) -> Option<Entity<G::Element>> {
        let (grid, view, partition) = (self.grid, self.view, self.partition);
        self.walk
            .by_ref()
            .find(|&e| partition.contains(classify_element(grid, e, |n| view.contains(grid, n))))
            .map(Entity::element)
    }

    fn next_sub_entity(&mut self) -> Option<Entity<G::Element>> {
        let marker = self.marker.as_deref()?;
        loop {
            let (e, local) = match self.expanding {
                Some(pos) => pos,
                None => (self.walk.next()?, 0),
            };
            if local >= self.grid.sub_entity_count(e, self.codim) {
                self.expanding = None;
                continue;
            }
            self.expanding = Some((e, local + 1));
            let h = self.grid.sub_index(e, self.codim, local);
            if !marker.is_claimed_by(self.codim, h, self.grid.hierarchic_index(e)) {
                continue;
            }
            let matches = marker
                .incident(self.codim, h)
                .is_some_and(|incident| self.partition.accepts(&incident));
            if matches {
                return Some(Entity::sub_entity(e, self.codim, local));
            }
        }
    }
}

impl<G, W> Iterator for EntityIterator<'_, G, W>
where
    G: HierarchicGrid + ?Sized,
    W: Iterator<Item = G::Element>,
{
    type Item = Entity<G::Element>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.increment();
        Some(current)
    }
}

impl<G: HierarchicGrid + ?Sized, W> PartialEq for EntityIterator<'_, G, W> {
    fn eq(&self, other: &Self) -> bool {
        self.current == other.current
    }
}

impl<G: HierarchicGrid + ?Sized, W> std::fmt::Debug for EntityIterator<'_, G, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityIterator")
            .field("view", &self.view)
            .field("codim", &self.codim)
            .field("partition", &self.partition)
            .field("current", &self.current)
            .finish()
    }
}
