//! Element storage keyed by hierarchic index, and shared-vertex bookkeeping.
//!
//! [`ElementArena`] is the object pool behind every backend: acquiring a slot
//! draws a codim-0 hierarchic index from the [`HierarchicIndexManager`], and
//! releasing it hands the value back by move and returns the index to the
//! (delayed) free list. [`VertexRegistry`] keeps vertex coordinates, reference
//! counts and element incidence so that vertices shared by many elements are
//! released exactly when the last element using them disappears.

use crate::index::hierarchic::HierarchicIndexManager;
use crate::topology::element::ElementId;

/// Slot storage for elements, indexed by codim-0 hierarchic index.
#[derive(Clone, Debug)]
pub struct ElementArena<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> Default for ElementArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }
}

impl<T> ElementArena<T> {
    /// Store `value` under a freshly issued codim-0 index.
    pub fn acquire(&mut self, indices: &mut HierarchicIndexManager, value: T) -> ElementId {
        let index = indices.new_index(0);
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        debug_assert!(self.slots[index].is_none(), "slot {index} still occupied");
        self.slots[index] = Some(value);
        self.live += 1;
        ElementId::new(index)
    }

    /// Remove the element `id`, releasing its index.
    pub fn release(&mut self, indices: &mut HierarchicIndexManager, id: ElementId) -> Option<T> {
        let value = self.slots.get_mut(id.index())?.take()?;
        indices.free_index(0, id.index());
        self.live -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, id: ElementId) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (ElementId::new(i), v)))
    }

    /// Mutable iteration over live elements in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ElementId, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (ElementId::new(i), v)))
    }
}

/// Vertices shared between elements, indexed by codim-`dim` hierarchic index.
#[derive(Clone, Debug)]
pub struct VertexRegistry {
    world_dim: usize,
    codim: usize,
    coords: Vec<f64>,
    refs: Vec<u32>,
    incident: Vec<Vec<ElementId>>,
}

impl VertexRegistry {
    /// Registry for vertices with `world_dim` coordinates, using hierarchic
    /// indices of codimension `codim`.
    pub fn new(world_dim: usize, codim: usize) -> Self {
        Self {
            world_dim,
            codim,
            coords: Vec::new(),
            refs: Vec::new(),
            incident: Vec::new(),
        }
    }

    /// Create a vertex at `coord` with no users yet.
    pub fn create(&mut self, indices: &mut HierarchicIndexManager, coord: &[f64]) -> usize {
        debug_assert_eq!(coord.len(), self.world_dim);
        let v = indices.new_index(self.codim);
        if v >= self.refs.len() {
            self.refs.resize(v + 1, 0);
            self.incident.resize_with(v + 1, Vec::new);
            self.coords.resize((v + 1) * self.world_dim, 0.0);
        }
        self.coords[v * self.world_dim..(v + 1) * self.world_dim].copy_from_slice(coord);
        self.refs[v] = 0;
        self.incident[v].clear();
        v
    }

    /// Returns true if `v` names a registered vertex.
    pub fn contains(&self, indices: &HierarchicIndexManager, v: usize) -> bool {
        indices.is_allocated(self.codim, v)
    }

    /// Record that `element` uses vertex `v`.
    pub fn attach(&mut self, v: usize, element: ElementId) {
        self.refs[v] += 1;
        self.incident[v].push(element);
    }

    /// Record that `element` no longer uses `v`; releases `v` when unused.
    ///
    /// Returns true if the vertex was released.
    pub fn detach(
        &mut self,
        indices: &mut HierarchicIndexManager,
        v: usize,
        element: ElementId,
    ) -> bool {
        if let Some(pos) = self.incident[v].iter().position(|&e| e == element) {
            self.incident[v].swap_remove(pos);
        }
        self.refs[v] -= 1;
        if self.refs[v] == 0 {
            indices.free_index(self.codim, v);
            true
        } else {
            false
        }
    }

    /// Coordinates of vertex `v`.
    pub fn coord(&self, v: usize) -> &[f64] {
        &self.coords[v * self.world_dim..(v + 1) * self.world_dim]
    }

    /// Elements currently using `v`.
    pub fn incident(&self, v: usize) -> &[ElementId] {
        &self.incident[v]
    }

    pub fn world_dim(&self) -> usize {
        self.world_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_acquire_release() {
        let mut indices = HierarchicIndexManager::new(1, 64);
        let mut arena = ElementArena::default();
        let a = arena.acquire(&mut indices, "a");
        let b = arena.acquire(&mut indices, "b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.release(&mut indices, a), Some("a"));
        assert_eq!(arena.release(&mut indices, a), None);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![b]);
        indices.finish_cycle();
        let c = arena.acquire(&mut indices, "c");
        assert_eq!(c, a, "slot is recycled after the cycle closes");
    }

    #[test]
    fn vertex_released_with_last_user() {
        let mut indices = HierarchicIndexManager::new(1, 64);
        let mut verts = VertexRegistry::new(2, 1);
        let v = verts.create(&mut indices, &[0.5, 1.0]);
        let e0 = ElementId::new(0);
        let e1 = ElementId::new(1);
        verts.attach(v, e0);
        verts.attach(v, e1);
        assert_eq!(verts.incident(v).len(), 2);
        assert!(!verts.detach(&mut indices, v, e0));
        assert!(verts.contains(&indices, v));
        assert!(verts.detach(&mut indices, v, e1));
        assert!(!verts.contains(&indices, v));
        assert_eq!(verts.coord(v), &[0.5, 1.0]);
    }
}
