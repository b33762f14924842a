//! Capability interfaces of an element forest.
//!
//! [`HierarchicGrid`] is everything the traversal engines and index sets need
//! to know about a backend: levels, the parent/child structure, raw
//! hierarchic identities of elements and their sub-entities, ownership, and
//! a level order. [`AdaptGrid`] adds the mutations an adaptation cycle drives.
//! Generic code is written only against these traits.

use crate::grid_error::GridError;
use std::fmt::Debug;
use std::hash::Hash;

/// Read-only view of a forest of nested, adaptively refined elements.
pub trait HierarchicGrid {
    /// Element handle type.
    type Element: Copy + Eq + Hash + Debug;

    /// Topological dimension of the elements.
    fn dimension(&self) -> usize;

    /// Number of coordinates per vertex.
    fn world_dimension(&self) -> usize;

    /// Deepest level holding at least one element.
    fn max_level(&self) -> usize;

    /// Level-0 elements in macro order.
    fn macro_elements(&self) -> &[Self::Element];

    /// Position of the macro element `e` in [`HierarchicGrid::macro_elements`].
    fn macro_position(&self, e: Self::Element) -> Option<usize>;

    /// Returns true if `e` refers to a live element.
    fn contains(&self, e: Self::Element) -> bool;

    /// Refinement level of `e` (0 = macro element).
    fn level(&self, e: Self::Element) -> usize;

    /// Children of `e`, in refinement order.
    fn children(&self, e: Self::Element) -> &[Self::Element];

    /// Father of `e`, `None` on level 0.
    fn father(&self, e: Self::Element) -> Option<Self::Element>;

    /// Returns true if `e` has no children.
    fn is_leaf(&self, e: Self::Element) -> bool {
        self.children(e).is_empty()
    }

    /// Codim-0 hierarchic index of `e`.
    fn hierarchic_index(&self, e: Self::Element) -> usize;

    /// Number of sub-entities of codimension `codim` of `e`.
    fn sub_entity_count(&self, e: Self::Element, codim: usize) -> usize;

    /// Hierarchic index of sub-entity `i` of codimension `codim` of `e`.
    fn sub_index(&self, e: Self::Element, codim: usize, i: usize) -> usize;

    /// Upper bound (exclusive) of the hierarchic indices of codimension `codim`.
    fn max_hierarchic_index(&self, codim: usize) -> usize;

    /// Hierarchic indices of codimension `codim` released by the last
    /// completed adaptation cycle.
    fn released_indices(&self, codim: usize) -> &[usize];

    /// Rank owning `e`.
    fn owner(&self, e: Self::Element) -> usize;

    /// Rank of the local process.
    fn rank(&self) -> usize;

    /// Elements of any level sharing at least one vertex with `e`.
    fn neighbors(&self, e: Self::Element) -> Vec<Self::Element>;

    /// Coordinates of corner `i` of `e`.
    fn corner(&self, e: Self::Element, i: usize) -> &[f64];

    /// First element of `level` in level order.
    ///
    /// The default walks depth first from the macro elements.
    fn level_first(&self, level: usize) -> Option<Self::Element> {
        self.macro_elements()
            .iter()
            .find_map(|&m| first_on_level(self, m, level))
    }

    /// Element following `e` on its level.
    ///
    /// The default climbs to the nearest ancestor with an unvisited sibling
    /// subtree and descends into it, continuing with the next macro element
    /// once a macro subtree is exhausted.
    fn level_next(&self, e: Self::Element) -> Option<Self::Element> {
        let level = self.level(e);
        let mut current = e;
        loop {
            match self.father(current) {
                Some(father) => {
                    let siblings = self.children(father);
                    let pos = siblings.iter().position(|&c| c == current)?;
                    if let Some(found) = siblings[pos + 1..]
                        .iter()
                        .find_map(|&s| first_on_level(self, s, level))
                    {
                        return Some(found);
                    }
                    current = father;
                }
                None => {
                    let pos = self.macro_position(current)?;
                    return self.macro_elements()[pos + 1..]
                        .iter()
                        .find_map(|&m| first_on_level(self, m, level));
                }
            }
        }
    }
}

/// First element on `level` in the subtree of `root`, depth first.
pub fn first_on_level<G>(grid: &G, root: G::Element, level: usize) -> Option<G::Element>
where
    G: HierarchicGrid + ?Sized,
{
    let here = grid.level(root);
    if here == level {
        return Some(root);
    }
    if here > level {
        return None;
    }
    grid.children(root)
        .iter()
        .find_map(|&c| first_on_level(grid, c, level))
}

/// Mutations driven by an adaptation cycle.
pub trait AdaptGrid: HierarchicGrid {
    /// Set the refinement mark of `e`: `> 0` refine, `< 0` coarsen, `0` keep.
    ///
    /// Returns `false` if the mark cannot take effect (non-leaf element, or
    /// coarsening a macro element).
    fn mark(&mut self, e: Self::Element, refcount: i32) -> Result<bool, GridError>;

    /// Current refinement mark of `e`.
    fn get_mark(&self, e: Self::Element) -> i32;

    /// Clear every mark.
    fn clear_marks(&mut self);

    /// Bisect the leaf `e` into two children.
    fn refine_element(&mut self, e: Self::Element) -> Result<(), GridError>;

    /// Remove the children of `e`; all of them must be leaves.
    fn coarsen_children(&mut self, e: Self::Element) -> Result<(), GridError>;

    /// Close the current adaptation cycle: indices released during the cycle
    /// become reusable and are reported by
    /// [`HierarchicGrid::released_indices`].
    fn end_adaptation(&mut self);

    /// Assign `e` (and its descendants) to `rank`.
    fn set_owner(&mut self, e: Self::Element, rank: usize) -> Result<(), GridError>;
}
