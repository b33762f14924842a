//! Element walks: the codim-0 skeleton every entity traversal is built on.

use crate::forest::traits::HierarchicGrid;
use crate::traverse::hierarchic::HierarchicCursor;

/// The set of elements a traversal ranges over.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum View {
    /// Every element of one level.
    Level(usize),
    /// Leaves up to a maximum level; elements exactly on the maximum level
    /// count as leaves.
    Leaf(usize),
}

impl View {
    /// Returns true if `e` belongs to this view.
    pub fn contains<G>(self, grid: &G, e: G::Element) -> bool
    where
        G: HierarchicGrid + ?Sized,
    {
        let level = grid.level(e);
        match self {
            View::Level(l) => level == l,
            View::Leaf(max) => level == max || (level < max && grid.is_leaf(e)),
        }
    }
}

/// Elements of one level in level order.
#[derive(Debug)]
pub struct LevelWalk<'a, G: HierarchicGrid + ?Sized> {
    grid: &'a G,
    next: Option<G::Element>,
}

impl<'a, G: HierarchicGrid + ?Sized> LevelWalk<'a, G> {
    pub fn new(grid: &'a G, level: usize) -> Self {
        Self {
            grid,
            next: grid.level_first(level),
        }
    }

    /// A walk that yields nothing.
    pub fn exhausted(grid: &'a G) -> Self {
        Self { grid, next: None }
    }
}

impl<G: HierarchicGrid + ?Sized> Clone for LevelWalk<'_, G> {
    fn clone(&self) -> Self {
        Self {
            grid: self.grid,
            next: self.next,
        }
    }
}

impl<G: HierarchicGrid + ?Sized> Iterator for LevelWalk<'_, G> {
    type Item = G::Element;

    fn next(&mut self) -> Option<G::Element> {
        let current = self.next?;
        self.next = self.grid.level_next(current);
        Some(current)
    }
}

/// Leaves up to a maximum level: each macro element's tree is walked with a
/// [`HierarchicCursor`] (root included) and non-leaf positions are skipped.
#[derive(Debug)]
pub struct LeafWalk<'a, G: HierarchicGrid + ?Sized> {
    grid: &'a G,
    max_level: usize,
    /// Position of the macro element whose tree the cursor walks.
    macro_pos: usize,
    cursor: HierarchicCursor<G::Element>,
}

impl<'a, G: HierarchicGrid + ?Sized> LeafWalk<'a, G> {
    pub fn new(grid: &'a G, max_level: usize) -> Self {
        let mut walk = Self {
            grid,
            max_level,
            macro_pos: 0,
            cursor: HierarchicCursor::done(max_level),
        };
        if let Some(&root) = grid.macro_elements().first() {
            walk.cursor = HierarchicCursor::at_root(grid, root, max_level);
        }
        walk.settle();
        walk
    }

    pub fn exhausted(grid: &'a G, max_level: usize) -> Self {
        Self {
            grid,
            max_level,
            macro_pos: grid.macro_elements().len(),
            cursor: HierarchicCursor::done(max_level),
        }
    }

    fn reportable(&self, e: G::Element) -> bool {
        View::Leaf(self.max_level).contains(self.grid, e)
    }

    /// Step until the cursor reports a leaf or every macro tree is exhausted.
    fn settle(&mut self) {
        loop {
            match self.cursor.current() {
                Some(e) if self.reportable(e) => return,
                Some(_) => self.cursor.advance(self.grid),
                None => {
                    self.macro_pos += 1;
                    let Some(&root) = self.grid.macro_elements().get(self.macro_pos) else {
                        return;
                    };
                    self.cursor = HierarchicCursor::at_root(self.grid, root, self.max_level);
                }
            }
        }
    }
}

impl<G: HierarchicGrid + ?Sized> Clone for LeafWalk<'_, G> {
    fn clone(&self) -> Self {
        Self {
            grid: self.grid,
            max_level: self.max_level,
            macro_pos: self.macro_pos,
            cursor: self.cursor.clone(),
        }
    }
}

impl<G: HierarchicGrid + ?Sized> Iterator for LeafWalk<'_, G> {
    type Item = G::Element;

    fn next(&mut self) -> Option<G::Element> {
        let current = self.cursor.current()?;
        self.cursor.advance(self.grid);
        self.settle();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{AdaptGrid, GridOptions, SimplexGridBuilder};

    #[test]
    fn level_walk_of_empty_grid_is_empty() {
        let g = SimplexGridBuilder::<2>::new(GridOptions::default())
            .create_grid()
            .unwrap();
        assert_eq!(LevelWalk::new(&g, 0).count(), 0);
        assert_eq!(LeafWalk::new(&g, 0).count(), 0);
    }

    #[test]
    fn leaf_walk_skips_refined_elements() {
        let mut g = SimplexGridBuilder::unit_interval(3, GridOptions::default())
            .create_grid()
            .unwrap();
        let m = g.macro_elements().to_vec();
        g.refine_element(m[1]).unwrap();
        let kids = g.children(m[1]).to_vec();
        g.refine_element(kids[0]).unwrap();
        let grand = g.children(kids[0]).to_vec();

        let leaves: Vec<_> = LeafWalk::new(&g, g.max_level()).collect();
        assert_eq!(leaves, vec![m[0], grand[0], grand[1], kids[1], m[2]]);

        // a truncated view treats level-1 elements as leaves
        let truncated: Vec<_> = LeafWalk::new(&g, 1).collect();
        assert_eq!(truncated, vec![m[0], kids[0], kids[1], m[2]]);
    }

    #[test]
    fn view_membership() {
        let mut g = SimplexGridBuilder::unit_interval(1, GridOptions::default())
            .create_grid()
            .unwrap();
        let m = g.macro_elements()[0];
        g.refine_element(m).unwrap();
        let child = g.children(m)[0];
        assert!(View::Level(0).contains(&g, m));
        assert!(!View::Leaf(1).contains(&g, m));
        assert!(View::Leaf(0).contains(&g, m));
        assert!(View::Leaf(1).contains(&g, child));
        assert!(!View::Leaf(0).contains(&g, child));
    }
}
