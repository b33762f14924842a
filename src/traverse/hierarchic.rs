//! Depth-first descent/backtrack cursor over one refinement tree.
//!
//! The cursor holds the path from a root to the current element as a stack
//! of frames, each remembering the next child branch to take. It is the
//! shared machinery behind hierarchic iteration (strict descendants of an
//! element) and leaf iteration (every macro tree, filtered to leaves).

use crate::forest::traits::HierarchicGrid;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CursorState {
    /// The top frame is the reported element.
    AtElement,
    /// Try to push the next unvisited child of the top frame.
    Descend,
    /// Pop the top frame.
    Backtrack,
    Done,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Frame<E> {
    element: E,
    next_child: usize,
}

/// Path from a root to the current element, depth first, bounded by a
/// maximum level.
#[derive(Clone, Debug)]
pub struct HierarchicCursor<E> {
    stack: Vec<Frame<E>>,
    max_level: usize,
    state: CursorState,
}

impl<E: Copy + Eq> HierarchicCursor<E> {
    /// A cursor that reports nothing.
    pub fn done(max_level: usize) -> Self {
        Self {
            stack: Vec::new(),
            max_level,
            state: CursorState::Done,
        }
    }

    /// Cursor positioned at `root`.
    pub fn at_root<G>(grid: &G, root: E, max_level: usize) -> Self
    where
        G: HierarchicGrid<Element = E> + ?Sized,
    {
        let depth = max_level.saturating_sub(grid.level(root)) + 1;
        let mut stack = Vec::with_capacity(depth);
        stack.push(Frame {
            element: root,
            next_child: 0,
        });
        Self {
            stack,
            max_level,
            state: CursorState::AtElement,
        }
    }

    /// Cursor positioned at the first strict descendant of `root`.
    pub fn below<G>(grid: &G, root: E, max_level: usize) -> Self
    where
        G: HierarchicGrid<Element = E> + ?Sized,
    {
        let mut cursor = Self::at_root(grid, root, max_level);
        cursor.advance(grid);
        cursor
    }

    /// The element the cursor reports, `None` once exhausted.
    pub fn current(&self) -> Option<E> {
        match self.state {
            CursorState::AtElement => self.stack.last().map(|f| f.element),
            _ => None,
        }
    }

    /// Number of frames on the path, root included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_done(&self) -> bool {
        self.state == CursorState::Done
    }

    /// Step to the next element in depth-first order.
    pub fn advance<G>(&mut self, grid: &G)
    where
        G: HierarchicGrid<Element = E> + ?Sized,
    {
        if self.state == CursorState::AtElement {
            self.state = CursorState::Descend;
        }
        loop {
            match self.state {
                CursorState::AtElement | CursorState::Done => return,
                CursorState::Descend => {
                    let Some(top) = self.stack.last_mut() else {
                        self.state = CursorState::Done;
                        continue;
                    };
                    let children = grid.children(top.element);
                    if grid.level(top.element) < self.max_level && top.next_child < children.len()
                    {
                        let child = children[top.next_child];
                        top.next_child += 1;
                        self.stack.push(Frame {
                            element: child,
                            next_child: 0,
                        });
                        self.state = CursorState::AtElement;
                    } else {
                        self.state = CursorState::Backtrack;
                    }
                }
                CursorState::Backtrack => {
                    self.stack.pop();
                    self.state = if self.stack.is_empty() {
                        CursorState::Done
                    } else {
                        CursorState::Descend
                    };
                }
            }
        }
    }
}

/// Strict descendants of one element down to a maximum level, depth first.
///
/// Two iterators compare equal when they report the same element or are
/// both exhausted.
#[derive(Debug)]
pub struct HierarchicIterator<'a, G: HierarchicGrid + ?Sized> {
    grid: &'a G,
    cursor: HierarchicCursor<G::Element>,
}

impl<'a, G: HierarchicGrid + ?Sized> HierarchicIterator<'a, G> {
    /// Positioned at the first descendant of `root` (the `hbegin` position).
    pub fn begin(grid: &'a G, root: G::Element, max_level: usize) -> Self {
        Self {
            grid,
            cursor: HierarchicCursor::below(grid, root, max_level),
        }
    }

    /// The exhausted position (the `hend` position).
    pub fn end(grid: &'a G, max_level: usize) -> Self {
        Self {
            grid,
            cursor: HierarchicCursor::done(max_level),
        }
    }

    /// Element at the current position.
    pub fn element(&self) -> Option<G::Element> {
        self.cursor.current()
    }

    /// Advance without yielding.
    pub fn increment(&mut self) {
        self.cursor.advance(self.grid);
    }
}

impl<G: HierarchicGrid + ?Sized> Clone for HierarchicIterator<'_, G> {
    fn clone(&self) -> Self {
        Self {
            grid: self.grid,
            cursor: self.cursor.clone(),
        }
    }
}

impl<G: HierarchicGrid + ?Sized> Iterator for HierarchicIterator<'_, G> {
    type Item = G::Element;

    fn next(&mut self) -> Option<G::Element> {
        let current = self.cursor.current()?;
        self.cursor.advance(self.grid);
        Some(current)
    }
}

impl<G: HierarchicGrid + ?Sized> PartialEq for HierarchicIterator<'_, G> {
    fn eq(&self, other: &Self) -> bool {
        self.element() == other.element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{AdaptGrid, GridOptions, OneDGrid};

    fn refined_pair() -> OneDGrid {
        let mut g = OneDGrid::new(&[0.0, 1.0, 2.0], GridOptions::default()).unwrap();
        let m0 = g.macro_elements()[0];
        g.refine_element(m0).unwrap();
        let c0 = g.children(m0)[0];
        g.refine_element(c0).unwrap();
        g
    }

    #[test]
    fn visits_descendants_depth_first_without_root() {
        let g = refined_pair();
        let m0 = g.macro_elements()[0];
        let [c0, c1] = [g.children(m0)[0], g.children(m0)[1]];
        let [g0, g1] = [g.children(c0)[0], g.children(c0)[1]];
        let order: Vec<_> = HierarchicIterator::begin(&g, m0, 5).collect();
        assert_eq!(order, vec![c0, g0, g1, c1]);
    }

    #[test]
    fn max_level_bounds_descent() {
        let g = refined_pair();
        let m0 = g.macro_elements()[0];
        let order: Vec<_> = HierarchicIterator::begin(&g, m0, 1).collect();
        assert_eq!(order, g.children(m0));
        assert_eq!(HierarchicIterator::begin(&g, m0, 0).count(), 0);
    }

    #[test]
    fn leaf_root_is_immediately_at_end() {
        let g = refined_pair();
        let m1 = g.macro_elements()[1];
        let it = HierarchicIterator::begin(&g, m1, 3);
        assert!(it == HierarchicIterator::end(&g, 3));
    }

    #[test]
    fn cursor_depth_follows_path() {
        let g = refined_pair();
        let m0 = g.macro_elements()[0];
        let mut cursor = HierarchicCursor::at_root(&g, m0, 2);
        assert_eq!(cursor.current(), Some(m0));
        cursor.advance(&g);
        cursor.advance(&g);
        assert_eq!(cursor.depth(), 3);
        while !cursor.is_done() {
            assert!(cursor.depth() <= 3);
            cursor.advance(&g);
        }
        assert_eq!(cursor.current(), None);
    }
}
