//! One-dimensional adaptive grid.
//!
//! Every level keeps its elements in a doubly linked list in geometric order
//! (left to right). Refining an element splits it at its midpoint; the two
//! children are linked into the next level right after the last child of the
//! nearest refined element to the left, so each level list stays sorted
//! without a global renumbering. Level order is read directly off the lists.

use crate::forest::GridOptions;
use crate::forest::arena::{ElementArena, VertexRegistry};
use crate::forest::traits::{AdaptGrid, HierarchicGrid};
use crate::grid_error::GridError;
use crate::index::hierarchic::HierarchicIndexManager;
use crate::topology::element::ElementId;

#[derive(Clone, Debug)]
struct OneDElement {
    level: usize,
    father: Option<ElementId>,
    children: Vec<ElementId>,
    /// Left and right vertex.
    vertices: [usize; 2],
    owner: usize,
    mark: i32,
    macro_pos: Option<usize>,
    prev: Option<ElementId>,
    next: Option<ElementId>,
}

#[derive(Clone, Copy, Debug, Default)]
struct LevelList {
    head: Option<ElementId>,
    tail: Option<ElementId>,
    len: usize,
}

/// Adaptive grid of line segments with per-level element lists.
#[derive(Clone, Debug)]
pub struct OneDGrid {
    indices: HierarchicIndexManager,
    elements: ElementArena<OneDElement>,
    vertices: VertexRegistry,
    macros: Vec<ElementId>,
    levels: Vec<LevelList>,
    rank: usize,
}

impl OneDGrid {
    /// Grid on the strictly increasing vertex positions `coords`, one macro
    /// element per consecutive pair, all owned by the local rank.
    pub fn new(coords: &[f64], options: GridOptions) -> Result<Self, GridError> {
        if let Some(position) = coords.windows(2).position(|w| w[0] >= w[1]) {
            return Err(GridError::NonIncreasingCoordinates {
                position: position + 1,
            });
        }
        let mut grid = Self {
            indices: HierarchicIndexManager::new(1, options.index_stack_capacity),
            elements: ElementArena::default(),
            vertices: VertexRegistry::new(1, 1),
            macros: Vec::new(),
            levels: Vec::new(),
            rank: options.rank,
        };
        let vs: Vec<usize> = coords
            .iter()
            .map(|&x| grid.vertices.create(&mut grid.indices, &[x]))
            .collect();
        for (pos, pair) in vs.windows(2).enumerate() {
            let tail = grid.levels.first().and_then(|l| l.tail);
            let id = grid.create_element([pair[0], pair[1]], 0, None, options.rank, Some(pos));
            grid.link_after(0, tail, id);
            grid.macros.push(id);
        }
        Ok(grid)
    }

    /// Number of live elements on `level`.
    pub fn level_element_count(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, |l| l.len)
    }

    /// The index pools of this grid.
    pub fn index_manager(&self) -> &HierarchicIndexManager {
        &self.indices
    }

    /// Left and right vertex positions of `e`.
    pub fn interval(&self, e: ElementId) -> (f64, f64) {
        let [l, r] = self.elem(e).vertices;
        (self.vertices.coord(l)[0], self.vertices.coord(r)[0])
    }

    fn elem(&self, e: ElementId) -> &OneDElement {
        self.elements
            .get(e)
            .unwrap_or_else(|| panic!("stale element handle {e}"))
    }

    fn elem_mut(&mut self, e: ElementId) -> Result<&mut OneDElement, GridError> {
        self.elements
            .get_mut(e)
            .ok_or(GridError::InvalidElement(e.index()))
    }

    fn create_element(
        &mut self,
        vertices: [usize; 2],
        level: usize,
        father: Option<ElementId>,
        owner: usize,
        macro_pos: Option<usize>,
    ) -> ElementId {
        let data = OneDElement {
            level,
            father,
            children: Vec::new(),
            vertices,
            owner,
            mark: 0,
            macro_pos,
            prev: None,
            next: None,
        };
        let id = self.elements.acquire(&mut self.indices, data);
        for v in vertices {
            self.vertices.attach(v, id);
        }
        id
    }

    /// Insert `e` into the list of `level` after `after` (at the head if `None`).
    fn link_after(&mut self, level: usize, after: Option<ElementId>, e: ElementId) {
        if self.levels.len() <= level {
            self.levels.resize(level + 1, LevelList::default());
        }
        let next = match after {
            Some(a) => self.elem(a).next,
            None => self.levels[level].head,
        };
        if let Some(data) = self.elements.get_mut(e) {
            data.prev = after;
            data.next = next;
        }
        match after.and_then(|a| self.elements.get_mut(a)) {
            Some(a) => a.next = Some(e),
            None => self.levels[level].head = Some(e),
        }
        match next.and_then(|n| self.elements.get_mut(n)) {
            Some(n) => n.prev = Some(e),
            None => self.levels[level].tail = Some(e),
        }
        self.levels[level].len += 1;
    }

    fn unlink(&mut self, e: ElementId) {
        let (level, prev, next) = {
            let data = self.elem(e);
            (data.level, data.prev, data.next)
        };
        match prev.and_then(|p| self.elements.get_mut(p)) {
            Some(p) => p.next = next,
            None => self.levels[level].head = next,
        }
        match next.and_then(|n| self.elements.get_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.levels[level].tail = prev,
        }
        self.levels[level].len -= 1;
        while self.levels.last().is_some_and(|l| l.len == 0) {
            self.levels.pop();
        }
    }

    /// Last child of the nearest refined element left of `e` on its level.
    fn insertion_point(&self, e: ElementId) -> Option<ElementId> {
        let mut cur = self.elem(e).prev;
        while let Some(p) = cur {
            let data = self.elem(p);
            if let Some(&last) = data.children.last() {
                return Some(last);
            }
            cur = data.prev;
        }
        None
    }

    fn destroy_element(&mut self, e: ElementId) {
        self.unlink(e);
        if let Some(data) = self.elements.release(&mut self.indices, e) {
            for v in data.vertices {
                self.vertices.detach(&mut self.indices, v, e);
            }
        }
    }
}

impl HierarchicGrid for OneDGrid {
    type Element = ElementId;

    fn dimension(&self) -> usize {
        1
    }

    fn world_dimension(&self) -> usize {
        1
    }

    fn max_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    fn macro_elements(&self) -> &[ElementId] {
        &self.macros
    }

    fn macro_position(&self, e: ElementId) -> Option<usize> {
        self.elements.get(e).and_then(|d| d.macro_pos)
    }

    fn contains(&self, e: ElementId) -> bool {
        self.elements.get(e).is_some()
    }

    fn level(&self, e: ElementId) -> usize {
        self.elem(e).level
    }

    fn children(&self, e: ElementId) -> &[ElementId] {
        &self.elem(e).children
    }

    fn father(&self, e: ElementId) -> Option<ElementId> {
        self.elem(e).father
    }

    fn hierarchic_index(&self, e: ElementId) -> usize {
        e.index()
    }

    fn sub_entity_count(&self, _e: ElementId, codim: usize) -> usize {
        match codim {
            0 => 1,
            1 => 2,
            _ => 0,
        }
    }

    fn sub_index(&self, e: ElementId, codim: usize, i: usize) -> usize {
        match codim {
            0 => e.index(),
            _ => self.elem(e).vertices[i],
        }
    }

    fn max_hierarchic_index(&self, codim: usize) -> usize {
        self.indices.max_index(codim)
    }

    fn released_indices(&self, codim: usize) -> &[usize] {
        self.indices.released(codim)
    }

    fn owner(&self, e: ElementId) -> usize {
        self.elem(e).owner
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn neighbors(&self, e: ElementId) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = self
            .elem(e)
            .vertices
            .iter()
            .flat_map(|&v| self.vertices.incident(v).iter().copied())
            .filter(|&n| n != e)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn corner(&self, e: ElementId, i: usize) -> &[f64] {
        self.vertices.coord(self.elem(e).vertices[i])
    }

    fn level_first(&self, level: usize) -> Option<ElementId> {
        self.levels.get(level).and_then(|l| l.head)
    }

    fn level_next(&self, e: ElementId) -> Option<ElementId> {
        self.elem(e).next
    }
}

impl AdaptGrid for OneDGrid {
    fn mark(&mut self, e: ElementId, refcount: i32) -> Result<bool, GridError> {
        let data = self.elem_mut(e)?;
        if !data.children.is_empty() || (refcount < 0 && data.level == 0) {
            return Ok(false);
        }
        data.mark = refcount.signum();
        Ok(true)
    }

    fn get_mark(&self, e: ElementId) -> i32 {
        self.elements.get(e).map_or(0, |d| d.mark)
    }

    fn clear_marks(&mut self) {
        for (_, data) in self.elements.iter_mut() {
            data.mark = 0;
        }
    }

    fn refine_element(&mut self, e: ElementId) -> Result<(), GridError> {
        let data = self.elem_mut(e)?;
        if !data.children.is_empty() {
            return Err(GridError::NotLeaf(e.index()));
        }
        data.mark = 0;
        let (level, owner, [l, r]) = (data.level, data.owner, data.vertices);
        let x = 0.5 * (self.vertices.coord(l)[0] + self.vertices.coord(r)[0]);
        let m = self.vertices.create(&mut self.indices, &[x]);

        let left = self.create_element([l, m], level + 1, Some(e), owner, None);
        let right = self.create_element([m, r], level + 1, Some(e), owner, None);
        let after = self.insertion_point(e);
        self.link_after(level + 1, after, left);
        self.link_after(level + 1, Some(left), right);
        self.elem_mut(e)?.children = vec![left, right];
        Ok(())
    }

    fn coarsen_children(&mut self, e: ElementId) -> Result<(), GridError> {
        let children = self.elem_mut(e)?.children.clone();
        if children.is_empty() || children.iter().any(|&c| !self.is_leaf(c)) {
            return Err(GridError::NotRefined(e.index()));
        }
        for c in children {
            self.destroy_element(c);
        }
        let data = self.elem_mut(e)?;
        data.children.clear();
        data.mark = 0;
        Ok(())
    }

    fn end_adaptation(&mut self) {
        self.indices.finish_cycle();
    }

    fn set_owner(&mut self, e: ElementId, rank: usize) -> Result<(), GridError> {
        let mut stack = vec![e];
        while let Some(cur) = stack.pop() {
            let data = self.elem_mut(cur)?;
            data.owner = rank;
            stack.extend(data.children.iter().copied());
        }
        Ok(())
    }
}
