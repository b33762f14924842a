//! Simplex forest refined by newest-vertex bisection.
//!
//! Elements are segments, triangles or tetrahedra (`DIM` = 1, 2, 3). A leaf
//! is refined by bisecting the edge between its local vertices 0 and 1; for
//! vertices `[a, b, rest..]` and midpoint `m` the children are
//! `[rest.., a, m]` and `[b, rest.., m]`, so the newest vertex always sits
//! last and the children's refinement edge is again local edge `(0, 1)`.
//! Neighbors bisecting the same edge share its midpoint. No conformity
//! closure is applied: refining one element of a pair leaves a hanging
//! vertex on the common edge.
//!
//! Vertices, and for `DIM >= 2` edges and faces, are registered with their
//! own hierarchic index pools and released with the last element using them.

use crate::forest::GridOptions;
use crate::forest::arena::{ElementArena, VertexRegistry};
use crate::forest::traits::{AdaptGrid, HierarchicGrid};
use crate::grid_error::GridError;
use crate::index::hierarchic::HierarchicIndexManager;
use crate::topology::element::ElementId;
use crate::topology::reference::ReferenceSimplex;
use hashbrown::HashMap;

#[derive(Clone, Debug)]
struct SimplexElement {
    level: usize,
    father: Option<ElementId>,
    children: Vec<ElementId>,
    /// Vertex hierarchic indices in local order.
    vertices: Vec<usize>,
    /// `sub[c - 1]` = hierarchic indices of the codim-`c` sub-entities, `0 < c < DIM`.
    sub: Vec<Vec<usize>>,
    owner: usize,
    mark: i32,
    macro_pos: Option<usize>,
}

/// Reference-counted edges or faces keyed by their sorted vertex indices.
#[derive(Clone, Debug, Default)]
struct SubEntityRegistry {
    codim: usize,
    by_key: HashMap<Vec<usize>, (usize, u32)>,
    key_of: HashMap<usize, Vec<usize>>,
}

impl SubEntityRegistry {
    fn new(codim: usize) -> Self {
        Self {
            codim,
            ..Self::default()
        }
    }

    fn attach(&mut self, indices: &mut HierarchicIndexManager, key: Vec<usize>) -> usize {
        if let Some((index, refs)) = self.by_key.get_mut(&key) {
            *refs += 1;
            return *index;
        }
        let index = indices.new_index(self.codim);
        self.key_of.insert(index, key.clone());
        self.by_key.insert(key, (index, 1));
        index
    }

    fn detach(&mut self, indices: &mut HierarchicIndexManager, index: usize) {
        let Some(key) = self.key_of.get(&index) else {
            return;
        };
        let released = match self.by_key.get_mut(key) {
            Some((_, refs)) => {
                *refs -= 1;
                *refs == 0
            }
            None => false,
        };
        if released {
            if let Some(key) = self.key_of.remove(&index) {
                self.by_key.remove(&key);
            }
            indices.free_index(self.codim, index);
        }
    }
}

/// A forest of `DIM`-simplices refined by bisection.
#[derive(Clone, Debug)]
pub struct SimplexGrid<const DIM: usize> {
    reference: ReferenceSimplex,
    indices: HierarchicIndexManager,
    elements: ElementArena<SimplexElement>,
    vertices: VertexRegistry,
    /// Registries for codimensions `1..DIM`.
    sub_entities: Vec<SubEntityRegistry>,
    /// Refinement edge (sorted vertex pair) -> midpoint vertex.
    midpoints: HashMap<(usize, usize), usize>,
    midpoint_edge: HashMap<usize, (usize, usize)>,
    macros: Vec<ElementId>,
    /// Number of live elements per level.
    level_counts: Vec<usize>,
    rank: usize,
}

impl<const DIM: usize> SimplexGrid<DIM> {
    /// Empty forest; macro elements are added with [`Self::insert_vertex`] and
    /// [`Self::insert_macro_element`], usually through
    /// [`crate::forest::SimplexGridBuilder`].
    pub fn new(options: GridOptions) -> Self {
        assert!((1..=3).contains(&DIM), "SimplexGrid supports DIM = 1, 2, 3");
        Self {
            reference: ReferenceSimplex::new(DIM),
            indices: HierarchicIndexManager::new(DIM, options.index_stack_capacity),
            elements: ElementArena::default(),
            vertices: VertexRegistry::new(DIM, DIM),
            sub_entities: (1..DIM).map(SubEntityRegistry::new).collect(),
            midpoints: HashMap::new(),
            midpoint_edge: HashMap::new(),
            macros: Vec::new(),
            level_counts: Vec::new(),
            rank: options.rank,
        }
    }

    /// Add a macro vertex and return its hierarchic index.
    pub fn insert_vertex(&mut self, coord: [f64; DIM]) -> usize {
        self.vertices.create(&mut self.indices, &coord)
    }

    /// Add a level-0 element over previously inserted vertices.
    pub fn insert_macro_element(
        &mut self,
        vertices: &[usize],
        owner: usize,
    ) -> Result<ElementId, GridError> {
        if vertices.len() != DIM + 1 {
            return Err(GridError::ElementVertexCount {
                expected: DIM + 1,
                found: vertices.len(),
            });
        }
        if let Some(&v) = vertices
            .iter()
            .find(|&&v| !self.vertices.contains(&self.indices, v))
        {
            return Err(GridError::UnknownVertex(v));
        }
        let pos = self.macros.len();
        let id = self.create_element(vertices.to_vec(), 0, None, owner, Some(pos));
        self.macros.push(id);
        Ok(id)
    }

    /// Number of live elements on `level`.
    pub fn level_element_count(&self, level: usize) -> usize {
        self.level_counts.get(level).copied().unwrap_or(0)
    }

    /// Number of live elements on all levels.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Vertex hierarchic indices of `e` in local order.
    pub fn element_vertices(&self, e: ElementId) -> &[usize] {
        &self.elem(e).vertices
    }

    /// The index pools of this forest.
    pub fn index_manager(&self) -> &HierarchicIndexManager {
        &self.indices
    }

    fn elem(&self, e: ElementId) -> &SimplexElement {
        self.elements
            .get(e)
            .unwrap_or_else(|| panic!("stale element handle {e}"))
    }

    fn elem_mut(&mut self, e: ElementId) -> Result<&mut SimplexElement, GridError> {
        self.elements
            .get_mut(e)
            .ok_or(GridError::InvalidElement(e.index()))
    }

    fn create_element(
        &mut self,
        vertices: Vec<usize>,
        level: usize,
        father: Option<ElementId>,
        owner: usize,
        macro_pos: Option<usize>,
    ) -> ElementId {
        let mut sub = Vec::with_capacity(DIM.saturating_sub(1));
        for codim in 1..DIM {
            let registry = &mut self.sub_entities[codim - 1];
            let indices: Vec<usize> = self
                .reference
                .sub_entities(codim)
                .map(|local| {
                    let mut key: Vec<usize> = local.iter().map(|&l| vertices[l]).collect();
                    key.sort_unstable();
                    registry.attach(&mut self.indices, key)
                })
                .collect();
            sub.push(indices);
        }
        let data = SimplexElement {
            level,
            father,
            children: Vec::new(),
            vertices: vertices.clone(),
            sub,
            owner,
            mark: 0,
            macro_pos,
        };
        let id = self.elements.acquire(&mut self.indices, data);
        for &v in &vertices {
            self.vertices.attach(v, id);
        }
        if self.level_counts.len() <= level {
            self.level_counts.resize(level + 1, 0);
        }
        self.level_counts[level] += 1;
        id
    }

    fn destroy_element(&mut self, e: ElementId) {
        let Some(data) = self.elements.release(&mut self.indices, e) else {
            return;
        };
        for &v in &data.vertices {
            if self.vertices.detach(&mut self.indices, v, e) {
                if let Some(edge) = self.midpoint_edge.remove(&v) {
                    self.midpoints.remove(&edge);
                }
            }
        }
        for (registry, indices) in self.sub_entities.iter_mut().zip(&data.sub) {
            for &i in indices {
                registry.detach(&mut self.indices, i);
            }
        }
        self.level_counts[data.level] -= 1;
        while self.level_counts.last() == Some(&0) {
            self.level_counts.pop();
        }
    }

    fn midpoint(&mut self, a: usize, b: usize) -> usize {
        let edge = (a.min(b), a.max(b));
        if let Some(&m) = self.midpoints.get(&edge) {
            return m;
        }
        let mut coord = [0.0; DIM];
        for (k, c) in coord.iter_mut().enumerate() {
            *c = 0.5 * (self.vertices.coord(a)[k] + self.vertices.coord(b)[k]);
        }
        let m = self.vertices.create(&mut self.indices, &coord);
        self.midpoints.insert(edge, m);
        self.midpoint_edge.insert(m, edge);
        m
    }
}

impl<const DIM: usize> HierarchicGrid for SimplexGrid<DIM> {
    type Element = ElementId;

    fn dimension(&self) -> usize {
        DIM
    }

    fn world_dimension(&self) -> usize {
        self.vertices.world_dim()
    }

    fn max_level(&self) -> usize {
        self.level_counts.len().saturating_sub(1)
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
        self.reference.size(codim)
    }

    fn sub_index(&self, e: ElementId, codim: usize, i: usize) -> usize {
        match codim {
            0 => e.index(),
            c if c == DIM => self.elem(e).vertices[i],
            c => self.elem(e).sub[c - 1][i],
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
}

impl<const DIM: usize> AdaptGrid for SimplexGrid<DIM> {
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
        let (level, owner) = (data.level, data.owner);
        let vs = data.vertices.clone();
        let (a, b, rest) = (vs[0], vs[1], &vs[2..]);
        let m = self.midpoint(a, b);

        let mut first: Vec<usize> = rest.to_vec();
        first.extend([a, m]);
        let mut second = vec![b];
        second.extend_from_slice(rest);
        second.push(m);

        let c0 = self.create_element(first, level + 1, Some(e), owner, None);
        let c1 = self.create_element(second, level + 1, Some(e), owner, None);
        self.elem_mut(e)?.children = vec![c0, c1];
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

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> SimplexGrid<2> {
        let mut g = SimplexGrid::<2>::new(GridOptions::default());
        let v: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
            .into_iter()
            .map(|c| g.insert_vertex(c))
            .collect();
        g.insert_macro_element(&[v[0], v[2], v[1]], 0).unwrap();
        g.insert_macro_element(&[v[2], v[0], v[3]], 0).unwrap();
        g
    }

    #[test]
    fn macro_grid_shares_diagonal_edge() {
        let g = two_triangles();
        assert_eq!(g.max_level(), 0);
        assert_eq!(g.max_hierarchic_index(0), 2);
        assert_eq!(g.max_hierarchic_index(1), 5);
        assert_eq!(g.max_hierarchic_index(2), 4);
        let [a, b] = [g.macro_elements()[0], g.macro_elements()[1]];
        // Local edge (0, 1) is the diagonal in both triangles.
        assert_eq!(g.sub_index(a, 1, 0), g.sub_index(b, 1, 0));
        assert_eq!(g.neighbors(a), vec![b]);
    }

    #[test]
    fn bisection_shares_midpoint_between_neighbors() {
        let mut g = two_triangles();
        let [a, b] = [g.macro_elements()[0], g.macro_elements()[1]];
        g.refine_element(a).unwrap();
        g.refine_element(b).unwrap();
        assert_eq!(g.max_level(), 1);
        assert_eq!(g.level_element_count(1), 4);
        // one new vertex (the shared midpoint of the diagonal)
        assert_eq!(g.max_hierarchic_index(2), 5);
        let ca = g.children(a)[0];
        let cb = g.children(b)[0];
        assert_eq!(g.element_vertices(ca)[2], g.element_vertices(cb)[2]);
        assert_eq!(g.corner(ca, 2), &[0.5, 0.5]);
    }

    #[test]
    fn refine_non_leaf_fails() {
        let mut g = two_triangles();
        let a = g.macro_elements()[0];
        g.refine_element(a).unwrap();
        assert_eq!(g.refine_element(a), Err(GridError::NotLeaf(a.index())));
    }

    #[test]
    fn coarsening_releases_children_and_midpoint() {
        let mut g = two_triangles();
        let a = g.macro_elements()[0];
        g.refine_element(a).unwrap();
        let kids = g.children(a).to_vec();
        g.coarsen_children(a).unwrap();
        assert!(g.is_leaf(a));
        assert_eq!(g.max_level(), 0);
        assert!(kids.iter().all(|&k| !g.contains(k)));
        g.end_adaptation();
        assert_eq!(g.released_indices(0).len(), 2);
        assert_eq!(g.released_indices(2).len(), 1);
        // the bisecting edge and the two half edges of the diagonal
        assert_eq!(g.released_indices(1).len(), 3);
    }

    #[test]
    fn coarsening_unrefined_element_fails() {
        let mut g = two_triangles();
        let a = g.macro_elements()[0];
        assert_eq!(g.coarsen_children(a), Err(GridError::NotRefined(a.index())));
    }

    #[test]
    fn marks_respect_leaf_and_level() {
        let mut g = two_triangles();
        let a = g.macro_elements()[0];
        assert!(!g.mark(a, -1).unwrap(), "macro elements cannot be coarsened");
        assert!(g.mark(a, 1).unwrap());
        assert_eq!(g.get_mark(a), 1);
        g.refine_element(a).unwrap();
        assert_eq!(g.get_mark(a), 0);
        assert!(!g.mark(a, 1).unwrap());
        let child = g.children(a)[0];
        assert!(g.mark(child, -3).unwrap());
        assert_eq!(g.get_mark(child), -1);
        g.clear_marks();
        assert_eq!(g.get_mark(child), 0);
    }

    #[test]
    fn default_level_order_is_depth_first() {
        let mut g = two_triangles();
        let [a, b] = [g.macro_elements()[0], g.macro_elements()[1]];
        g.refine_element(a).unwrap();
        g.refine_element(b).unwrap();
        let a0 = g.children(a)[0];
        g.refine_element(a0).unwrap();
        let mut order = Vec::new();
        let mut cur = g.level_first(1);
        while let Some(e) = cur {
            order.push(e);
            cur = g.level_next(e);
        }
        let expected: Vec<_> = g.children(a).iter().chain(g.children(b)).copied().collect();
        assert_eq!(order, expected);
        assert_eq!(g.level_first(2), Some(g.children(a0)[0]));
        assert_eq!(g.level_first(3), None);
    }

    #[test]
    fn set_owner_propagates_to_descendants() {
        let mut g = two_triangles();
        let a = g.macro_elements()[0];
        g.refine_element(a).unwrap();
        g.set_owner(a, 4).unwrap();
        assert!(g.children(a).iter().all(|&c| g.owner(c) == 4));
    }

    #[test]
    fn tetrahedron_sub_entity_counts() {
        let mut g = SimplexGrid::<3>::new(GridOptions::default());
        let v: Vec<_> = [[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
            .into_iter()
            .map(|c| g.insert_vertex(c))
            .collect();
        let t = g.insert_macro_element(&v, 0).unwrap();
        assert_eq!(g.max_hierarchic_index(1), 4);
        assert_eq!(g.max_hierarchic_index(2), 6);
        g.refine_element(t).unwrap();
        assert_eq!(g.max_hierarchic_index(3), 5);
        assert_eq!(g.sub_entity_count(g.children(t)[0], 2), 6);
    }

    #[test]
    fn wrong_vertex_count_is_rejected() {
        let mut g = SimplexGrid::<2>::new(GridOptions::default());
        let v = g.insert_vertex([0.0, 0.0]);
        assert_eq!(
            g.insert_macro_element(&[v, v], 0),
            Err(GridError::ElementVertexCount {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            g.insert_macro_element(&[v, 7, 8], 0),
            Err(GridError::UnknownVertex(7))
        );
    }
}
