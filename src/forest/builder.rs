//! Macro grid builder for [`SimplexGrid`].
//!
//! Points and cells are added under caller-chosen ids; `create_grid` maps
//! point ids onto forest vertices, validates every cell and inserts the
//! cells as level-0 elements in insertion order.

use crate::forest::GridOptions;
use crate::forest::simplex::SimplexGrid;
use crate::grid_error::GridError;
use hashbrown::HashMap;

/// Builder for a level-0 simplex grid.
#[derive(Clone, Debug)]
pub struct SimplexGridBuilder<const DIM: usize> {
    options: GridOptions,
    points: Vec<[f64; DIM]>,
    point_ids_to_indices: HashMap<usize, usize>,
    cells: Vec<(Vec<usize>, usize)>,
}

impl<const DIM: usize> SimplexGridBuilder<DIM> {
    /// Create a new grid builder
    pub fn new(options: GridOptions) -> Self {
        Self {
            options,
            points: Vec::new(),
            point_ids_to_indices: HashMap::new(),
            cells: Vec::new(),
        }
    }

    /// Add a point with id `id`.
    ///
    /// # Panics
    ///
    /// Panics if a point with the same id was already added.
    pub fn add_point(&mut self, id: usize, coord: [f64; DIM]) -> &mut Self {
        if self.point_ids_to_indices.contains_key(&id) {
            panic!("Cannot add point with duplicate id {id}.");
        }
        self.point_ids_to_indices.insert(id, self.points.len());
        self.points.push(coord);
        self
    }

    /// Add a cell over point ids, owned by the local rank.
    pub fn add_cell(&mut self, point_ids: &[usize]) -> &mut Self {
        let rank = self.options.rank;
        self.add_cell_with_owner(point_ids, rank)
    }

    /// Add a cell over point ids, owned by `owner`.
    pub fn add_cell_with_owner(&mut self, point_ids: &[usize], owner: usize) -> &mut Self {
        self.cells.push((point_ids.to_vec(), owner));
        self
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Create the grid.
    ///
    /// Fails with [`GridError::ElementVertexCount`] if a cell does not have
    /// `DIM + 1` points and with [`GridError::UnknownVertex`] if it names a
    /// point id that was never added. Only `DIM` 1 to 3 is supported.
    pub fn create_grid(&self) -> Result<SimplexGrid<DIM>, GridError> {
        if !(1..=3).contains(&DIM) {
            return Err(GridError::NotImplemented(
                "simplex grids exist for dimensions 1 to 3",
            ));
        }
        let mut grid = SimplexGrid::<DIM>::new(self.options);
        let vertices: Vec<usize> = self
            .points
            .iter()
            .map(|&coord| grid.insert_vertex(coord))
            .collect();
        for (point_ids, owner) in &self.cells {
            let cell = point_ids
                .iter()
                .map(|id| {
                    self.point_ids_to_indices
                        .get(id)
                        .map(|&i| vertices[i])
                        .ok_or(GridError::UnknownVertex(*id))
                })
                .collect::<Result<Vec<_>, _>>()?;
            grid.insert_macro_element(&cell, *owner)?;
        }
        log::debug!(
            "built {}-d macro grid: {} vertices, {} elements",
            DIM,
            vertices.len(),
            self.cells.len()
        );
        Ok(grid)
    }
}

impl SimplexGridBuilder<1> {
    /// `n` equal segments covering `[0, 1]`.
    pub fn unit_interval(n: usize, options: GridOptions) -> Self {
        let mut b = Self::new(options);
        for i in 0..=n {
            b.add_point(i, [i as f64 / n.max(1) as f64]);
        }
        for i in 0..n {
            b.add_cell(&[i, i + 1]);
        }
        b
    }
}

impl SimplexGridBuilder<2> {
    /// `n x n` squares on `[0, 1]^2`, each split into two triangles along
    /// its diagonal.
    pub fn unit_square(n: usize, options: GridOptions) -> Self {
        let mut b = Self::new(options);
        let h = 1.0 / n.max(1) as f64;
        let id = |i: usize, j: usize| j * (n + 1) + i;
        for j in 0..=n {
            for i in 0..=n {
                b.add_point(id(i, j), [i as f64 * h, j as f64 * h]);
            }
        }
        for j in 0..n {
            for i in 0..n {
                let (p0, p1, p2, p3) = (id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1));
                // diagonal first so that both halves bisect it
                b.add_cell(&[p0, p2, p1]);
                b.add_cell(&[p2, p0, p3]);
            }
        }
        b
    }
}

impl SimplexGridBuilder<3> {
    /// The unit cube split into the six Kuhn tetrahedra around its main
    /// diagonal.
    pub fn unit_cube(options: GridOptions) -> Self {
        let mut b = Self::new(options);
        for k in 0..8usize {
            let c = [(k & 1) as f64, ((k >> 1) & 1) as f64, ((k >> 2) & 1) as f64];
            b.add_point(k, c);
        }
        // paths 0 -> 7 along the axes, one per permutation of (x, y, z)
        for axes in [[1, 2, 4], [1, 4, 2], [2, 1, 4], [2, 4, 1], [4, 1, 2], [4, 2, 1]] {
            let a = axes[0];
            let ab = a | axes[1];
            b.add_cell(&[0, 7, a, ab]);
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::traits::HierarchicGrid;

    #[test]
    fn unit_interval_chain() {
        let g = SimplexGridBuilder::unit_interval(4, GridOptions::default())
            .create_grid()
            .unwrap();
        assert_eq!(g.macro_elements().len(), 4);
        assert_eq!(g.max_hierarchic_index(1), 5);
        let e = g.macro_elements()[3];
        assert_eq!(g.corner(e, 0), &[0.75]);
        assert_eq!(g.corner(e, 1), &[1.0]);
    }

    #[test]
    fn unit_square_counts() {
        let g = SimplexGridBuilder::unit_square(2, GridOptions::default())
            .create_grid()
            .unwrap();
        assert_eq!(g.macro_elements().len(), 8);
        assert_eq!(g.max_hierarchic_index(2), 9);
        // 12 axis edges + 4 diagonals
        assert_eq!(g.max_hierarchic_index(1), 16);
    }

    #[test]
    fn unit_cube_is_conforming() {
        let g = SimplexGridBuilder::unit_cube(GridOptions::default())
            .create_grid()
            .unwrap();
        assert_eq!(g.macro_elements().len(), 6);
        assert_eq!(g.max_hierarchic_index(3), 8);
        // 12 cube edges + 6 face diagonals + 1 main diagonal
        assert_eq!(g.max_hierarchic_index(2), 19);
        // 12 boundary triangles + 6 interior
        assert_eq!(g.max_hierarchic_index(1), 18);
    }

    #[test]
    fn unknown_point_id_is_rejected() {
        let mut b = SimplexGridBuilder::<2>::new(GridOptions::default());
        b.add_point(0, [0.0, 0.0]).add_point(1, [1.0, 0.0]);
        b.add_cell(&[0, 1, 9]);
        assert_eq!(b.create_grid().unwrap_err(), GridError::UnknownVertex(9));
    }

    #[test]
    fn owners_are_kept() {
        let mut b = SimplexGridBuilder::<1>::new(GridOptions::default());
        b.add_point(10, [0.0]).add_point(20, [1.0]).add_point(30, [2.0]);
        b.add_cell(&[10, 20]).add_cell_with_owner(&[20, 30], 1);
        let g = b.create_grid().unwrap();
        let [a, c] = [g.macro_elements()[0], g.macro_elements()[1]];
        assert_eq!(g.owner(a), 0);
        assert_eq!(g.owner(c), 1);
    }

    #[test]
    fn four_dimensional_grid_is_not_implemented() {
        let b = SimplexGridBuilder::<4>::new(GridOptions::default());
        assert!(matches!(b.create_grid(), Err(GridError::NotImplemented(_))));
    }

    #[test]
    #[should_panic]
    fn duplicate_point_id_panics() {
        let mut b = SimplexGridBuilder::<1>::new(GridOptions::default());
        b.add_point(0, [0.0]).add_point(0, [1.0]);
    }
}
