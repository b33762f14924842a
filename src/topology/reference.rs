//! Reference simplex sub-entity table.
//!
//! For a simplex of dimension `dim`, the sub-entities of codimension `c` are
//! the subsets of `dim + 1 - c` local vertices. The table is built once per
//! grid and indexed by codimension, replacing per-(dim, codim) special cases.

use itertools::Itertools;

/// Local vertex subsets of every codimension of a reference simplex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceSimplex {
    dim: usize,
    /// `subsets[codim][i]` = sorted local vertices of sub-entity `i`.
    subsets: Vec<Vec<Vec<usize>>>,
}

impl ReferenceSimplex {
    /// Build the table for a simplex of dimension `dim` (`dim >= 1`).
    pub fn new(dim: usize) -> Self {
        let subsets = (0..=dim)
            .map(|codim| {
                (0..=dim)
                    .combinations(dim + 1 - codim)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { dim, subsets }
    }

    /// Topological dimension of the simplex.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of sub-entities of codimension `codim`.
    pub fn size(&self, codim: usize) -> usize {
        self.subsets.get(codim).map_or(0, Vec::len)
    }

    /// Local vertices of sub-entity `i` of codimension `codim`.
    pub fn sub_vertices(&self, codim: usize, i: usize) -> &[usize] {
        &self.subsets[codim][i]
    }

    /// Iterate over the local vertex subsets of codimension `codim`.
    pub fn sub_entities(&self, codim: usize) -> impl Iterator<Item = &[usize]> + '_ {
        self.subsets[codim].iter().map(Vec::as_slice)
    }
}
