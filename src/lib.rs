#![cfg_attr(docsrs, feature(doc_cfg))]
//! # hgrid
//!
//! hgrid provides hierarchical traversal and consecutive indexing for
//! adaptively refined unstructured grids, the bookkeeping layer that sits
//! between an element forest and the numerical data attached to it.
//!
//! ## Features
//! - Forest backends: simplices of dimension 1 to 3 refined by bisection, and
//!   a one-dimensional grid with geometric level lists
//! - Hierarchic index pools with delayed, smallest-first reuse
//! - Level, leaf and hierarchic traversals of entities of every codimension,
//!   filtered by partition type
//! - Level index sets recomputed lazily per adaptation cycle
//! - An adaptive leaf index set that keeps indices stable across refinement
//!   and compacts on request, reporting relocations so data can follow
//! - XDR persistence of index state
//!
//! ## Determinism
//!
//! Traversal order is a pure function of the forest: macro order, then
//! depth-first refinement order. Index assignment follows traversal order, so
//! two runs over the same adaptation history produce identical indices.
//!
//! ## Usage
//!
//! ```
//! use hgrid::prelude::*;
//!
//! let forest = SimplexGridBuilder::unit_square(2, GridOptions::default())
//!     .create_grid()
//!     .unwrap();
//! let mut grid = Grid::new(forest).unwrap();
//! grid.global_refine(1).unwrap();
//! grid.compress().unwrap();
//! let leaves = grid.leafbegin(0, PartitionIteratorType::All, grid.max_level()).unwrap();
//! assert_eq!(leaves.count(), grid.leaf_size(0));
//! ```

pub mod adapt;
pub mod data;
pub mod debug_invariants;
pub mod forest;
pub mod grid;
pub mod grid_error;
pub mod index;
pub mod io;
pub mod topology;
pub mod traverse;

pub use debug_invariants::DebugInvariants;
pub use grid::Grid;
pub use grid_error::GridError;
pub use topology::element::{ElementId, Entity};

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::adapt::{AdaptReport, AdaptivityOptions};
    pub use crate::data::LeafDofVector;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::forest::{
        AdaptGrid, GridOptions, HierarchicGrid, OneDGrid, SimplexGrid, SimplexGridBuilder,
    };
    pub use crate::grid::Grid;
    pub use crate::grid_error::GridError;
    pub use crate::index::{AdaptiveLeafIndexSet, HierarchicIndexManager, IndexState, LevelIndexSet};
    pub use crate::topology::cache::InvalidateCache;
    pub use crate::topology::element::{ElementId, Entity};
    pub use crate::topology::partition::{PartitionIteratorType, PartitionType};
    pub use crate::traverse::{HierarchicIterator, LeafIterator, LevelIterator, MarkerVector};
}
