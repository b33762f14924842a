//! Element forests: the capability traits and the concrete backends.
//!
//! - [`simplex::SimplexGrid`]: simplices of dimension 1 to 3 refined by
//!   newest-vertex bisection; level order comes from depth-first descent
//!   through the refinement trees.
//! - [`oned::OneDGrid`]: a one-dimensional grid whose levels are kept as
//!   doubly linked element lists in geometric order.

pub mod arena;
pub mod builder;
pub mod oned;
pub mod simplex;
pub mod traits;

pub use builder::SimplexGridBuilder;
pub use oned::OneDGrid;
pub use simplex::SimplexGrid;
pub use traits::{AdaptGrid, HierarchicGrid};

use crate::index::hierarchic::DEFAULT_INDEX_STACK_CAPACITY;

/// Construction options shared by all backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridOptions {
    /// Bound on the free list of each hierarchic index pool.
    pub index_stack_capacity: usize,
    /// Rank of the local process; elements owned by other ranks are foreign.
    pub rank: usize,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            index_stack_capacity: DEFAULT_INDEX_STACK_CAPACITY,
            rank: 0,
        }
    }
}
