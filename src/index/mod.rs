//! Index management: raw hierarchic identities and the consecutive index
//! sets derived from them.

pub mod hierarchic;
pub mod leaf;
pub mod level;

pub use hierarchic::{HierarchicIndexManager, IndexStack};
pub use leaf::{AdaptiveLeafIndexSet, IndexState};
pub use level::LevelIndexSet;
