//! Element handles, reference elements and partition classification.
//!
//! - [`element`]: `ElementId` and the codimension-generic `Entity`
//! - [`reference`]: sub-entity numbering of the reference simplices
//! - [`partition`]: partition types and the iterator filters
//! - [`cache`]: per-level lazily computed caches and their invalidation

pub mod cache;
pub mod element;
pub mod partition;
pub mod reference;

pub use cache::{InvalidateCache, LevelCache};
pub use element::{ElementId, Entity};
pub use partition::{PartitionIteratorType, PartitionType};
