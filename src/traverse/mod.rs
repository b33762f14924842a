//! Traversal engines.
//!
//! Element walks ([`walk::LevelWalk`], [`walk::LeafWalk`]) produce the
//! elements of a view in a deterministic order; the leaf walk composes the
//! macro element list with the depth-first [`hierarchic::HierarchicCursor`].
//! [`entity_iter::EntityIterator`] expands a walk to entities of any
//! codimension, using a [`marker::MarkerVector`] to report shared
//! sub-entities once, and applies the partition filter.

pub mod entity_iter;
pub mod hierarchic;
pub mod marker;
pub mod walk;

pub use entity_iter::{EntityIterator, LeafIterator, LevelIterator};
pub use hierarchic::{HierarchicCursor, HierarchicIterator};
pub use marker::MarkerVector;
pub use walk::{LeafWalk, LevelWalk, View};
