//! Data attached to leaf entities.

pub mod dof;

pub use dof::LeafDofVector;
