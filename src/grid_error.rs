//! GridError: Unified error type for hgrid public APIs
//!
//! Every fallible traversal, indexing, adaptation and persistence call returns
//! this error. Contract violations surface immediately at the direct caller;
//! nothing in the crate retries or recovers.

use thiserror::Error;

/// Unified error type for grid operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    /// A level beyond the current maximum level was requested.
    #[error("level {level} requested but the grid's maximum level is {max_level}")]
    LevelOutOfRange { level: usize, max_level: usize },
    /// An entity from another level was looked up in a level index set.
    #[error("entity on level {found} looked up in the index set of level {expected}")]
    LevelMismatch { expected: usize, found: usize },
    /// Codimension outside `0..=dim`.
    #[error("codimension {codim} is invalid for a grid of dimension {dim}")]
    InvalidCodim { codim: usize, dim: usize },
    /// A hierarchic index beyond the allocated index arrays (missing `resize`).
    #[error("hierarchic index {index} outside allocated range {len} for codim {codim}")]
    IndexOutOfRange {
        codim: usize,
        index: usize,
        len: usize,
    },
    /// The entity has no index assigned in the queried index set.
    #[error("no index assigned to codim {codim} entity with hierarchic index {index}")]
    MissingIndex { codim: usize, index: usize },
    /// Refinement of an element that already has children.
    #[error("element {0} is not a leaf")]
    NotLeaf(usize),
    /// Coarsening of an element whose children are not all leaves.
    #[error("element {0} has no coarsenable children")]
    NotRefined(usize),
    /// The handle does not refer to a live element.
    #[error("element handle {0} does not refer to a live element")]
    InvalidElement(usize),
    /// A macro element was given the wrong number of vertices.
    #[error("element expects {expected} vertices, found {found}")]
    ElementVertexCount { expected: usize, found: usize },
    /// Macro vertex coordinates of a one-dimensional grid must increase.
    #[error("coordinate at position {position} does not increase")]
    NonIncreasingCoordinates { position: usize },
    /// A macro element refers to a vertex that was never added.
    #[error("unknown vertex {0}")]
    UnknownVertex(usize),
    /// Persisted array length did not match the expected layout.
    #[error("persisted data length mismatch: expected {expected}, found {found}")]
    PersistLengthMismatch { expected: usize, found: usize },
    /// Underlying reader/writer failure.
    #[error("I/O error: {0}")]
    Io(String),
    /// Backend does not support the requested combination.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// An internal invariant check failed.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        GridError::Io(err.to_string())
    }
}
