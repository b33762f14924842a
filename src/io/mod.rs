//! Persistence of index state.

pub mod xdr;

pub use xdr::{read_index_array, write_index_array};
