//! Index layer implementation
//!
//! Hash indexes for equality lookups, one manager per table.

mod hash_index;
mod manager;

pub use hash_index::{HashIndex, IndexKey, IndexStats};
pub use manager::IndexManager;
