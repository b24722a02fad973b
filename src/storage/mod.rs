//! Storage layer implementation
//!
//! In-memory tables with their indexes, and the JSON snapshots that make
//! them durable across restarts.

pub mod snapshot;
mod table;

pub use snapshot::{read_snapshot, write_snapshot};
pub use table::Table;
