//! Catalog: the databases an engine serves and their lifecycle

mod database;
mod registry;

pub use database::Database;
pub use registry::{Catalog, DatabaseHandle, DatabaseState};
