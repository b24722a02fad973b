//! PesaDB: an embeddable SQL engine with a small, strict dialect
//!
//! ## Features
//! - Single-table SELECT with WHERE, GROUP BY, HAVING, ORDER BY, LIMIT/OFFSET
//! - Aggregates (COUNT, SUM, AVG, MIN, MAX) and ISO-8601 date functions
//! - Hash indexes on primary keys and declared columns
//! - JSON snapshots written atomically after every mutation
//! - HTTP query server (`POST /query`)
//!
//! ## Example
//! ```no_run
//! use pesadb::{Catalog, EngineConfig};
//!
//! let catalog = Catalog::new(EngineConfig::with_data_dir("./data"));
//! catalog.execute("pesa", "CREATE TABLE users (id STRING PRIMARY KEY, pin_hash STRING)")?;
//! catalog.execute("pesa", "INSERT INTO users (id, pin_hash) VALUES ('u1', 'abc')")?;
//! let result = catalog.execute("pesa", "SELECT COUNT(*) AS count FROM users")?;
//! assert_eq!(result.row_count(), 1);
//! # Ok::<(), pesadb::DbError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod index;
pub mod logging;
pub mod server;
pub mod sql;
pub mod storage;
pub mod txn;
pub mod types;

mod error;

pub use catalog::{Catalog, Database, DatabaseState};
pub use config::{DurabilityLevel, EngineConfig};
pub use error::{DbError, Result};
pub use server::ServerConfig;
pub use sql::{parse_statement, tokenize, QueryResult};
pub use types::{ColumnDef, ColumnType, Row, RowId, TableSchema, Value};
