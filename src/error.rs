//! Error types for the PesaDB engine
//!
//! Every error renders as `"<Kind>: <message>"`. Clients of the emulated
//! service match on these strings, so both the kind names and the message
//! shapes below are part of the public contract.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("TableNotFoundError: Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("TableExistsError: Table '{0}' already exists")]
    TableExists(String),

    #[error("ColumnNotFoundError: Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("TypeMismatchError: {0}")]
    TypeMismatch(String),

    #[error("DuplicateKeyError: Duplicate value {value} for primary key '{column}' in table '{table}'")]
    DuplicateKey {
        table: String,
        column: String,
        value: String,
    },

    #[error("ConstraintError: {0}")]
    Constraint(String),

    #[error("InvalidQueryError: {0}")]
    InvalidQuery(String),

    #[error("PersistenceError: {0}")]
    Persistence(String),

    #[error("PersistenceError: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PersistenceError: Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Stable kind name, the prefix of the rendered message.
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::Syntax(_) => "SyntaxError",
            DbError::TableNotFound(_) => "TableNotFoundError",
            DbError::TableExists(_) => "TableExistsError",
            DbError::ColumnNotFound { .. } => "ColumnNotFoundError",
            DbError::TypeMismatch(_) => "TypeMismatchError",
            DbError::DuplicateKey { .. } => "DuplicateKeyError",
            DbError::Constraint(_) => "ConstraintError",
            DbError::InvalidQuery(_) => "InvalidQueryError",
            DbError::Persistence(_) | DbError::Io(_) | DbError::Serialization(_) => {
                "PersistenceError"
            }
        }
    }

    /// HTTP status the query server answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            DbError::Syntax(_)
            | DbError::TypeMismatch(_)
            | DbError::Constraint(_)
            | DbError::InvalidQuery(_) => 400,
            DbError::TableNotFound(_) | DbError::ColumnNotFound { .. } => 404,
            DbError::TableExists(_) | DbError::DuplicateKey { .. } => 409,
            DbError::Persistence(_) | DbError::Io(_) | DbError::Serialization(_) => 500,
        }
    }

    pub(crate) fn column_not_found(table: &str, column: &str) -> Self {
        DbError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}
