//! Request and response bodies of the query API
use crate::error::DbError;
use crate::sql::QueryResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Request body for `POST /query`
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The SQL statement to execute
    pub sql: String,
    /// Target database; falls back to the server's default database
    #[serde(default)]
    pub db: Option<String>,
}

/// Response for SELECT / SHOW TABLES
#[derive(Debug, Serialize, Deserialize)]
pub struct RowsResponse {
    pub success: bool,
    pub data: Vec<Map<String, JsonValue>>,
}

/// Response for every other statement
#[derive(Debug, Serialize, Deserialize)]
pub struct AffectedResponse {
    pub success: bool,
    pub rows_affected: usize,
}

/// Error response; `error` is `"<Kind>: <message>"`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

impl From<&DbError> for ErrorResponse {
    fn from(err: &DbError) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Success body for a finished statement
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Rows(RowsResponse),
    Affected(AffectedResponse),
}

impl From<QueryResult> for QueryResponse {
    fn from(result: QueryResult) -> Self {
        if result.is_select() {
            QueryResponse::Rows(RowsResponse {
                success: true,
                data: result.rows_as_json(),
            })
        } else {
            QueryResponse::Affected(AffectedResponse {
                success: true,
                rows_affected: result.affected_rows(),
            })
        }
    }
}
