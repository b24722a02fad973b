/// Table metadata and schema definitions
use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// INT / INTEGER
    #[serde(rename = "INT")]
    Integer,
    /// FLOAT / REAL / DOUBLE / DECIMAL
    #[serde(rename = "FLOAT")]
    Float,
    /// STRING / TEXT / VARCHAR
    #[serde(rename = "STRING")]
    Text,
    /// BOOL / BOOLEAN
    #[serde(rename = "BOOL")]
    Boolean,
}

impl ColumnType {
    /// Canonical dialect name
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INT",
            ColumnType::Float => "FLOAT",
            ColumnType::Text => "STRING",
            ColumnType::Boolean => "BOOL",
        }
    }
}

/// Declared (never enforced) foreign key target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Column data type
    #[serde(rename = "type")]
    pub col_type: ColumnType,
    /// Whether this is the table's primary key
    #[serde(default)]
    pub primary_key: bool,
    /// REFERENCES metadata
    #[serde(default)]
    pub references: Option<ForeignKeyRef>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
            primary_key: false,
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

/// Explicit (non primary key) hash index declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name (unique within the table)
    pub name: String,
    /// Indexed column
    pub column: String,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }
}

/// Table schema definition
///
/// The column list is fixed at creation. Only `indexes` can grow afterwards.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Column definitions (ordered)
    pub columns: Vec<ColumnDef>,
    /// Explicit index definitions
    pub indexes: Vec<IndexDef>,
    pk_position: usize,
    column_map: HashMap<String, usize>,
}

impl TableSchema {
    /// Validate and build a schema.
    ///
    /// Exactly one primary key column is required and column names must be
    /// unique.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "Table '{}' must have at least one column",
                name
            )));
        }

        let mut column_map = HashMap::with_capacity(columns.len());
        for (position, col) in columns.iter().enumerate() {
            if column_map.insert(col.name.clone(), position).is_some() {
                return Err(DbError::InvalidQuery(format!(
                    "Duplicate column '{}' in table '{}'",
                    col.name, name
                )));
            }
        }

        let pk_positions: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        let pk_position = match pk_positions.as_slice() {
            [only] => *only,
            [] => {
                return Err(DbError::Syntax(format!(
                    "Table '{}' requires exactly one PRIMARY KEY column",
                    name
                )))
            }
            _ => {
                return Err(DbError::Syntax(format!(
                    "Composite primary keys are not supported (table '{}')",
                    name
                )))
            }
        };

        Ok(Self {
            name,
            columns,
            indexes: Vec::new(),
            pk_position,
            column_map,
        })
    }

    /// Position of a column in the row, if it exists
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_map.get(name).copied()
    }

    /// Position of a column, or `ColumnNotFoundError`
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| DbError::column_not_found(&self.name, name))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn primary_key_index(&self) -> usize {
        self.pk_position
    }

    pub fn primary_key(&self) -> &ColumnDef {
        &self.columns[self.pk_position]
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|idx| idx.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Text).primary_key(),
                ColumnDef::new("pin_hash", ColumnType::Text),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_column_lookup() {
        let schema = users();
        assert_eq!(schema.column_index("pin_hash"), Some(1));
        assert_eq!(schema.primary_key().name, "id");
        assert!(schema.require_column("missing").is_err());
    }

    #[test]
    fn test_requires_single_primary_key() {
        let none = TableSchema::new("t", vec![ColumnDef::new("a", ColumnType::Integer)]);
        assert!(matches!(none, Err(DbError::Syntax(_))));

        let two = TableSchema::new(
            "t",
            vec![
                ColumnDef::new("a", ColumnType::Integer).primary_key(),
                ColumnDef::new("b", ColumnType::Integer).primary_key(),
            ],
        );
        assert!(matches!(two, Err(DbError::Syntax(_))));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let dup = TableSchema::new(
            "t",
            vec![
                ColumnDef::new("a", ColumnType::Integer).primary_key(),
                ColumnDef::new("a", ColumnType::Text),
            ],
        );
        assert!(matches!(dup, Err(DbError::InvalidQuery(_))));
    }

    #[test]
    fn test_column_def_json() {
        let col = ColumnDef::new("user_id", ColumnType::Text).references("users", "id");
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["type"], "STRING");
        assert_eq!(json["references"]["table"], "users");
    }
}
