//! A named set of tables

use crate::error::{DbError, Result};
use crate::storage::Table;
use crate::types::TableSchema;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    tables: BTreeMap<String, Table>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tables(name, BTreeMap::new())
    }

    pub fn with_tables(name: impl Into<String>, tables: BTreeMap<String, Table>) -> Self {
        Self {
            name: name.into(),
            tables,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &BTreeMap<String, Table> {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        if self.tables.contains_key(&schema.name) {
            return Err(DbError::TableExists(schema.name));
        }
        self.tables.insert(schema.name.clone(), Table::new(schema));
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<Table> {
        self.tables
            .remove(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Table names in name order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType};

    fn schema(name: &str) -> TableSchema {
        TableSchema::new(name, vec![ColumnDef::new("id", ColumnType::Integer).primary_key()]).unwrap()
    }

    #[test]
    fn test_table_lifecycle() {
        let mut db = Database::new("pesa");
        db.create_table(schema("users")).unwrap();
        db.create_table(schema("budgets")).unwrap();
        assert_eq!(db.table_names(), vec!["budgets", "users"]);

        let err = db.create_table(schema("users")).unwrap_err();
        assert_eq!(err.to_string(), "TableExistsError: Table 'users' already exists");

        db.drop_table("users").unwrap();
        let err = db.table("users").unwrap_err();
        assert_eq!(err.to_string(), "TableNotFoundError: Table 'users' does not exist");
    }
}
