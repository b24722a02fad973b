//! In-memory row storage for one table
//!
//! Rows live in a `BTreeMap` keyed by a monotonically increasing row id, so
//! full scans return rows in insertion order. Every table carries a hash
//! index on its primary key column; secondary indexes are added through
//! `CREATE INDEX`.

use crate::error::{DbError, Result};
use crate::index::{IndexManager, IndexStats};
use crate::types::{IndexDef, Row, RowId, TableSchema, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<RowId, Row>,
    next_row_id: RowId,
    indexes: IndexManager,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        let mut indexes = IndexManager::new();
        let pk = schema.primary_key_index();
        indexes.create_index(&schema.columns[pk].name, pk, std::iter::empty());

        let mut table = Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 1,
            indexes,
        };

        let secondary: Vec<IndexDef> = table.schema.indexes.drain(..).collect();
        for def in secondary {
            // Duplicates were rejected when the schema was first built
            let _ = table.create_index(def);
        }
        table
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a fully coerced row, enforcing primary key uniqueness
    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        if row.len() != self.schema.column_count() {
            return Err(DbError::InvalidQuery(format!(
                "Row has {} values but table '{}' has {} columns",
                row.len(),
                self.schema.name,
                self.schema.column_count()
            )));
        }
        self.check_primary_key(&row)?;

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.indexes.on_insert(row_id, &row);
        self.rows.insert(row_id, row);
        Ok(row_id)
    }

    /// Replace a row in place and return the previous version.
    ///
    /// The primary key value is immutable.
    pub fn update(&mut self, row_id: RowId, new_row: Row) -> Result<Row> {
        let pk = self.schema.primary_key_index();
        let old_row = self.rows.get(&row_id).ok_or_else(|| missing_row(row_id))?;
        if old_row[pk] != new_row[pk] {
            return Err(DbError::Constraint(format!(
                "Cannot update primary key column '{}'",
                self.schema.columns[pk].name
            )));
        }

        self.indexes.on_update(row_id, old_row, &new_row);
        let old_row = std::mem::replace(
            self.rows.get_mut(&row_id).ok_or_else(|| missing_row(row_id))?,
            new_row,
        );
        Ok(old_row)
    }

    pub fn delete(&mut self, row_id: RowId) -> Result<Row> {
        let row = self.rows.remove(&row_id).ok_or_else(|| missing_row(row_id))?;
        self.indexes.on_delete(row_id, &row);
        Ok(row)
    }

    /// Put a previously deleted row back under its original id
    pub fn restore(&mut self, row_id: RowId, row: Row) -> Result<()> {
        if self.rows.contains_key(&row_id) {
            return Err(DbError::InvalidQuery(format!("Row {} already exists", row_id)));
        }
        self.check_primary_key(&row)?;
        self.indexes.on_insert(row_id, &row);
        self.rows.insert(row_id, row);
        self.next_row_id = self.next_row_id.max(row_id + 1);
        Ok(())
    }

    /// All rows in insertion order
    pub fn scan(&self) -> impl Iterator<Item = (RowId, &Row)> + '_ {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    /// Rows whose `column` equals `value`, in insertion order.
    ///
    /// Returns `None` when the column has no index.
    pub fn lookup(&self, column: &str, value: &Value) -> Option<Vec<(RowId, &Row)>> {
        let ids = self.indexes.lookup(column, value)?;
        Some(
            ids.into_iter()
                .filter_map(|id| self.rows.get(&id).map(|row| (id, row)))
                .collect(),
        )
    }

    pub fn index_stats(&self, column: &str) -> Option<IndexStats> {
        self.indexes.stats(column)
    }

    /// Register a named secondary index and build it from current rows
    pub fn create_index(&mut self, def: IndexDef) -> Result<()> {
        if self.schema.find_index(&def.name).is_some() {
            return Err(DbError::InvalidQuery(format!(
                "Index '{}' already exists on table '{}'",
                def.name, self.schema.name
            )));
        }
        let position = self.schema.require_column(&def.column)?;

        // A column can back several named indexes; only one physical index
        self.indexes
            .create_index(&def.column, position, self.rows.iter().map(|(id, r)| (*id, r)));
        self.schema.indexes.push(def);
        Ok(())
    }

    fn check_primary_key(&self, row: &Row) -> Result<()> {
        let pk = self.schema.primary_key_index();
        let value = &row[pk];
        let column = &self.schema.columns[pk].name;

        if value.is_null() {
            return Err(DbError::Constraint(format!(
                "Primary key column '{}' cannot be NULL",
                column
            )));
        }

        if self.indexes.contains(column, value) {
            return Err(DbError::DuplicateKey {
                table: self.schema.name.clone(),
                column: column.clone(),
                value: value.to_sql_literal(),
            });
        }
        Ok(())
    }
}

fn missing_row(row_id: RowId) -> DbError {
    DbError::InvalidQuery(format!("Row {} does not exist", row_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType};

    fn transactions() -> Table {
        let schema = TableSchema::new(
            "transactions",
            vec![
                ColumnDef::new("id", ColumnType::Integer).primary_key(),
                ColumnDef::new("category", ColumnType::Text),
                ColumnDef::new("amount", ColumnType::Float),
            ],
        )
        .unwrap();
        Table::new(schema)
    }

    fn row(id: i64, category: &str, amount: f64) -> Row {
        vec![Value::Integer(id), Value::Text(category.into()), Value::Float(amount)]
    }

    #[test]
    fn test_insert_and_scan_in_order() {
        let mut table = transactions();
        table.insert(row(2, "rent", 900.0)).unwrap();
        table.insert(row(1, "food", 12.5)).unwrap();

        let ids: Vec<Value> = table.scan().map(|(_, r)| r[0].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(2), Value::Integer(1)]);
        assert!(table.index_stats("id").is_some());
    }

    #[test]
    fn test_duplicate_primary_key() {
        let mut table = transactions();
        table.insert(row(1, "food", 12.5)).unwrap();
        let err = table.insert(row(1, "rent", 900.0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "DuplicateKeyError: Duplicate value 1 for primary key 'id' in table 'transactions'"
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_null_primary_key_rejected() {
        let mut table = transactions();
        let err = table
            .insert(vec![Value::Null, Value::Text("x".into()), Value::Null])
            .unwrap_err();
        assert_eq!(err.kind(), "ConstraintError");
    }

    #[test]
    fn test_update_maintains_secondary_index() {
        let mut table = transactions();
        let id = table.insert(row(1, "food", 12.5)).unwrap();
        table.create_index(IndexDef::new("idx_cat", "category")).unwrap();

        let old = table.update(id, row(1, "fuel", 40.0)).unwrap();
        assert_eq!(old[1], Value::Text("food".into()));
        assert!(table.lookup("category", &Value::Text("food".into())).unwrap().is_empty());
        assert_eq!(table.lookup("category", &Value::Text("fuel".into())).unwrap().len(), 1);

        let err = table.update(id, row(2, "fuel", 40.0)).unwrap_err();
        assert_eq!(err.kind(), "ConstraintError");
    }

    #[test]
    fn test_delete_and_restore() {
        let mut table = transactions();
        let id = table.insert(row(1, "food", 12.5)).unwrap();
        let removed = table.delete(id).unwrap();
        assert!(table.lookup("id", &Value::Integer(1)).unwrap().is_empty());

        table.restore(id, removed).unwrap();
        let found = table.lookup("id", &Value::Integer(1)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, id);
    }

    #[test]
    fn test_duplicate_index_name() {
        let mut table = transactions();
        table.create_index(IndexDef::new("idx_cat", "category")).unwrap();
        let err = table.create_index(IndexDef::new("idx_cat", "amount")).unwrap_err();
        assert_eq!(err.kind(), "InvalidQueryError");

        let err = table.create_index(IndexDef::new("idx_x", "missing")).unwrap_err();
        assert_eq!(err.kind(), "ColumnNotFoundError");
    }
}
