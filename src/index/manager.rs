//! Index manager for coordinating a table's hash indexes
//!
//! Every mutation of table storage calls into the manager in the same
//! operation, so lookups always reflect the last completed mutation.

use super::hash_index::{HashIndex, IndexStats};
use crate::types::{Row, RowId, Value};
use ahash::AHashMap;

/// All hash indexes of one table, keyed by column name
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    indexes: AHashMap<String, HashIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over `column` from existing rows in one pass.
    ///
    /// Returns false (and leaves the existing index alone) if the column
    /// is already indexed.
    pub fn create_index<'a>(
        &mut self,
        column: &str,
        position: usize,
        rows: impl IntoIterator<Item = (RowId, &'a Row)>,
    ) -> bool {
        if self.indexes.contains_key(column) {
            return false;
        }

        let mut index = HashIndex::new(column, position);
        for (row_id, row) in rows {
            if let Some(value) = row.get(position) {
                index.insert(row_id, value);
            }
        }
        self.indexes.insert(column.to_string(), index);
        true
    }

    pub fn on_insert(&mut self, row_id: RowId, row: &Row) {
        for index in self.indexes.values_mut() {
            if let Some(value) = row.get(index.position()) {
                index.insert(row_id, value);
            }
        }
    }

    /// Re-key only the indexes whose column value changed
    pub fn on_update(&mut self, row_id: RowId, old_row: &Row, new_row: &Row) {
        for index in self.indexes.values_mut() {
            let position = index.position();
            let (old, new) = match (old_row.get(position), new_row.get(position)) {
                (Some(old), Some(new)) => (old, new),
                _ => continue,
            };
            if old != new {
                index.remove(row_id, old);
                index.insert(row_id, new);
            }
        }
    }

    pub fn on_delete(&mut self, row_id: RowId, row: &Row) {
        for index in self.indexes.values_mut() {
            if let Some(value) = row.get(index.position()) {
                index.remove(row_id, value);
            }
        }
    }

    /// Exact matching row ids, or `None` when the column has no index
    pub fn lookup(&self, column: &str, value: &Value) -> Option<Vec<RowId>> {
        self.indexes.get(column).map(|index| index.lookup(value))
    }

    pub fn contains(&self, column: &str, value: &Value) -> bool {
        self.indexes
            .get(column)
            .map_or(false, |index| index.contains(value))
    }

    pub fn stats(&self, column: &str) -> Option<IndexStats> {
        self.indexes.get(column).map(HashIndex::stats)
    }
}
