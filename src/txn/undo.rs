//! Statement-level undo log
//!
//! UPDATE and DELETE touch rows one at a time. Each applied change records
//! the row image needed to reverse it; if a later row fails, the log is
//! replayed in reverse so the statement leaves no trace.

use crate::error::Result;
use crate::storage::Table;
use crate::types::{Row, RowId};

/// One reversible change made by the current statement
#[derive(Debug, Clone)]
pub enum UndoEntry {
    /// Row was updated (store the previous image)
    Updated { row_id: RowId, before: Row },
    /// Row was deleted (store the removed row)
    Deleted { row_id: RowId, row: Row },
}

#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Statement succeeded; forget the recorded images
    pub fn commit(self) -> usize {
        self.entries.len()
    }

    /// Undo every recorded change, newest first
    pub fn rollback(self, table: &mut Table) -> Result<()> {
        let count = self.entries.len();
        for entry in self.entries.into_iter().rev() {
            match entry {
                UndoEntry::Updated { row_id, before } => {
                    table.update(row_id, before)?;
                }
                UndoEntry::Deleted { row_id, row } => {
                    table.restore(row_id, row)?;
                }
            }
        }
        log::debug!("Rolled back {} change(s) on table '{}'", count, table.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType, TableSchema, Value};

    fn accounts() -> Table {
        let schema = TableSchema::new(
            "accounts",
            vec![
                ColumnDef::new("id", ColumnType::Integer).primary_key(),
                ColumnDef::new("balance", ColumnType::Float),
            ],
        )
        .unwrap();
        Table::new(schema)
    }

    fn snapshot(table: &Table) -> Vec<(RowId, Row)> {
        table.scan().map(|(id, row)| (id, row.clone())).collect()
    }

    #[test]
    fn test_rollback_restores_table() {
        let mut table = accounts();
        let a = table.insert(vec![Value::Integer(1), Value::Float(10.0)]).unwrap();
        let b = table.insert(vec![Value::Integer(2), Value::Float(20.0)]).unwrap();
        let before = snapshot(&table);

        let mut undo = UndoLog::new();
        let old = table.update(a, vec![Value::Integer(1), Value::Float(0.0)]).unwrap();
        undo.record(UndoEntry::Updated { row_id: a, before: old });
        let removed = table.delete(b).unwrap();
        undo.record(UndoEntry::Deleted { row_id: b, row: removed });
        assert_eq!(undo.len(), 2);

        undo.rollback(&mut table).unwrap();
        assert_eq!(snapshot(&table), before);
        assert_eq!(table.lookup("id", &Value::Integer(2)).unwrap().len(), 1);
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut table = accounts();
        let a = table.insert(vec![Value::Integer(1), Value::Float(10.0)]).unwrap();
        let mut undo = UndoLog::new();
        let row = table.delete(a).unwrap();
        undo.record(UndoEntry::Deleted { row_id: a, row });
        assert_eq!(undo.commit(), 1);
        assert!(table.is_empty());
    }
}
