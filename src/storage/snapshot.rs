//! JSON snapshot persistence
//!
//! One document per database:
//!
//! ```json
//! {"tables": {"users": {"columns": [...], "indexes": [...], "rows": [{"id": "u1"}]}}}
//! ```
//!
//! Index contents are never written; they are rebuilt from rows on load.
//! Writes go to `<db>.json.tmp`, are flushed and fsynced, then renamed over
//! the live file, so a crash mid-write leaves the previous snapshot intact.

use super::table::Table;
use crate::config::DurabilityLevel;
use crate::error::{DbError, Result};
use crate::types::{ColumnDef, IndexDef, TableSchema, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct SnapshotRef<'a> {
    tables: BTreeMap<&'a str, TableRef<'a>>,
}

#[derive(Serialize)]
struct TableRef<'a> {
    columns: &'a [ColumnDef],
    indexes: &'a [IndexDef],
    rows: Vec<BTreeMap<&'a str, &'a Value>>,
}

#[derive(Deserialize)]
struct SnapshotDoc {
    #[serde(default)]
    tables: BTreeMap<String, TableDoc>,
}

#[derive(Deserialize)]
struct TableDoc {
    columns: Vec<ColumnDef>,
    #[serde(default)]
    indexes: Vec<IndexDef>,
    #[serde(default)]
    rows: Vec<BTreeMap<String, Value>>,
}

/// Temporary path a snapshot is staged in before the rename
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serialize `tables` and atomically replace the snapshot at `path`
pub fn write_snapshot(
    path: &Path,
    tables: &BTreeMap<String, Table>,
    durability: DurabilityLevel,
) -> Result<()> {
    let doc = SnapshotRef {
        tables: tables
            .iter()
            .map(|(name, table)| (name.as_str(), table_ref(table)))
            .collect(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &doc)?;
    writer.flush()?;
    if durability.requires_sync() {
        writer.get_ref().sync_all()?;
    }
    drop(writer);

    fs::rename(&tmp, path)?;

    // Persist the rename itself
    #[cfg(unix)]
    {
        if durability.requires_sync() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                File::open(parent)?.sync_all()?;
            }
        }
    }

    log::debug!(
        "Wrote snapshot {} ({} tables)",
        path.display(),
        doc.tables.len()
    );
    Ok(())
}

fn table_ref(table: &Table) -> TableRef<'_> {
    let schema = table.schema();
    let rows = table
        .scan()
        .map(|(_, row)| {
            schema
                .columns
                .iter()
                .map(|c| c.name.as_str())
                .zip(row.iter())
                .collect()
        })
        .collect();

    TableRef {
        columns: &schema.columns,
        indexes: &schema.indexes,
        rows,
    }
}

/// Load the snapshot at `path`.
///
/// Returns `Ok(None)` when no snapshot exists yet.
pub fn read_snapshot(path: &Path) -> Result<Option<BTreeMap<String, Table>>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;

    let doc: SnapshotDoc = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        DbError::Persistence(format!("Corrupt snapshot {}: {}", path.display(), e))
    })?;

    let mut tables = BTreeMap::new();
    for (name, table_doc) in doc.tables {
        let table = load_table(&name, table_doc).map_err(|e| {
            DbError::Persistence(format!(
                "Invalid table '{}' in {}: {}",
                name,
                path.display(),
                e
            ))
        })?;
        tables.insert(name, table);
    }
    Ok(Some(tables))
}

fn load_table(name: &str, doc: TableDoc) -> Result<Table> {
    let schema = TableSchema::new(name, doc.columns)?;
    let mut table = Table::new(schema);

    for mut stored in doc.rows {
        let mut row = Vec::with_capacity(table.schema().column_count());
        for col in &table.schema().columns {
            let value = stored.remove(&col.name).unwrap_or(Value::Null);
            row.push(value.coerce_to(col.col_type, &col.name)?);
        }
        if let Some(unknown) = stored.keys().next() {
            return Err(DbError::column_not_found(name, unknown));
        }
        table.insert(row)?;
    }

    for def in doc.indexes {
        table.create_index(def)?;
    }
    Ok(table)
}
