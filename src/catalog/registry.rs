/// Catalog of open databases
///
/// Databases are opened lazily on first reference and stay resident for the
/// life of the process. Each one sits behind its own `RwLock`: SELECT takes
/// the shared side, every other statement the exclusive side, and the
/// snapshot of a successful mutation is written before that lock is released.
use super::database::Database;
use crate::config::EngineConfig;
use crate::error::{DbError, Result};
use crate::sql::{parse_statement, ExecutionContext, PatternCache, QueryExecutor, QueryResult};
use crate::storage::{read_snapshot, write_snapshot};
use crate::types::TableSchema;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of one database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    /// Known by name, nothing read yet
    Unloaded,
    /// Snapshot being read
    Loading,
    /// Serving statements
    Ready,
    /// Snapshot being written after a mutation
    Persisting,
}

/// One database plus its lifecycle bookkeeping
pub struct DatabaseHandle {
    name: String,
    db: RwLock<Option<Database>>,
    state: Mutex<DatabaseState>,
    /// In-memory state is ahead of the last successful snapshot
    dirty: AtomicBool,
}

impl DatabaseHandle {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            db: RwLock::new(None),
            state: Mutex::new(DatabaseState::Unloaded),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DatabaseState {
        *self.state.lock()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn set_state(&self, state: DatabaseState) {
        *self.state.lock() = state;
    }

    /// Shared access, loading the database first if needed
    fn read(&self, config: &EngineConfig) -> Result<MappedRwLockReadGuard<'_, Database>> {
        match RwLockReadGuard::try_map(self.db.read(), Option::as_ref) {
            Ok(guard) => return Ok(guard),
            Err(guard) => drop(guard),
        }

        let mut slot = self.db.write();
        self.load_into(&mut slot, config)?;
        RwLockReadGuard::try_map(RwLockWriteGuard::downgrade(slot), Option::as_ref)
            .map_err(|_| self.not_loaded())
    }

    /// Exclusive access, loading the database first if needed
    fn write(&self, config: &EngineConfig) -> Result<MappedRwLockWriteGuard<'_, Database>> {
        let mut slot = self.db.write();
        self.load_into(&mut slot, config)?;
        RwLockWriteGuard::try_map(slot, Option::as_mut).map_err(|_| self.not_loaded())
    }

    fn load_into(&self, slot: &mut Option<Database>, config: &EngineConfig) -> Result<()> {
        if slot.is_some() {
            return Ok(());
        }

        self.set_state(DatabaseState::Loading);
        let loaded = if config.persist {
            read_snapshot(&config.snapshot_path(&self.name))
        } else {
            Ok(None)
        };

        match loaded {
            Ok(Some(tables)) => {
                let db = Database::with_tables(&self.name, tables);
                log::info!(
                    "Loaded database '{}' ({} tables, {} rows)",
                    self.name,
                    db.tables().len(),
                    db.row_count()
                );
                *slot = Some(db);
            }
            Ok(None) => {
                log::debug!("Created empty database '{}'", self.name);
                *slot = Some(Database::new(&self.name));
            }
            Err(e) => {
                log::error!("Failed to load database '{}': {}", self.name, e);
                self.set_state(DatabaseState::Unloaded);
                return Err(e);
            }
        }
        self.set_state(DatabaseState::Ready);
        Ok(())
    }

    /// Snapshot `db`; the caller holds the write lock.
    ///
    /// A failure is logged and leaves the database dirty; the in-memory
    /// state stays authoritative.
    fn persist(&self, db: &Database, config: &EngineConfig) -> Result<()> {
        if !config.persist {
            self.dirty.store(false, Ordering::Release);
            return Ok(());
        }

        self.set_state(DatabaseState::Persisting);
        let path = config.snapshot_path(&self.name);
        let result = write_snapshot(&path, db.tables(), config.durability);
        self.set_state(DatabaseState::Ready);

        match result {
            Ok(()) => {
                self.dirty.store(false, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "Failed to persist database '{}' to {}: {}",
                    self.name,
                    path.display(),
                    e
                );
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    fn not_loaded(&self) -> DbError {
        DbError::Persistence(format!("Database '{}' is not loaded", self.name))
    }
}

/// Process-wide set of databases, shared by `Arc`
pub struct Catalog {
    config: EngineConfig,
    databases: DashMap<String, Arc<DatabaseHandle>>,
    context: ExecutionContext,
}

impl Catalog {
    pub fn new(config: EngineConfig) -> Self {
        let patterns = PatternCache::new(config.like_cache_capacity);
        Self {
            config,
            databases: DashMap::new(),
            context: ExecutionContext::new(patterns),
        }
    }

    /// Pin NOW() for every statement
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.context = self.context.with_now(now);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse and execute one statement against database `db`
    pub fn execute(&self, db: &str, sql: &str) -> Result<QueryResult> {
        validate_database_name(db)?;
        let stmt = parse_statement(sql)?;
        let handle = self.handle(db);
        let executor = QueryExecutor::new(&self.context);

        if !stmt.is_mutation() {
            let guard = handle.read(&self.config)?;
            return executor.query(&guard, stmt);
        }

        let kind = stmt.name();
        let mut guard = handle.write(&self.config)?;
        let result = executor.execute(&mut guard, stmt);
        match &result {
            Ok(_) => {
                handle.dirty.store(true, Ordering::Release);
                // Failure is logged and retried by the next mutation or flush
                let _ = handle.persist(&guard, &self.config);
            }
            Err(e) => log::debug!("{} on '{}' failed: {}", kind, db, e),
        }
        result
    }

    /// Schema of one table, for tooling
    pub fn table_schema(&self, db: &str, table: &str) -> Result<TableSchema> {
        validate_database_name(db)?;
        let handle = self.handle(db);
        let guard = handle.read(&self.config)?;
        Ok(guard.table(table)?.schema().clone())
    }

    /// Snapshot every dirty database. Returns how many were written.
    pub fn flush_all(&self) -> Result<usize> {
        let handles: Vec<Arc<DatabaseHandle>> =
            self.databases.iter().map(|e| Arc::clone(e.value())).collect();

        let mut flushed = 0;
        let mut last_err = None;
        for handle in handles.into_iter().filter(|h| h.is_dirty()) {
            let guard = handle.db.write();
            if let Some(db) = guard.as_ref() {
                match handle.persist(db, &self.config) {
                    Ok(()) => flushed += 1,
                    Err(e) => last_err = Some(e),
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => {
                log::debug!("Flushed {} database(s)", flushed);
                Ok(flushed)
            }
        }
    }

    /// Names of every database referenced so far, sorted
    pub fn list_databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn database_state(&self, db: &str) -> Option<DatabaseState> {
        self.databases.get(db).map(|h| h.state())
    }

    fn handle(&self, db: &str) -> Arc<DatabaseHandle> {
        if let Some(handle) = self.databases.get(db) {
            return Arc::clone(handle.value());
        }
        let entry = self
            .databases
            .entry(db.to_string())
            .or_insert_with(|| Arc::new(DatabaseHandle::new(db)));
        Arc::clone(entry.value())
    }
}

fn validate_database_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidQuery(format!("Invalid database name '{}'", name)))
    }
}
