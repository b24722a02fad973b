/// Query executor - executes SQL statements against one database
///
/// SELECT pipeline: bind → plan → filter → group/aggregate → HAVING →
/// ORDER BY (stable) → OFFSET/LIMIT. UPDATE and DELETE evaluate every
/// matching row before touching storage, then apply changes under an undo
/// log so a failure part way leaves the table as it was.
use super::aggregate::{collect_aggregates, compute_aggregates, partition, Group, GroupRow};
use super::ast::*;
use super::binder::Binder;
use super::evaluator::{ExprEvaluator, PatternCache, RowContext, TableRow};
use super::optimizer::{QueryOptimizer, ScanMethod};
use crate::catalog::Database;
use crate::error::{DbError, Result};
use crate::storage::Table;
use crate::txn::{UndoEntry, UndoLog};
use crate::types::{IndexDef, Row, RowId, TableSchema, Value};
use chrono::{NaiveDateTime, Utc};
use std::cmp::Ordering;

/// Query result
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// SELECT / SHOW TABLES result
    Select {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },

    /// INSERT/UPDATE/DELETE result
    Modification { affected_rows: usize },

    /// CREATE/DROP result
    Definition { message: String },
}

impl QueryResult {
    pub fn affected_rows(&self) -> usize {
        match self {
            QueryResult::Modification { affected_rows } => *affected_rows,
            _ => 0,
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, QueryResult::Select { .. })
    }

    /// Get columns and rows from SELECT result
    /// Returns None if not a SELECT result
    pub fn select_rows(&self) -> Option<(&[String], &[Vec<Value>])> {
        match self {
            QueryResult::Select { columns, rows } => Some((columns.as_slice(), rows.as_slice())),
            _ => None,
        }
    }

    /// Rows as JSON objects (column name -> value)
    /// Returns empty vec if not a SELECT result
    pub fn rows_as_json(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        match self {
            QueryResult::Select { columns, rows } => rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .zip(row.iter())
                        .map(|(col, val)| {
                            (col.clone(), serde_json::to_value(val).unwrap_or_default())
                        })
                        .collect()
                })
                .collect(),
            _ => vec![],
        }
    }

    /// Get row count for SELECT results
    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Select { rows, .. } => rows.len(),
            QueryResult::Modification { affected_rows } => *affected_rows,
            _ => 0,
        }
    }
}

/// Per-statement settings: the LIKE cache and the instant NOW() reports
#[derive(Clone, Default)]
pub struct ExecutionContext {
    patterns: PatternCache,
    now: Option<NaiveDateTime>,
}

impl ExecutionContext {
    pub fn new(patterns: PatternCache) -> Self {
        Self { patterns, now: None }
    }

    /// Pin NOW() to a fixed instant
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Evaluator for one statement; NOW() is captured here
    pub fn evaluator(&self) -> ExprEvaluator {
        let now = self.now.unwrap_or_else(|| Utc::now().naive_utc());
        ExprEvaluator::new(now, self.patterns.clone())
    }
}

/// Query executor
pub struct QueryExecutor {
    evaluator: ExprEvaluator,
}

impl QueryExecutor {
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self {
            evaluator: ctx.evaluator(),
        }
    }

    /// Execute a read-only statement under a shared lock
    pub fn query(&self, db: &Database, stmt: Statement) -> Result<QueryResult> {
        match stmt {
            Statement::Select(s) => self.execute_select(db, s),
            Statement::ShowTables => Ok(self.execute_show_tables(db)),
            other => Err(DbError::InvalidQuery(format!(
                "{} requires write access",
                other.name()
            ))),
        }
    }

    /// Execute any statement
    pub fn execute(&self, db: &mut Database, stmt: Statement) -> Result<QueryResult> {
        match stmt {
            Statement::Insert(i) => self.execute_insert(db, i),
            Statement::Update(u) => self.execute_update(db, u),
            Statement::Delete(d) => self.execute_delete(db, d),
            Statement::CreateTable(c) => self.execute_create_table(db, c),
            Statement::CreateIndex(c) => self.execute_create_index(db, c),
            Statement::DropTable(d) => self.execute_drop_table(db, d),
            read_only => self.query(db, read_only),
        }
    }

    fn execute_select(&self, db: &Database, stmt: SelectStmt) -> Result<QueryResult> {
        let table = db.table(&stmt.from)?;
        let schema = table.schema();
        let stmt = Binder::new(schema).bind_select(stmt)?;

        let matched: Vec<&Row> = self
            .matching_rows(table, stmt.where_clause.as_ref())?
            .into_iter()
            .map(|(_, row)| row)
            .collect();

        let columns = output_columns(schema, &stmt.columns);
        let aggregates = collect_aggregates(&stmt);
        let order_by = stmt.order_by.as_deref().unwrap_or(&[]);

        // (sort keys, projected row)
        let mut output: Vec<(Vec<Value>, Vec<Value>)> = Vec::new();

        if stmt.group_by.is_some() || !aggregates.is_empty() {
            let group_columns = stmt.group_by.clone().unwrap_or_default();
            let groups = match &stmt.group_by {
                Some(columns) => {
                    let positions = columns
                        .iter()
                        .map(|c| schema.require_column(c))
                        .collect::<Result<Vec<_>>>()?;
                    partition(&matched, &positions)
                }
                // Whole-table aggregate: always exactly one group
                None => vec![Group {
                    key: Vec::new(),
                    rows: matched,
                }],
            };

            for group in &groups {
                let values = compute_aggregates(&aggregates, &group.rows, schema, &self.evaluator)?;
                let mut ctx =
                    GroupRow::new(&schema.name, &group_columns, &group.key, &aggregates, &values);
                let projected = self.project(&stmt.columns, &ctx, None)?;
                for (name, value) in columns.iter().zip(&projected) {
                    ctx.set_alias(name.clone(), value.clone());
                }
                if let Some(having) = &stmt.having {
                    if !self.evaluator.eval_predicate(having, &ctx)? {
                        continue;
                    }
                }
                let keys = sort_keys(order_by, &columns, &projected, &ctx)?;
                output.push((keys, projected));
            }
        } else {
            for row in matched {
                let ctx = TableRow::new(schema, row);
                let projected = self.project(&stmt.columns, &ctx, Some(row))?;
                let keys = sort_keys(order_by, &columns, &projected, &ctx)?;
                output.push((keys, projected));
            }
        }

        if !order_by.is_empty() {
            // sort_by is stable, ties keep scan/group order
            output.sort_by(|(a, _), (b, _)| {
                order_by
                    .iter()
                    .zip(a.iter().zip(b.iter()))
                    .map(|(item, (x, y))| {
                        let ord = x.sort_cmp(y);
                        if item.asc {
                            ord
                        } else {
                            ord.reverse()
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let rows = output
            .into_iter()
            .skip(stmt.offset.unwrap_or(0))
            .take(stmt.limit.unwrap_or(usize::MAX))
            .map(|(_, row)| row)
            .collect();

        Ok(QueryResult::Select { columns, rows })
    }

    fn project(
        &self,
        items: &[SelectColumn],
        ctx: &dyn RowContext,
        row: Option<&Row>,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                SelectColumn::Star => match row {
                    Some(row) => values.extend(row.iter().cloned()),
                    None => {
                        return Err(DbError::InvalidQuery(
                            "SELECT * cannot be combined with aggregation".into(),
                        ))
                    }
                },
                SelectColumn::Expr { expr, .. } => values.push(self.evaluator.eval(expr, ctx)?),
            }
        }
        Ok(values)
    }

    /// Candidate rows from the chosen plan, filtered by the full WHERE clause
    fn matching_rows<'t>(
        &self,
        table: &'t Table,
        where_clause: Option<&Expr>,
    ) -> Result<Vec<(RowId, &'t Row)>> {
        let plan = QueryOptimizer::new(table).optimize(where_clause);
        log::debug!(
            "Plan for '{}': {:?} (~{} rows)",
            table.name(),
            plan.scan_method,
            plan.estimated_rows
        );

        let candidates = match &plan.scan_method {
            ScanMethod::IndexLookup { column, value } => table.lookup(column, value),
            ScanMethod::FullScan => None,
        }
        .unwrap_or_else(|| table.scan().collect());

        let Some(where_clause) = where_clause else {
            return Ok(candidates);
        };
        let schema = table.schema();
        let mut matched = Vec::with_capacity(candidates.len());
        for (row_id, row) in candidates {
            if self
                .evaluator
                .eval_predicate(where_clause, &TableRow::new(schema, row))?
            {
                matched.push((row_id, row));
            }
        }
        Ok(matched)
    }

    fn execute_insert(&self, db: &mut Database, stmt: InsertStmt) -> Result<QueryResult> {
        let table = db.table_mut(&stmt.table)?;
        let row = Binder::new(table.schema()).bind_insert(&stmt, &self.evaluator)?;
        table.insert(row)?;
        Ok(QueryResult::Modification { affected_rows: 1 })
    }

    fn execute_update(&self, db: &mut Database, stmt: UpdateStmt) -> Result<QueryResult> {
        let table = db.table_mut(&stmt.table)?;
        let bound = Binder::new(table.schema()).bind_update(stmt)?;

        let mut changes: Vec<(RowId, Row)> = Vec::new();
        {
            let schema = table.schema();
            for (row_id, row) in self.matching_rows(table, bound.where_clause.as_ref())? {
                let ctx = TableRow::new(schema, row);
                let mut new_row = row.clone();
                for (position, expr) in &bound.assignments {
                    let col = &schema.columns[*position];
                    new_row[*position] =
                        self.evaluator.eval(expr, &ctx)?.coerce_to(col.col_type, &col.name)?;
                }
                changes.push((row_id, new_row));
            }
        }

        let mut undo = UndoLog::new();
        for (row_id, new_row) in changes {
            match table.update(row_id, new_row) {
                Ok(before) => undo.record(UndoEntry::Updated { row_id, before }),
                Err(e) => return Err(abort(undo, table, e)),
            }
        }
        Ok(QueryResult::Modification {
            affected_rows: undo.commit(),
        })
    }

    fn execute_delete(&self, db: &mut Database, stmt: DeleteStmt) -> Result<QueryResult> {
        let table = db.table_mut(&stmt.table)?;
        let where_clause = Binder::new(table.schema()).bind_where(stmt.where_clause)?;

        let doomed: Vec<RowId> = self
            .matching_rows(table, where_clause.as_ref())?
            .into_iter()
            .map(|(row_id, _)| row_id)
            .collect();

        let mut undo = UndoLog::new();
        for row_id in doomed {
            match table.delete(row_id) {
                Ok(row) => undo.record(UndoEntry::Deleted { row_id, row }),
                Err(e) => return Err(abort(undo, table, e)),
            }
        }
        Ok(QueryResult::Modification {
            affected_rows: undo.commit(),
        })
    }

    fn execute_create_table(&self, db: &mut Database, stmt: CreateTableStmt) -> Result<QueryResult> {
        let name = stmt.schema.name.clone();
        db.create_table(stmt.schema)?;
        Ok(QueryResult::Definition {
            message: format!("Table '{}' created", name),
        })
    }

    fn execute_create_index(&self, db: &mut Database, stmt: CreateIndexStmt) -> Result<QueryResult> {
        let table = db.table_mut(&stmt.table)?;
        table.create_index(IndexDef::new(&stmt.index_name, &stmt.column))?;
        Ok(QueryResult::Definition {
            message: format!(
                "Index '{}' created on {}({})",
                stmt.index_name, stmt.table, stmt.column
            ),
        })
    }

    fn execute_drop_table(&self, db: &mut Database, stmt: DropTableStmt) -> Result<QueryResult> {
        db.drop_table(&stmt.table)?;
        Ok(QueryResult::Definition {
            message: format!("Table '{}' dropped", stmt.table),
        })
    }

    fn execute_show_tables(&self, db: &Database) -> QueryResult {
        QueryResult::Select {
            columns: vec!["table_name".to_string()],
            rows: db
                .table_names()
                .into_iter()
                .map(|name| vec![Value::Text(name.to_string())])
                .collect(),
        }
    }
}

/// Roll back a partially applied statement and hand back the original error
fn abort(undo: UndoLog, table: &mut Table, err: DbError) -> DbError {
    if let Err(rollback_err) = undo.rollback(table) {
        log::error!(
            "Rollback on table '{}' failed: {} (original error: {})",
            table.name(),
            rollback_err,
            err
        );
    }
    err
}

/// Result column names: alias, else column name, else canonical text
fn output_columns(schema: &TableSchema, items: &[SelectColumn]) -> Vec<String> {
    let mut columns = Vec::new();
    for item in items {
        match item {
            SelectColumn::Star => columns.extend(schema.column_names()),
            SelectColumn::Expr {
                alias: Some(alias), ..
            } => columns.push(alias.clone()),
            SelectColumn::Expr { expr, alias: None } => columns.push(expr.to_string()),
        }
    }
    columns
}

/// ORDER BY keys: a result column by name, else a source column
fn sort_keys(
    order_by: &[OrderByExpr],
    columns: &[String],
    projected: &[Value],
    ctx: &dyn RowContext,
) -> Result<Vec<Value>> {
    order_by
        .iter()
        .map(|item| match columns.iter().position(|c| *c == item.column) {
            Some(i) => Ok(projected[i].clone()),
            None => ctx
                .column(&item.column)
                .ok_or_else(|| DbError::column_not_found(ctx.table(), &item.column)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parser::parse_statement;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn run(db: &mut Database, sql: &str) -> Result<QueryResult> {
        let ctx = ExecutionContext::default().with_now(now());
        QueryExecutor::new(&ctx).execute(db, parse_statement(sql)?)
    }

    fn rows(db: &mut Database, sql: &str) -> Vec<Vec<Value>> {
        match run(db, sql).unwrap() {
            QueryResult::Select { rows, .. } => rows,
            other => panic!("expected rows, got {:?}", other),
        }
    }

    fn seeded() -> Database {
        let mut db = Database::new("pesa");
        run(
            &mut db,
            "CREATE TABLE transactions (id INT PRIMARY KEY, category STRING, amount FLOAT, date STRING)",
        )
        .unwrap();
        let data = [
            (1, "food", 120.0, "2024-03-01T08:00:00"),
            (2, "rent", 900.0, "2024-03-02T09:00:00"),
            (3, "food", 80.0, "2024-03-15T10:00:00"),
            (4, "fuel", 40.0, "2024-02-10T11:00:00"),
            (5, "food", 15.5, "2024-03-19T12:00:00"),
        ];
        for (id, cat, amount, date) in data {
            run(
                &mut db,
                &format!(
                    "INSERT INTO transactions (id, category, amount, date) VALUES ({}, '{}', {}, '{}')",
                    id, cat, amount, date
                ),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn test_select_star_in_insertion_order() {
        let mut db = seeded();
        let result = run(&mut db, "SELECT * FROM transactions").unwrap();
        let (columns, rows) = result.select_rows().unwrap();
        assert_eq!(columns, ["id", "category", "amount", "date"]);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0][0], Value::Integer(1));
    }

    #[test]
    fn test_where_order_limit_offset() {
        let mut db = seeded();
        let got = rows(
            &mut db,
            "SELECT id FROM transactions WHERE category = 'food' ORDER BY amount DESC LIMIT 2 OFFSET 1",
        );
        assert_eq!(got, vec![vec![Value::Integer(3)], vec![Value::Integer(5)]]);
    }

    #[test]
    fn test_group_by_having_order_by_alias() {
        let mut db = seeded();
        let result = run(
            &mut db,
            "SELECT category, COUNT(*) AS n, SUM(amount) AS total FROM transactions \
             GROUP BY category HAVING n >= 1 ORDER BY total DESC",
        )
        .unwrap();
        let (columns, rows) = result.select_rows().unwrap();
        assert_eq!(columns, ["category", "n", "total"]);
        assert_eq!(
            rows[0],
            vec![Value::Text("rent".into()), Value::Integer(1), Value::Float(900.0)]
        );
        assert_eq!(
            rows[1],
            vec![Value::Text("food".into()), Value::Integer(3), Value::Float(215.5)]
        );

        let got = rows_of(run(
            &mut db,
            "SELECT category FROM transactions GROUP BY category HAVING COUNT(*) > 1",
        ));
        assert_eq!(got, vec![vec![Value::Text("food".into())]]);
    }

    fn rows_of(result: Result<QueryResult>) -> Vec<Vec<Value>> {
        match result.unwrap() {
            QueryResult::Select { rows, .. } => rows,
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_over_empty_table() {
        let mut db = seeded();
        let result = run(
            &mut db,
            "SELECT COUNT(*), SUM(amount) FROM transactions WHERE category = 'none'",
        )
        .unwrap();
        let (columns, rows) = result.select_rows().unwrap();
        assert_eq!(columns, ["COUNT(*)", "SUM(amount)"]);
        assert_eq!(rows, [vec![Value::Integer(0), Value::Null]]);
    }

    #[test]
    fn test_date_functions() {
        let mut db = seeded();
        let got = rows(
            &mut db,
            "SELECT id FROM transactions WHERE date >= DATE_SUB(NOW(), 7) ORDER BY id",
        );
        assert_eq!(got, vec![vec![Value::Integer(3)], vec![Value::Integer(5)]]);

        let got = rows(
            &mut db,
            "SELECT MONTH(date) AS m, COUNT(*) AS n FROM transactions WHERE YEAR(date) = 2024 GROUP BY date HAVING m = 2",
        );
        assert_eq!(got, vec![vec![Value::Integer(2), Value::Integer(1)]]);
    }

    #[test]
    fn test_update_and_delete() {
        let mut db = seeded();
        let result = run(&mut db, "UPDATE transactions SET amount = amount * 2 WHERE category = 'food'").unwrap();
        assert_eq!(result.affected_rows(), 3);
        assert_eq!(
            rows(&mut db, "SELECT amount FROM transactions WHERE id = 5"),
            vec![vec![Value::Float(31.0)]]
        );

        let result = run(&mut db, "DELETE FROM transactions WHERE amount < 100").unwrap();
        assert_eq!(result.affected_rows(), 2);
        assert_eq!(
            rows(&mut db, "SELECT COUNT(*) AS count FROM transactions"),
            vec![vec![Value::Integer(3)]]
        );
    }

    #[test]
    fn test_update_failure_rolls_back() {
        let mut db = seeded();
        // 'x' cannot become an INT, so no row may change
        run(&mut db, "CREATE TABLE notes (id INT PRIMARY KEY, body STRING, n INT)").unwrap();
        run(&mut db, "INSERT INTO notes (id, body, n) VALUES (1, '5', 0)").unwrap();
        run(&mut db, "INSERT INTO notes (id, body, n) VALUES (2, 'x', 0)").unwrap();

        let err = run(&mut db, "UPDATE notes SET n = body").unwrap_err();
        assert_eq!(err.kind(), "TypeMismatchError");
        assert_eq!(
            rows(&mut db, "SELECT n FROM notes ORDER BY id"),
            vec![vec![Value::Integer(0)], vec![Value::Integer(0)]]
        );
    }

    #[test]
    fn test_index_lookup_stays_consistent() {
        let mut db = seeded();
        run(&mut db, "CREATE INDEX idx_cat ON transactions (category)").unwrap();
        run(&mut db, "UPDATE transactions SET category = 'groceries' WHERE id = 1").unwrap();
        assert_eq!(
            rows(&mut db, "SELECT id FROM transactions WHERE category = 'food'"),
            vec![vec![Value::Integer(3)], vec![Value::Integer(5)]]
        );
        run(&mut db, "DELETE FROM transactions WHERE category = 'food'").unwrap();
        assert!(rows(&mut db, "SELECT id FROM transactions WHERE category = 'food'").is_empty());
        assert_eq!(
            rows(&mut db, "SELECT id FROM transactions WHERE category = 'groceries'"),
            vec![vec![Value::Integer(1)]]
        );
    }

    #[test]
    fn test_duplicate_key_leaves_table_unchanged() {
        let mut db = seeded();
        let err = run(
            &mut db,
            "INSERT INTO transactions (id, category, amount, date) VALUES (1, 'x', 1, NULL)",
        )
        .unwrap_err();
        assert_eq!(err.kind(), "DuplicateKeyError");
        assert_eq!(db.table("transactions").unwrap().len(), 5);
    }

    #[test]
    fn test_show_and_drop_tables() {
        let mut db = seeded();
        run(&mut db, "CREATE TABLE budgets (id INT PRIMARY KEY)").unwrap();
        assert_eq!(
            rows(&mut db, "SHOW TABLES"),
            vec![
                vec![Value::Text("budgets".into())],
                vec![Value::Text("transactions".into())]
            ]
        );
        run(&mut db, "DROP TABLE budgets").unwrap();
        let err = run(&mut db, "SELECT COUNT(*) FROM budgets").unwrap_err();
        assert_eq!(err.to_string(), "TableNotFoundError: Table 'budgets' does not exist");
    }

    #[test]
    fn test_query_rejects_mutation() {
        let db = seeded();
        let ctx = ExecutionContext::default();
        let stmt = parse_statement("DELETE FROM transactions").unwrap();
        let err = QueryExecutor::new(&ctx).query(&db, stmt).unwrap_err();
        assert_eq!(err.kind(), "InvalidQueryError");
    }
}
