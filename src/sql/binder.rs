//! Statement validation against a table schema
//!
//! Checks run in a fixed order so the first reported error is predictable:
//! column existence for every referenced column, then statement shape
//! (INSERT column coverage, grouping rules), then literal coercion against
//! column types.

use super::ast::{BinaryOperator, Expr, InsertStmt, SelectColumn, SelectStmt, UpdateStmt};
use super::evaluator::{ExprEvaluator, NoRow};
use crate::error::{DbError, Result};
use crate::types::{Row, TableSchema, Value};
use std::collections::HashSet;

/// UPDATE with resolved column positions
#[derive(Debug, Clone)]
pub struct BoundUpdate {
    pub assignments: Vec<(usize, Expr)>,
    pub where_clause: Option<Expr>,
}

pub struct Binder<'a> {
    schema: &'a TableSchema,
}

impl<'a> Binder<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self { schema }
    }

    pub fn bind_select(&self, mut stmt: SelectStmt) -> Result<SelectStmt> {
        let aliases: HashSet<&str> = stmt
            .columns
            .iter()
            .filter_map(|c| match c {
                SelectColumn::Expr { alias: Some(a), .. } => Some(a.as_str()),
                _ => None,
            })
            .collect();

        for item in &stmt.columns {
            if let SelectColumn::Expr { expr, .. } = item {
                self.check_columns(expr, &HashSet::new())?;
            }
        }
        if let Some(where_clause) = &stmt.where_clause {
            self.check_columns(where_clause, &HashSet::new())?;
        }
        for column in stmt.group_by.iter().flatten() {
            self.schema.require_column(column)?;
        }
        if let Some(having) = &stmt.having {
            self.check_columns(having, &aliases)?;
        }
        for item in stmt.order_by.iter().flatten() {
            if !aliases.contains(item.column.as_str()) {
                self.schema.require_column(&item.column)?;
            }
        }

        self.check_grouping(&stmt)?;

        stmt.where_clause = stmt.where_clause.map(|e| self.coerce_literals(e)).transpose()?;
        Ok(stmt)
    }

    /// Resolve an INSERT into a full row in schema order
    pub fn bind_insert(&self, stmt: &InsertStmt, evaluator: &ExprEvaluator) -> Result<Row> {
        let mut positions = Vec::with_capacity(stmt.columns.len());
        for column in &stmt.columns {
            positions.push(self.schema.require_column(column)?);
        }

        if stmt.columns.len() != stmt.values.len() {
            return Err(DbError::InvalidQuery(format!(
                "INSERT has {} columns but {} values",
                stmt.columns.len(),
                stmt.values.len()
            )));
        }

        let mut seen = vec![false; self.schema.column_count()];
        for (column, &position) in stmt.columns.iter().zip(&positions) {
            if std::mem::replace(&mut seen[position], true) {
                return Err(DbError::Constraint(format!(
                    "Column '{}' specified more than once",
                    column
                )));
            }
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(DbError::Constraint(format!(
                "INSERT into '{}' must specify every column; missing '{}'",
                self.schema.name, self.schema.columns[missing].name
            )));
        }

        let ctx = NoRow { table: &self.schema.name };
        let mut row = vec![Value::Null; self.schema.column_count()];
        for (expr, &position) in stmt.values.iter().zip(&positions) {
            let col = &self.schema.columns[position];
            row[position] = evaluator.eval(expr, &ctx)?.coerce_to(col.col_type, &col.name)?;
        }

        let pk = self.schema.primary_key();
        if row[self.schema.primary_key_index()].is_null() {
            return Err(DbError::Constraint(format!(
                "Primary key column '{}' cannot be NULL",
                pk.name
            )));
        }
        Ok(row)
    }

    pub fn bind_update(&self, stmt: UpdateStmt) -> Result<BoundUpdate> {
        let mut positions = Vec::with_capacity(stmt.assignments.len());
        for (column, value) in &stmt.assignments {
            positions.push(self.schema.require_column(column)?);
            self.check_columns(value, &HashSet::new())?;
        }
        if let Some(where_clause) = &stmt.where_clause {
            self.check_columns(where_clause, &HashSet::new())?;
        }

        let mut seen = HashSet::new();
        for (column, _) in &stmt.assignments {
            if self.schema.primary_key().name == *column {
                return Err(DbError::Constraint(format!(
                    "Cannot update primary key column '{}'",
                    column
                )));
            }
            if !seen.insert(column.as_str()) {
                return Err(DbError::InvalidQuery(format!(
                    "Column '{}' assigned more than once",
                    column
                )));
            }
        }
        if let Some(where_clause) = &stmt.where_clause {
            reject_aggregates(where_clause, "WHERE")?;
        }

        let mut assignments = Vec::with_capacity(positions.len());
        for ((_, value), position) in stmt.assignments.into_iter().zip(positions) {
            reject_aggregates(&value, "SET")?;
            let col = &self.schema.columns[position];
            let value = match value {
                Expr::Literal(v) => Expr::Literal(v.coerce_to(col.col_type, &col.name)?),
                other => other,
            };
            assignments.push((position, value));
        }

        Ok(BoundUpdate {
            assignments,
            where_clause: stmt.where_clause.map(|e| self.coerce_literals(e)).transpose()?,
        })
    }

    /// Validate a standalone WHERE clause (DELETE)
    pub fn bind_where(&self, where_clause: Option<Expr>) -> Result<Option<Expr>> {
        let Some(expr) = where_clause else {
            return Ok(None);
        };
        self.check_columns(&expr, &HashSet::new())?;
        reject_aggregates(&expr, "WHERE")?;
        self.coerce_literals(expr).map(Some)
    }

    fn check_columns(&self, expr: &Expr, aliases: &HashSet<&str>) -> Result<()> {
        let mut missing = None;
        expr.walk(&mut |e| {
            if let Expr::Column(name) = e {
                if missing.is_none()
                    && self.schema.column_index(name).is_none()
                    && !aliases.contains(name.as_str())
                {
                    missing = Some(name.clone());
                }
            }
        });
        match missing {
            Some(name) => Err(DbError::column_not_found(&self.schema.name, &name)),
            None => Ok(()),
        }
    }

    fn check_grouping(&self, stmt: &SelectStmt) -> Result<()> {
        if let Some(where_clause) = &stmt.where_clause {
            reject_aggregates(where_clause, "WHERE")?;
        }

        let has_aggregate = stmt.columns.iter().any(|c| match c {
            SelectColumn::Expr { expr, .. } => expr.contains_aggregate(),
            SelectColumn::Star => false,
        }) || stmt.having.as_ref().map_or(false, Expr::contains_aggregate);

        let grouped: HashSet<&str> = match &stmt.group_by {
            Some(columns) => columns.iter().map(String::as_str).collect(),
            None if has_aggregate => HashSet::new(),
            None => {
                if stmt.having.is_some() {
                    return Err(DbError::InvalidQuery(
                        "HAVING requires GROUP BY or an aggregate".into(),
                    ));
                }
                return Ok(());
            }
        };

        for item in &stmt.columns {
            let expr = match item {
                SelectColumn::Star => {
                    return Err(DbError::InvalidQuery(
                        "SELECT * cannot be combined with aggregation".into(),
                    ))
                }
                SelectColumn::Expr { expr, .. } => expr,
            };
            if let Some(column) = ungrouped_column(expr, &grouped) {
                return Err(DbError::InvalidQuery(format!(
                    "Column '{}' must appear in GROUP BY or be used in an aggregate function",
                    column
                )));
            }
        }
        Ok(())
    }

    /// Coerce literals compared against a column to that column's type
    fn coerce_literals(&self, expr: Expr) -> Result<Expr> {
        Ok(match expr {
            Expr::BinaryOp { left, op, right } if op.is_comparison() => {
                match (*left, *right) {
                    (Expr::Column(c), Expr::Literal(v)) => {
                        let v = self.coerce_for(&c, v)?;
                        Expr::BinaryOp {
                            left: Box::new(Expr::Column(c)),
                            op,
                            right: Box::new(Expr::Literal(v)),
                        }
                    }
                    (Expr::Literal(v), Expr::Column(c)) => {
                        let v = self.coerce_for(&c, v)?;
                        Expr::BinaryOp {
                            left: Box::new(Expr::Literal(v)),
                            op,
                            right: Box::new(Expr::Column(c)),
                        }
                    }
                    (left, right) => Expr::BinaryOp {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                }
            }
            Expr::BinaryOp { left, op, right }
                if matches!(op, BinaryOperator::And | BinaryOperator::Or) =>
            {
                Expr::BinaryOp {
                    left: Box::new(self.coerce_literals(*left)?),
                    op,
                    right: Box::new(self.coerce_literals(*right)?),
                }
            }
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op,
                expr: Box::new(self.coerce_literals(*expr)?),
            },
            Expr::In { expr, list, negated } => {
                let list = match expr.as_ref() {
                    Expr::Column(c) => list
                        .into_iter()
                        .map(|item| match item {
                            Expr::Literal(v) => self.coerce_for(c, v).map(Expr::Literal),
                            other => Ok(other),
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => list,
                };
                Expr::In { expr, list, negated }
            }
            Expr::Between { expr, low, high, negated } => {
                let (low, high) = match expr.as_ref() {
                    Expr::Column(c) => (
                        Box::new(self.coerce_boxed(c, *low)?),
                        Box::new(self.coerce_boxed(c, *high)?),
                    ),
                    _ => (low, high),
                };
                Expr::Between { expr, low, high, negated }
            }
            other => other,
        })
    }

    fn coerce_boxed(&self, column: &str, expr: Expr) -> Result<Expr> {
        match expr {
            Expr::Literal(v) => self.coerce_for(column, v).map(Expr::Literal),
            other => Ok(other),
        }
    }

    fn coerce_for(&self, column: &str, value: Value) -> Result<Value> {
        match self.schema.column(column) {
            Some(col) => value.coerce_to(col.col_type, &col.name),
            None => Ok(value),
        }
    }
}

fn reject_aggregates(expr: &Expr, clause: &str) -> Result<()> {
    let mut found = None;
    expr.walk(&mut |e| {
        if found.is_none() && matches!(e, Expr::Aggregate { .. }) {
            found = Some(e.to_string());
        }
    });
    match found {
        Some(agg) => Err(DbError::InvalidQuery(format!(
            "Aggregate function {} is not allowed in {}",
            agg, clause
        ))),
        None => Ok(()),
    }
}

/// First column referenced outside an aggregate that is not grouped
fn ungrouped_column(expr: &Expr, grouped: &HashSet<&str>) -> Option<String> {
    match expr {
        Expr::Aggregate { .. } | Expr::Literal(_) => None,
        Expr::Column(name) if grouped.contains(name.as_str()) => None,
        Expr::Column(name) => Some(name.clone()),
        Expr::BinaryOp { left, right, .. } => {
            ungrouped_column(left, grouped).or_else(|| ungrouped_column(right, grouped))
        }
        Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => ungrouped_column(expr, grouped),
        Expr::Interval { amount, .. } => ungrouped_column(amount, grouped),
        Expr::Function { args, .. } => args.iter().find_map(|a| ungrouped_column(a, grouped)),
        Expr::In { expr, list, .. } => ungrouped_column(expr, grouped)
            .or_else(|| list.iter().find_map(|a| ungrouped_column(a, grouped))),
        Expr::Between { expr, low, high, .. } => ungrouped_column(expr, grouped)
            .or_else(|| ungrouped_column(low, grouped))
            .or_else(|| ungrouped_column(high, grouped)),
        Expr::Like { expr, pattern, .. } => {
            ungrouped_column(expr, grouped).or_else(|| ungrouped_column(pattern, grouped))
        }
    }
}
