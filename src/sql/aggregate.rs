//! GROUP BY partitioning and aggregate accumulators

use super::ast::{AggregateFunc, Expr, SelectColumn, SelectStmt};
use super::evaluator::{ExprEvaluator, RowContext, TableRow};
use crate::error::{DbError, Result};
use crate::index::IndexKey;
use crate::types::{Row, TableSchema, Value};
use ahash::{AHashMap, AHashSet};
use std::cmp::Ordering;

/// Rows sharing one set of GROUP BY values
#[derive(Debug)]
pub struct Group<'r> {
    pub key: Vec<Value>,
    pub rows: Vec<&'r Row>,
}

/// Partition rows by the values at `positions`, keeping first-seen group
/// order. NULLs group together.
pub fn partition<'r>(rows: &[&'r Row], positions: &[usize]) -> Vec<Group<'r>> {
    let mut groups: Vec<Group<'r>> = Vec::new();
    let mut lookup: AHashMap<Vec<Option<IndexKey>>, usize> = AHashMap::new();

    for &row in rows {
        let hash_key: Vec<Option<IndexKey>> =
            positions.iter().map(|&p| IndexKey::from_value(&row[p])).collect();
        match lookup.get(&hash_key) {
            Some(&slot) => groups[slot].rows.push(row),
            None => {
                lookup.insert(hash_key, groups.len());
                groups.push(Group {
                    key: positions.iter().map(|&p| row[p].clone()).collect(),
                    rows: vec![row],
                });
            }
        }
    }
    groups
}

/// Distinct aggregate calls in the select list and HAVING, in first-seen order
pub fn collect_aggregates(stmt: &SelectStmt) -> Vec<Expr> {
    let mut found: Vec<Expr> = Vec::new();
    let mut visit = |e: &Expr| {
        if matches!(e, Expr::Aggregate { .. }) && !found.contains(e) {
            found.push(e.clone());
        }
    };
    for item in &stmt.columns {
        if let SelectColumn::Expr { expr, .. } = item {
            expr.walk(&mut visit);
        }
    }
    if let Some(having) = &stmt.having {
        having.walk(&mut visit);
    }
    found
}

/// Running state of one aggregate call over one group
#[derive(Debug)]
pub struct Accumulator {
    func: AggregateFunc,
    seen: Option<AHashSet<IndexKey>>,
    count: i64,
    int_sum: Option<i64>,
    float_sum: f64,
    saw_float: bool,
    extreme: Option<Value>,
}

impl Accumulator {
    pub fn new(func: AggregateFunc, distinct: bool) -> Self {
        Self {
            func,
            seen: distinct.then(AHashSet::new),
            count: 0,
            int_sum: Some(0),
            float_sum: 0.0,
            saw_float: false,
            extreme: None,
        }
    }

    /// Feed one value; `COUNT(*)` feeds a non-NULL placeholder per row
    pub fn update(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if let Some(seen) = self.seen.as_mut() {
            if let Some(key) = IndexKey::from_value(&value) {
                if !seen.insert(key) {
                    return Ok(());
                }
            }
        }
        self.count += 1;

        match self.func {
            AggregateFunc::Count => {}
            AggregateFunc::Sum | AggregateFunc::Avg => match value {
                Value::Integer(i) => {
                    self.int_sum = self.int_sum.and_then(|s| s.checked_add(i));
                    self.float_sum += i as f64;
                }
                Value::Float(x) => {
                    self.saw_float = true;
                    self.float_sum += x;
                }
                other => {
                    return Err(DbError::TypeMismatch(format!(
                        "{} requires numeric values, got {}",
                        self.func,
                        other.to_sql_literal()
                    )))
                }
            },
            AggregateFunc::Min | AggregateFunc::Max => {
                let wanted = if self.func == AggregateFunc::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let replace = match &self.extreme {
                    None => true,
                    Some(current) => value.sort_cmp(current) == wanted,
                };
                if replace {
                    self.extreme = Some(value);
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Value {
        match self.func {
            AggregateFunc::Count => Value::Integer(self.count),
            _ if self.count == 0 => Value::Null,
            AggregateFunc::Sum => match self.int_sum {
                Some(sum) if !self.saw_float => Value::Integer(sum),
                _ => Value::Float(self.float_sum),
            },
            AggregateFunc::Avg => Value::Float(self.float_sum / self.count as f64),
            AggregateFunc::Min | AggregateFunc::Max => self.extreme.unwrap_or(Value::Null),
        }
    }
}

/// Evaluate every aggregate call over a group's rows
pub fn compute_aggregates(
    aggregates: &[Expr],
    rows: &[&Row],
    schema: &TableSchema,
    evaluator: &ExprEvaluator,
) -> Result<Vec<Value>> {
    aggregates
        .iter()
        .map(|expr| {
            let Expr::Aggregate { func, arg, distinct } = expr else {
                return Err(DbError::InvalidQuery(format!("{} is not an aggregate", expr)));
            };
            let mut acc = Accumulator::new(*func, *distinct);
            for row in rows {
                let value = match arg {
                    Some(arg) => evaluator.eval(arg, &TableRow::new(schema, row))?,
                    None => Value::Bool(true),
                };
                acc.update(value)?;
            }
            Ok(acc.finish())
        })
        .collect()
}

/// A finished group as seen by projection, HAVING and ORDER BY
pub struct GroupRow<'a> {
    table: &'a str,
    group_columns: &'a [String],
    key: &'a [Value],
    aggregates: &'a [Expr],
    values: &'a [Value],
    aliases: Vec<(String, Value)>,
}

impl<'a> GroupRow<'a> {
    pub fn new(
        table: &'a str,
        group_columns: &'a [String],
        key: &'a [Value],
        aggregates: &'a [Expr],
        values: &'a [Value],
    ) -> Self {
        Self {
            table,
            group_columns,
            key,
            aggregates,
            values,
            aliases: Vec::new(),
        }
    }

    /// Make a projected result column visible by name
    pub fn set_alias(&mut self, name: impl Into<String>, value: Value) {
        self.aliases.push((name.into(), value));
    }
}

impl RowContext for GroupRow<'_> {
    fn table(&self) -> &str {
        self.table
    }

    fn column(&self, name: &str) -> Option<Value> {
        self.group_columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.key[i].clone())
            .or_else(|| {
                self.aliases
                    .iter()
                    .find(|(alias, _)| alias == name)
                    .map(|(_, v)| v.clone())
            })
    }

    fn aggregate(&self, expr: &Expr) -> Option<Value> {
        self.aggregates
            .iter()
            .position(|a| a == expr)
            .map(|i| self.values[i].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        vec![
            vec![Value::Integer(1), Value::Text("food".into()), Value::Integer(10)],
            vec![Value::Integer(2), Value::Text("rent".into()), Value::Integer(900)],
            vec![Value::Integer(3), Value::Text("food".into()), Value::Null],
            vec![Value::Integer(4), Value::Null, Value::Integer(5)],
            vec![Value::Integer(5), Value::Text("food".into()), Value::Integer(10)],
        ]
    }

    #[test]
    fn test_partition_first_seen_order() {
        let rows = rows();
        let refs: Vec<&Row> = rows.iter().collect();
        let groups = partition(&refs, &[1]);
        let keys: Vec<Value> = groups.iter().map(|g| g.key[0].clone()).collect();
        assert_eq!(
            keys,
            vec![Value::Text("food".into()), Value::Text("rent".into()), Value::Null]
        );
        assert_eq!(groups[0].rows.len(), 3);
    }

    #[test]
    fn test_accumulators_skip_null() {
        let values = [Value::Integer(10), Value::Null, Value::Integer(10), Value::Integer(4)];
        let run = |func, distinct| {
            let mut acc = Accumulator::new(func, distinct);
            for v in &values {
                acc.update(v.clone()).unwrap();
            }
            acc.finish()
        };
        assert_eq!(run(AggregateFunc::Count, false), Value::Integer(3));
        assert_eq!(run(AggregateFunc::Count, true), Value::Integer(2));
        assert_eq!(run(AggregateFunc::Sum, false), Value::Integer(24));
        assert_eq!(run(AggregateFunc::Avg, false), Value::Float(8.0));
        assert_eq!(run(AggregateFunc::Min, false), Value::Integer(4));
        assert_eq!(run(AggregateFunc::Max, false), Value::Integer(10));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Accumulator::new(AggregateFunc::Count, false).finish(), Value::Integer(0));
        assert_eq!(Accumulator::new(AggregateFunc::Sum, false).finish(), Value::Null);
        assert_eq!(Accumulator::new(AggregateFunc::Max, false).finish(), Value::Null);
    }

    #[test]
    fn test_sum_mixed_numeric_is_float() {
        let mut acc = Accumulator::new(AggregateFunc::Sum, false);
        acc.update(Value::Integer(1)).unwrap();
        acc.update(Value::Float(0.5)).unwrap();
        assert_eq!(acc.finish(), Value::Float(1.5));

        let mut acc = Accumulator::new(AggregateFunc::Sum, false);
        assert!(acc.update(Value::Text("x".into())).is_err());
    }
}
