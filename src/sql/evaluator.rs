/// Expression evaluator - evaluates expressions against rows
///
/// NULL follows SQL three-valued logic: comparisons with NULL yield NULL,
/// and a WHERE/HAVING condition only passes when it evaluates to TRUE.
use super::ast::{BinaryOperator, Expr, IntervalUnit, ScalarFunc, UnaryOperator};
use crate::error::{DbError, Result};
use crate::types::{self, Row, TableSchema, Value};
use chrono::{Duration, Months, NaiveDateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Source of column values for one evaluation
pub trait RowContext {
    /// Table name used in ColumnNotFound errors
    fn table(&self) -> &str;

    /// Value of a column (or, for grouped rows, a result alias)
    fn column(&self, name: &str) -> Option<Value>;

    /// Pre-computed aggregate result; only grouped rows have any
    fn aggregate(&self, _expr: &Expr) -> Option<Value> {
        None
    }
}

/// A stored row viewed through its schema
pub struct TableRow<'a> {
    pub schema: &'a TableSchema,
    pub row: &'a Row,
}

impl<'a> TableRow<'a> {
    pub fn new(schema: &'a TableSchema, row: &'a Row) -> Self {
        Self { schema, row }
    }
}

impl RowContext for TableRow<'_> {
    fn table(&self) -> &str {
        &self.schema.name
    }

    fn column(&self, name: &str) -> Option<Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.row.get(i))
            .cloned()
    }
}

/// Context for expressions that may not reference columns (INSERT VALUES)
pub struct NoRow<'a> {
    pub table: &'a str,
}

impl RowContext for NoRow<'_> {
    fn table(&self) -> &str {
        self.table
    }

    fn column(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Compiled LIKE pattern for fast matching. Matching is ASCII
/// case-insensitive; patterns and text are lowercased up front.
#[derive(Debug, Clone)]
enum CompiledPattern {
    /// Exact match: "abc" (no wildcards)
    Exact(String),
    /// Prefix match: "abc%"
    Prefix(String),
    /// Suffix match: "%abc"
    Suffix(String),
    /// Contains match: "%abc%"
    Contains(String),
    /// Anything else
    Complex(Vec<PatternSegment>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternSegment {
    Literal(char),
    AnyChar,  // _
    AnyChars, // %
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Self {
        let pattern = pattern.to_ascii_lowercase();
        let has_underscore = pattern.contains('_');
        let inner_percent = |s: &str| s.contains('%');

        if !has_underscore {
            if !inner_percent(&pattern) {
                return CompiledPattern::Exact(pattern);
            }
            let trimmed_start = pattern.strip_prefix('%');
            let trimmed_end = pattern.strip_suffix('%');
            match (trimmed_start, trimmed_end) {
                (None, Some(prefix)) if !inner_percent(prefix) => {
                    return CompiledPattern::Prefix(prefix.to_string())
                }
                (Some(suffix), None) if !inner_percent(suffix) => {
                    return CompiledPattern::Suffix(suffix.to_string())
                }
                (Some(_), Some(_)) if pattern.len() >= 2 => {
                    let middle = &pattern[1..pattern.len() - 1];
                    if !inner_percent(middle) {
                        return CompiledPattern::Contains(middle.to_string());
                    }
                }
                _ => {}
            }
        }

        let segments = pattern
            .chars()
            .map(|c| match c {
                '%' => PatternSegment::AnyChars,
                '_' => PatternSegment::AnyChar,
                c => PatternSegment::Literal(c),
            })
            .collect();
        CompiledPattern::Complex(segments)
    }

    #[inline]
    fn matches(&self, text: &str) -> bool {
        let text = text.to_ascii_lowercase();
        match self {
            CompiledPattern::Exact(pattern) => text == *pattern,
            CompiledPattern::Prefix(prefix) => text.starts_with(prefix.as_str()),
            CompiledPattern::Suffix(suffix) => text.ends_with(suffix.as_str()),
            CompiledPattern::Contains(substring) => text.contains(substring.as_str()),
            CompiledPattern::Complex(segments) => Self::match_segments(&text, segments),
        }
    }

    /// Greedy wildcard match, backtracking only to the most recent `%`
    fn match_segments(text: &str, segments: &[PatternSegment]) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut ti, mut si) = (0usize, 0usize);
        let mut backtrack: Option<(usize, usize)> = None;

        while ti < text.len() {
            match segments.get(si) {
                Some(PatternSegment::AnyChars) => {
                    backtrack = Some((si, ti));
                    si += 1;
                }
                Some(PatternSegment::AnyChar) => {
                    ti += 1;
                    si += 1;
                }
                Some(PatternSegment::Literal(c)) if *c == text[ti] => {
                    ti += 1;
                    si += 1;
                }
                _ => match backtrack {
                    Some((star_si, star_ti)) => {
                        si = star_si + 1;
                        ti = star_ti + 1;
                        backtrack = Some((star_si, star_ti + 1));
                    }
                    None => return false,
                },
            }
        }

        segments[si.min(segments.len())..]
            .iter()
            .all(|s| *s == PatternSegment::AnyChars)
    }
}

/// Shared cache of compiled LIKE patterns
#[derive(Clone)]
pub struct PatternCache {
    inner: Arc<Mutex<LruCache<String, Arc<CompiledPattern>>>>,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Arc<CompiledPattern> {
        let mut cache = self.inner.lock();
        if let Some(compiled) = cache.get(pattern) {
            return Arc::clone(compiled);
        }
        let compiled = Arc::new(CompiledPattern::compile(pattern));
        cache.put(pattern.to_string(), Arc::clone(&compiled));
        compiled
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(128)
    }
}

pub struct ExprEvaluator {
    /// NOW() for the statement being executed
    now: NaiveDateTime,
    patterns: PatternCache,
}

impl ExprEvaluator {
    pub fn new(now: NaiveDateTime, patterns: PatternCache) -> Self {
        Self { now, patterns }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Evaluate an expression against a row
    pub fn eval(&self, expr: &Expr, row: &dyn RowContext) -> Result<Value> {
        match expr {
            Expr::Column(name) => row
                .column(name)
                .ok_or_else(|| DbError::column_not_found(row.table(), name)),

            Expr::Literal(val) => Ok(val.clone()),

            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => {
                    let l = self.eval(left, row)?;
                    if matches!(l, Value::Bool(false)) {
                        return Ok(Value::Bool(false));
                    }
                    let r = self.eval(right, row)?;
                    Ok(and3(truth(&l)?, truth(&r)?))
                }
                BinaryOperator::Or => {
                    let l = self.eval(left, row)?;
                    if matches!(l, Value::Bool(true)) {
                        return Ok(Value::Bool(true));
                    }
                    let r = self.eval(right, row)?;
                    Ok(or3(truth(&l)?, truth(&r)?))
                }
                _ => {
                    let l = self.eval(left, row)?;
                    let r = self.eval(right, row)?;
                    self.eval_binary_op(*op, l, r)
                }
            },

            Expr::UnaryOp { op, expr } => {
                let val = self.eval(expr, row)?;
                match op {
                    UnaryOperator::Not => Ok(match truth(&val)? {
                        Some(b) => Value::Bool(!b),
                        None => Value::Null,
                    }),
                    UnaryOperator::Minus => match val {
                        Value::Integer(i) => i
                            .checked_neg()
                            .map(Value::Integer)
                            .ok_or_else(|| DbError::InvalidQuery("Integer overflow".into())),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        Value::Null => Ok(Value::Null),
                        other => Err(DbError::TypeMismatch(format!(
                            "Cannot negate {}",
                            other.to_sql_literal()
                        ))),
                    },
                }
            }

            Expr::Aggregate { .. } => row.aggregate(expr).ok_or_else(|| {
                DbError::InvalidQuery(format!("Aggregate function {} is not allowed here", expr))
            }),

            Expr::Function { func, args } => self.eval_function(*func, args, row),

            Expr::Interval { .. } => Err(DbError::InvalidQuery(
                "INTERVAL is only valid as the second argument of DATE_SUB".into(),
            )),

            Expr::In { expr, list, negated } => {
                let val = self.eval(expr, row)?;
                if val.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let item_val = self.eval(item, row)?;
                    match compare(&val, &item_val)? {
                        Some(Ordering::Equal) => return Ok(Value::Bool(!*negated)),
                        None => saw_null = true,
                        _ => {}
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Bool(*negated)
                })
            }

            Expr::Between { expr, low, high, negated } => {
                let val = self.eval(expr, row)?;
                let low_val = self.eval(low, row)?;
                let high_val = self.eval(high, row)?;

                let above = compare(&val, &low_val)?.map(|o| o != Ordering::Less);
                let below = compare(&val, &high_val)?.map(|o| o != Ordering::Greater);
                Ok(match and3(above, below) {
                    Value::Bool(b) => Value::Bool(b != *negated),
                    other => other,
                })
            }

            Expr::Like { expr, pattern, negated } => {
                let val = self.eval(expr, row)?;
                let pattern_val = self.eval(pattern, row)?;

                match (val, pattern_val) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (val, Value::Text(p)) => {
                        let text = match val {
                            Value::Text(s) => s,
                            other => other.to_string(),
                        };
                        let matches = self.patterns.get_or_compile(&p).matches(&text);
                        Ok(Value::Bool(matches != *negated))
                    }
                    (_, other) => Err(DbError::TypeMismatch(format!(
                        "LIKE pattern must be a string, got {}",
                        other.to_sql_literal()
                    ))),
                }
            }

            Expr::IsNull { expr, negated } => {
                let val = self.eval(expr, row)?;
                Ok(Value::Bool(val.is_null() != *negated))
            }
        }
    }

    /// Evaluate a condition; only TRUE passes
    pub fn eval_predicate(&self, expr: &Expr, row: &dyn RowContext) -> Result<bool> {
        let val = self.eval(expr, row)?;
        Ok(truth(&val)? == Some(true))
    }

    fn eval_binary_op(&self, op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        let test: Option<fn(Ordering) -> bool> = match op {
            BinaryOperator::Eq => Some(|o| o == Ordering::Equal),
            BinaryOperator::Ne => Some(|o| o != Ordering::Equal),
            BinaryOperator::Lt => Some(|o| o == Ordering::Less),
            BinaryOperator::Le => Some(|o| o != Ordering::Greater),
            BinaryOperator::Gt => Some(|o| o == Ordering::Greater),
            BinaryOperator::Ge => Some(|o| o != Ordering::Less),
            _ => None,
        };
        if let Some(test) = test {
            return Ok(match compare(&left, &right)? {
                Some(ord) => Value::Bool(test(ord)),
                None => Value::Null,
            });
        }

        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }

        let left = numeric_operand(left)?;
        let right = numeric_operand(right)?;
        let overflow = || DbError::InvalidQuery(format!("Integer overflow in '{}'", op));

        match (op, left, right) {
            (BinaryOperator::Add, Value::Integer(l), Value::Integer(r)) => {
                l.checked_add(r).map(Value::Integer).ok_or_else(overflow)
            }
            (BinaryOperator::Sub, Value::Integer(l), Value::Integer(r)) => {
                l.checked_sub(r).map(Value::Integer).ok_or_else(overflow)
            }
            (BinaryOperator::Mul, Value::Integer(l), Value::Integer(r)) => {
                l.checked_mul(r).map(Value::Integer).ok_or_else(overflow)
            }
            (BinaryOperator::Div, Value::Integer(_), Value::Integer(0)) => Ok(Value::Null),
            (BinaryOperator::Div, Value::Integer(l), Value::Integer(r)) => {
                Ok(Value::Float(l as f64 / r as f64))
            }
            (op, l, r) => {
                let (l, r) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
                Ok(match op {
                    BinaryOperator::Add => Value::Float(l + r),
                    BinaryOperator::Sub => Value::Float(l - r),
                    BinaryOperator::Mul => Value::Float(l * r),
                    _ if r == 0.0 => Value::Null,
                    _ => Value::Float(l / r),
                })
            }
        }
    }

    fn eval_function(&self, func: ScalarFunc, args: &[Expr], row: &dyn RowContext) -> Result<Value> {
        match func {
            ScalarFunc::Now => Ok(Value::Text(types::format_iso(&self.now))),

            ScalarFunc::DateSub => {
                let (base_expr, amount_expr) = match args {
                    [base, amount] => (base, amount),
                    _ => return Err(DbError::InvalidQuery("DATE_SUB takes two arguments".into())),
                };
                let base = match self.eval(base_expr, row)? {
                    Value::Text(s) => match types::parse_iso(&s) {
                        Some(dt) => dt,
                        None => return Ok(Value::Null),
                    },
                    _ => return Ok(Value::Null),
                };
                let (amount, unit) = match amount_expr {
                    Expr::Interval { amount, unit } => (self.eval(amount, row)?, *unit),
                    other => (self.eval(other, row)?, IntervalUnit::Day),
                };
                let amount = match amount.clone().coerce_to(types::ColumnType::Integer, "DATE_SUB") {
                    Ok(Value::Integer(n)) => n,
                    Ok(_) => return Ok(Value::Null),
                    Err(_) => {
                        return Err(DbError::TypeMismatch(format!(
                            "DATE_SUB amount must be an integer, got {}",
                            amount.to_sql_literal()
                        )))
                    }
                };
                Ok(subtract_interval(base, amount, unit)
                    .map(|dt| Value::Text(types::format_iso(&dt)))
                    .unwrap_or(Value::Null))
            }

            ScalarFunc::Year
            | ScalarFunc::Month
            | ScalarFunc::Day
            | ScalarFunc::DayName
            | ScalarFunc::DayOfWeek => {
                let arg = match args {
                    [arg] => self.eval(arg, row)?,
                    _ => {
                        return Err(DbError::InvalidQuery(format!(
                            "{} takes one argument",
                            func.name()
                        )))
                    }
                };
                let dt = match arg.as_str().and_then(types::parse_iso) {
                    Some(dt) => dt,
                    None => return Ok(Value::Null),
                };
                use chrono::Datelike;
                Ok(match func {
                    ScalarFunc::Year => Value::Integer(dt.year() as i64),
                    ScalarFunc::Month => Value::Integer(dt.month() as i64),
                    ScalarFunc::Day => Value::Integer(dt.day() as i64),
                    ScalarFunc::DayName => Value::Text(types::day_name(&dt).to_string()),
                    _ => Value::Integer(types::day_of_week(&dt)),
                })
            }
        }
    }
}

impl Default for ExprEvaluator {
    fn default() -> Self {
        Self::new(Utc::now().naive_utc(), PatternCache::default())
    }
}

fn subtract_interval(base: NaiveDateTime, amount: i64, unit: IntervalUnit) -> Option<NaiveDateTime> {
    let months = |n: i64| -> Option<NaiveDateTime> {
        let n = u32::try_from(n.unsigned_abs()).ok()?;
        if amount >= 0 {
            base.checked_sub_months(Months::new(n))
        } else {
            base.checked_add_months(Months::new(n))
        }
    };
    match unit {
        IntervalUnit::Minute => base.checked_sub_signed(Duration::try_minutes(amount)?),
        IntervalUnit::Hour => base.checked_sub_signed(Duration::try_hours(amount)?),
        IntervalUnit::Day => base.checked_sub_signed(Duration::try_days(amount)?),
        IntervalUnit::Week => base.checked_sub_signed(Duration::try_weeks(amount)?),
        IntervalUnit::Month => months(amount),
        IntervalUnit::Year => months(amount.checked_mul(12)?),
    }
}

/// SQL truth value of a condition result
fn truth(val: &Value) -> Result<Option<bool>> {
    match val {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Integer(i) => Ok(Some(*i != 0)),
        Value::Null => Ok(None),
        other => Err(DbError::TypeMismatch(format!(
            "Expected a boolean condition, got {}",
            other.to_sql_literal()
        ))),
    }
}

fn and3(l: Option<bool>, r: Option<bool>) -> Value {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn or3(l: Option<bool>, r: Option<bool>) -> Value {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn numeric_operand(val: Value) -> Result<Value> {
    match val {
        Value::Integer(_) | Value::Float(_) => Ok(val),
        Value::Text(ref s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Ok(Value::Integer(i))
            } else if let Ok(x) = trimmed.parse::<f64>() {
                Ok(Value::Float(x))
            } else {
                Err(DbError::TypeMismatch(format!(
                    "Cannot use {} in arithmetic",
                    val.to_sql_literal()
                )))
            }
        }
        other => Err(DbError::TypeMismatch(format!(
            "Cannot use {} in arithmetic",
            other.to_sql_literal()
        ))),
    }
}

/// Compare two values. `None` when either side is NULL.
///
/// A numeric string compared with a number is compared numerically; other
/// mixed-type comparisons are a TypeMismatchError.
pub fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    if let Some(ord) = left.partial_cmp(right) {
        return Ok(Some(ord));
    }

    let as_number = |v: &Value| match v {
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_f64(),
    };
    match (left, right) {
        (Value::Text(_), Value::Text(_)) => {}
        _ => {
            if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
                return Ok(l.partial_cmp(&r));
            }
        }
    }

    Err(DbError::TypeMismatch(format!(
        "Cannot compare {} with {}",
        left.to_sql_literal(),
        right.to_sql_literal()
    )))
}
