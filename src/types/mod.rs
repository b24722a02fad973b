//! Value and schema types for the PesaDB engine

mod datetime;
mod table;

pub use datetime::{day_name, day_of_week, format_iso, parse_iso};
pub use table::{ColumnDef, ColumnType, ForeignKeyRef, IndexDef, TableSchema};

use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single cell value
///
/// Serialized untagged, so snapshots and HTTP responses carry plain JSON
/// scalars (`1`, `2.5`, `"abc"`, `true`, `null`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Text string
    Text(String),
    /// Null value
    Null,
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// SQL literal rendering, used in error messages
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_string(),
        }
    }

    /// Total order used by ORDER BY: NULL sorts first, then numbers,
    /// then booleans, then strings.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Integer(_) | Value::Float(_) => 1,
                Value::Bool(_) => 2,
                Value::Text(_) => 3,
            }
        }
        match self.partial_cmp(other) {
            Some(ord) => ord,
            None => rank(self).cmp(&rank(other)),
        }
    }

    /// Coerce a value into a column's declared type.
    ///
    /// Numeric strings are accepted by INT and FLOAT columns; integral floats
    /// by INT columns; 0/1 and 'true'/'false' by BOOL columns.
    pub fn coerce_to(self, col_type: ColumnType, column: &str) -> Result<Value> {
        let mismatch = |v: &Value| {
            DbError::TypeMismatch(format!(
                "Cannot convert {} to {} for column '{}'",
                v.to_sql_literal(),
                col_type.sql_name(),
                column
            ))
        };

        let coerced = match (col_type, &self) {
            (_, Value::Null) => Some(Value::Null),

            (ColumnType::Integer, Value::Integer(_)) => Some(self.clone()),
            (ColumnType::Integer, Value::Float(x)) => float_to_int(*x),
            (ColumnType::Integer, Value::Text(s)) => {
                let trimmed = s.trim();
                match trimmed.parse::<i64>() {
                    Ok(i) => Some(Value::Integer(i)),
                    Err(_) => trimmed.parse::<f64>().ok().and_then(float_to_int),
                }
            }

            (ColumnType::Float, Value::Float(_)) => Some(self.clone()),
            (ColumnType::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),
            (ColumnType::Float, Value::Text(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float),

            (ColumnType::Text, Value::Text(_)) => Some(self.clone()),

            (ColumnType::Boolean, Value::Bool(_)) => Some(self.clone()),
            (ColumnType::Boolean, Value::Integer(0)) => Some(Value::Bool(false)),
            (ColumnType::Boolean, Value::Integer(1)) => Some(Value::Bool(true)),
            (ColumnType::Boolean, Value::Text(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            _ => None,
        };

        coerced.ok_or_else(|| mismatch(&self))
    }
}

fn float_to_int(x: f64) -> Option<Value> {
    if x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
        Some(Value::Integer(x as i64))
    } else {
        None
    }
}

/// A stored row, values in schema column order
pub type Row = Vec<Value>;

/// Row identifier (unique within a table, never reused)
pub type RowId = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_numeric_compare() {
        assert!(Value::Integer(2) > Value::Float(1.5));
        assert_eq!(Value::Integer(2).partial_cmp(&Value::Float(2.0)), Some(Ordering::Equal));
        assert_eq!(Value::Null.partial_cmp(&Value::Null), None);
        assert_eq!(Value::Text("a".into()).partial_cmp(&Value::Integer(1)), None);
    }

    #[test]
    fn test_coerce_numeric_strings() {
        assert_eq!(
            Value::Text("100".into()).coerce_to(ColumnType::Integer, "amount").unwrap(),
            Value::Integer(100)
        );
        assert_eq!(
            Value::Text("100".into()).coerce_to(ColumnType::Float, "amount").unwrap(),
            Value::Float(100.0)
        );
        assert_eq!(
            Value::Float(3.0).coerce_to(ColumnType::Integer, "n").unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            Value::Integer(1).coerce_to(ColumnType::Boolean, "flag").unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_coerce_rejects_mismatch() {
        let err = Value::Text("abc".into())
            .coerce_to(ColumnType::Integer, "amount")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeMismatchError: Cannot convert 'abc' to INT for column 'amount'"
        );
        assert!(Value::Integer(5).coerce_to(ColumnType::Text, "name").is_err());
        assert!(Value::Float(2.5).coerce_to(ColumnType::Integer, "n").is_err());
    }

    #[test]
    fn test_null_coerces_anywhere() {
        for ty in [ColumnType::Integer, ColumnType::Float, ColumnType::Text, ColumnType::Boolean] {
            assert_eq!(Value::Null.coerce_to(ty, "c").unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_untagged_json() {
        let row = vec![
            Value::Integer(7),
            Value::Float(2.5),
            Value::Text("x".into()),
            Value::Bool(true),
            Value::Null,
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[7,2.5,"x",true,null]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_sort_cmp_nulls_first() {
        let mut values = vec![Value::Integer(3), Value::Null, Value::Integer(1)];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(values, vec![Value::Null, Value::Integer(1), Value::Integer(3)]);
    }
}
