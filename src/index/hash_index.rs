//! Hash index: column value -> set of row ids
//!
//! Serves equality lookups in O(1) average. NULL values are never indexed
//! since `col = NULL` can never be true.

use crate::types::{RowId, Value};
use ahash::{AHashMap, AHashSet};

/// Hashable form of a non-NULL value.
///
/// Integral floats (including `-0.0`) fold onto the integer key so `100`
/// and `100.0` hit the same bucket; other floats hash by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(String),
}

impl IndexKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Integer(i) => Some(IndexKey::Int(*i)),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
                    Some(IndexKey::Int(*x as i64))
                } else {
                    Some(IndexKey::Float(x.to_bits()))
                }
            }
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Text(s) => Some(IndexKey::Text(s.clone())),
        }
    }
}

/// Index statistics (used by the planner)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of distinct keys
    pub distinct_keys: usize,
    /// Number of (key, row id) entries
    pub entries: usize,
}

#[derive(Debug, Clone)]
pub struct HashIndex {
    column: String,
    position: usize,
    map: AHashMap<IndexKey, AHashSet<RowId>>,
    entries: usize,
}

impl HashIndex {
    /// Empty index over the column at `position` in each row
    pub fn new(column: impl Into<String>, position: usize) -> Self {
        Self {
            column: column.into(),
            position,
            map: AHashMap::new(),
            entries: 0,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn insert(&mut self, row_id: RowId, value: &Value) {
        if let Some(key) = IndexKey::from_value(value) {
            if self.map.entry(key).or_default().insert(row_id) {
                self.entries += 1;
            }
        }
    }

    pub fn remove(&mut self, row_id: RowId, value: &Value) {
        let Some(key) = IndexKey::from_value(value) else {
            return;
        };
        if let Some(ids) = self.map.get_mut(&key) {
            if ids.remove(&row_id) {
                self.entries -= 1;
            }
            if ids.is_empty() {
                self.map.remove(&key);
            }
        }
    }

    /// Matching row ids in ascending order (insertion order)
    pub fn lookup(&self, value: &Value) -> Vec<RowId> {
        let mut ids: Vec<RowId> = IndexKey::from_value(value)
            .and_then(|key| self.map.get(&key))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn contains(&self, value: &Value) -> bool {
        IndexKey::from_value(value)
            .and_then(|key| self.map.get(&key))
            .map_or(false, |ids| !ids.is_empty())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            distinct_keys: self.map.len(),
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_lookup_remove() {
        let mut index = HashIndex::new("category_id", 1);
        index.insert(1, &Value::Text("food".into()));
        index.insert(2, &Value::Text("rent".into()));
        index.insert(3, &Value::Text("food".into()));

        assert_eq!(index.lookup(&Value::Text("food".into())), vec![1, 3]);
        assert!(index.lookup(&Value::Text("fuel".into())).is_empty());

        index.remove(1, &Value::Text("food".into()));
        assert_eq!(index.lookup(&Value::Text("food".into())), vec![3]);
        assert_eq!(index.stats(), IndexStats { distinct_keys: 2, entries: 2 });

        index.remove(3, &Value::Text("food".into()));
        assert!(!index.contains(&Value::Text("food".into())));
        assert_eq!(index.stats().distinct_keys, 1);
    }

    #[test]
    fn test_nulls_not_indexed() {
        let mut index = HashIndex::new("note", 0);
        index.insert(1, &Value::Null);
        assert_eq!(index.stats().entries, 0);
        assert!(index.lookup(&Value::Null).is_empty());
    }

    #[test]
    fn test_numeric_keys_fold() {
        let mut index = HashIndex::new("amount", 0);
        index.insert(7, &Value::Float(100.0));
        assert_eq!(index.lookup(&Value::Integer(100)), vec![7]);
        index.insert(8, &Value::Float(-0.0));
        assert_eq!(index.lookup(&Value::Float(0.0)), vec![8]);
        index.insert(9, &Value::Float(2.5));
        assert_eq!(index.lookup(&Value::Float(2.5)), vec![9]);
    }

    #[test]
    fn test_duplicate_insert_counted_once() {
        let mut index = HashIndex::new("id", 0);
        index.insert(1, &Value::Integer(5));
        index.insert(1, &Value::Integer(5));
        assert_eq!(index.stats().entries, 1);
    }
}
