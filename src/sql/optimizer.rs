/// Query Optimizer - index selection for single-table statements
///
/// # Architecture
/// ```ignore
/// SELECT * FROM transactions WHERE category = 'food' AND id = 7 AND amount > 10
///              ↓
///      Optimizer analyzes the top-level AND chain:
///       1. Equality candidates on indexed columns: [category, id]
///       2. Estimated rows: category → entries / distinct keys, id → 1
///       3. Cheapest: id
///              ↓
///      Selected plan: look up id = 7, then filter candidates by the full WHERE
/// ```
use super::ast::{BinaryOperator, Expr};
use crate::index::IndexStats;
use crate::storage::Table;
use crate::types::Value;

/// Query execution plan
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Selected scan method
    pub scan_method: ScanMethod,
    /// Estimated cost (lower is better)
    pub estimated_cost: f64,
    /// Estimated candidate rows before the WHERE filter
    pub estimated_rows: usize,
}

/// Scan method for data access
#[derive(Debug, Clone, PartialEq)]
pub enum ScanMethod {
    /// Visit every row
    FullScan,
    /// Hash index point lookup
    IndexLookup { column: String, value: Value },
}

/// Cost model parameters
#[derive(Debug, Clone)]
struct CostParameters {
    /// Cost of visiting one row
    row_read_cost: f64,
    /// Fixed cost of one hash lookup
    index_lookup_cost: f64,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            row_read_cost: 0.001,
            index_lookup_cost: 0.005,
        }
    }
}

/// Estimated matches for a point query against an index
fn estimate_point_query(stats: &IndexStats) -> usize {
    if stats.distinct_keys == 0 {
        0
    } else {
        (stats.entries as f64 / stats.distinct_keys as f64).ceil() as usize
    }
}

pub struct QueryOptimizer<'a> {
    table: &'a Table,
    cost_params: CostParameters,
}

impl<'a> QueryOptimizer<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            cost_params: CostParameters::default(),
        }
    }

    /// Choose how to find candidate rows for a WHERE clause
    pub fn optimize(&self, where_clause: Option<&Expr>) -> QueryPlan {
        let total_rows = self.table.len();
        let full_scan = QueryPlan {
            scan_method: ScanMethod::FullScan,
            estimated_cost: total_rows as f64 * self.cost_params.row_read_cost,
            estimated_rows: total_rows,
        };

        let Some(where_clause) = where_clause else {
            return full_scan;
        };

        let mut conjuncts = Vec::new();
        collect_conjuncts(where_clause, &mut conjuncts);

        // Any usable index beats a scan; the cost model ranks indexes
        conjuncts
            .into_iter()
            .filter_map(indexable_equality)
            .filter_map(|(column, value)| {
                let stats = self.table.index_stats(column)?;
                let rows = estimate_point_query(&stats);
                Some(QueryPlan {
                    scan_method: ScanMethod::IndexLookup {
                        column: column.to_string(),
                        value: value.clone(),
                    },
                    estimated_cost: self.cost_params.index_lookup_cost
                        + rows as f64 * self.cost_params.row_read_cost,
                    estimated_rows: rows,
                })
            })
            .min_by(|a, b| a.estimated_cost.total_cmp(&b.estimated_cost))
            .unwrap_or(full_scan)
    }
}

/// Flatten `a AND b AND c` into its terms
fn collect_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

/// `column = literal` (either side), with a non-NULL literal
fn indexable_equality(expr: &Expr) -> Option<(&str, &Value)> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expr::Column(c), Expr::Literal(v)) | (Expr::Literal(v), Expr::Column(c))
                if !v.is_null() =>
            {
                Some((c.as_str(), v))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::Statement;
    use crate::sql::parser::parse_statement;
    use crate::types::{ColumnDef, ColumnType, IndexDef, TableSchema};

    fn table() -> Table {
        let schema = TableSchema::new(
            "transactions",
            vec![
                ColumnDef::new("id", ColumnType::Integer).primary_key(),
                ColumnDef::new("category", ColumnType::Text),
                ColumnDef::new("amount", ColumnType::Float),
            ],
        )
        .unwrap();
        let mut table = Table::new(schema);
        for (i, cat) in ["food", "food", "rent", "food"].iter().enumerate() {
            table
                .insert(vec![
                    Value::Integer(i as i64 + 1),
                    Value::Text(cat.to_string()),
                    Value::Float(10.0),
                ])
                .unwrap();
        }
        table
    }

    fn where_of(sql: &str) -> Expr {
        match parse_statement(sql).unwrap() {
            Statement::Select(s) => s.where_clause.unwrap(),
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn test_no_where_is_full_scan() {
        let table = table();
        let plan = QueryOptimizer::new(&table).optimize(None);
        assert_eq!(plan.scan_method, ScanMethod::FullScan);
        assert_eq!(plan.estimated_rows, 4);
    }

    #[test]
    fn test_primary_key_equality_uses_index() {
        let table = table();
        let expr = where_of("SELECT * FROM transactions WHERE amount > 1 AND 3 = id");
        let plan = QueryOptimizer::new(&table).optimize(Some(&expr));
        assert_eq!(
            plan.scan_method,
            ScanMethod::IndexLookup {
                column: "id".into(),
                value: Value::Integer(3)
            }
        );
        assert_eq!(plan.estimated_rows, 1);
    }

    #[test]
    fn test_unindexed_or_disjunction_falls_back() {
        let mut table = table();
        let expr = where_of("SELECT * FROM transactions WHERE category = 'food'");
        assert_eq!(
            QueryOptimizer::new(&table).optimize(Some(&expr)).scan_method,
            ScanMethod::FullScan
        );

        let expr = where_of("SELECT * FROM transactions WHERE id = 1 OR id = 2");
        assert_eq!(
            QueryOptimizer::new(&table).optimize(Some(&expr)).scan_method,
            ScanMethod::FullScan
        );

        table.create_index(IndexDef::new("idx_cat", "category")).unwrap();
        let expr = where_of("SELECT * FROM transactions WHERE category = 'rent'");
        let plan = QueryOptimizer::new(&table).optimize(Some(&expr));
        assert!(matches!(plan.scan_method, ScanMethod::IndexLookup { ref column, .. } if column == "category"));
    }

    #[test]
    fn test_cheapest_index_wins() {
        let mut table = table();
        table.create_index(IndexDef::new("idx_cat", "category")).unwrap();
        let expr = where_of("SELECT * FROM transactions WHERE category = 'food' AND id = 2");
        let plan = QueryOptimizer::new(&table).optimize(Some(&expr));
        assert!(matches!(plan.scan_method, ScanMethod::IndexLookup { ref column, .. } if column == "id"));
    }
}
