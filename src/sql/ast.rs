/// Abstract Syntax Tree for SQL statements
use crate::types::{TableSchema, Value};
use std::fmt;

/// Top-level SQL statement
#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    CreateIndex(CreateIndexStmt),
    DropTable(DropTableStmt),
    ShowTables,
}

impl Statement {
    /// Whether the statement needs the database's write lock
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Statement::Select(_) | Statement::ShowTables)
    }

    /// Statement kind for logging
    pub fn name(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::CreateTable(_) => "CREATE TABLE",
            Statement::CreateIndex(_) => "CREATE INDEX",
            Statement::DropTable(_) => "DROP TABLE",
            Statement::ShowTables => "SHOW TABLES",
        }
    }
}

/// SELECT statement
#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub columns: Vec<SelectColumn>,
    pub from: String,
    pub where_clause: Option<Expr>,
    pub group_by: Option<Vec<String>>,
    pub having: Option<Expr>,
    pub order_by: Option<Vec<OrderByExpr>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Column in SELECT list
#[derive(Debug, Clone)]
pub enum SelectColumn {
    /// SELECT *
    Star,
    /// SELECT expr [AS alias]
    Expr { expr: Expr, alias: Option<String> },
}

/// ORDER BY item: a column or a result alias
#[derive(Debug, Clone)]
pub struct OrderByExpr {
    pub column: String,
    pub asc: bool,
}

/// INSERT statement (single row, explicit column list)
#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Expr>,
}

/// UPDATE statement
#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
}

/// DELETE statement
#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table: String,
    pub where_clause: Option<Expr>,
}

/// CREATE TABLE statement, schema already validated
#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub schema: TableSchema,
}

/// CREATE INDEX name ON table (column)
#[derive(Debug, Clone)]
pub struct CreateIndexStmt {
    pub index_name: String,
    pub table: String,
    pub column: String,
}

/// DROP TABLE statement
#[derive(Debug, Clone)]
pub struct DropTableStmt {
    pub table: String,
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    /// COUNT/SUM/AVG/MIN/MAX
    Aggregate {
        func: AggregateFunc,
        /// `None` for `COUNT(*)`
        arg: Option<Box<Expr>>,
        distinct: bool,
    },
    /// Scalar date functions
    Function { func: ScalarFunc, args: Vec<Expr> },
    /// `INTERVAL n UNIT`, only valid as the second DATE_SUB argument
    Interval { amount: Box<Expr>, unit: IntervalUnit },
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    IsNull { expr: Box<Expr>, negated: bool },
}

impl Expr {
    /// Whether an aggregate call appears anywhere in the tree
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    /// Visit every node, parents before children. Aggregate arguments are
    /// visited too.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => expr.walk(visit),
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.walk(visit);
                }
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Interval { amount, .. } => amount.walk(visit),
            Expr::In { expr, list, .. } => {
                expr.walk(visit);
                for item in list {
                    item.walk(visit);
                }
            }
            Expr::Between { expr, low, high, .. } => {
                expr.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk(visit);
                pattern.walk(visit);
            }
        }
    }
}

/// Canonical SQL text, used to name unaliased result columns
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(v) => write!(f, "{}", v.to_sql_literal()),
            Expr::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::UnaryOp { op: UnaryOperator::Not, expr } => write!(f, "NOT {}", expr),
            Expr::UnaryOp { op: UnaryOperator::Minus, expr } => write!(f, "-{}", expr),
            Expr::Aggregate { func, arg, distinct } => {
                let distinct = if *distinct { "DISTINCT " } else { "" };
                match arg {
                    Some(arg) => write!(f, "{}({}{})", func, distinct, arg),
                    None => write!(f, "{}(*)", func),
                }
            }
            Expr::Function { func, args } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Interval { amount, unit } => write!(f, "INTERVAL {} {}", amount, unit.name()),
            Expr::In { expr, list, negated } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expr::Between { expr, low, high, negated } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                expr,
                if *negated { "NOT " } else { "" },
                low,
                high
            ),
            Expr::Like { expr, pattern, negated } => write!(
                f,
                "{} {}LIKE {}",
                expr,
                if *negated { "NOT " } else { "" },
                pattern
            ),
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOperator {
    /// Get operator precedence (higher = binds tighter)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Gt
            | BinaryOperator::Ge => COMPARISON_PRECEDENCE,
            BinaryOperator::Add | BinaryOperator::Sub => 4,
            BinaryOperator::Mul | BinaryOperator::Div => 5,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == COMPARISON_PRECEDENCE
    }
}

/// Precedence shared by comparisons and the LIKE/IN/BETWEEN/IS predicates
pub const COMPARISON_PRECEDENCE: u8 = 3;

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        };
        f.write_str(s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        };
        f.write_str(s)
    }
}

/// Scalar (date) functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunc {
    Year,
    Month,
    Day,
    DayName,
    DayOfWeek,
    Now,
    DateSub,
}

impl ScalarFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "YEAR" => Some(ScalarFunc::Year),
            "MONTH" => Some(ScalarFunc::Month),
            "DAY" | "DAYOFMONTH" => Some(ScalarFunc::Day),
            "DAYNAME" => Some(ScalarFunc::DayName),
            "DAYOFWEEK" => Some(ScalarFunc::DayOfWeek),
            "NOW" => Some(ScalarFunc::Now),
            "DATE_SUB" => Some(ScalarFunc::DateSub),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunc::Year => "YEAR",
            ScalarFunc::Month => "MONTH",
            ScalarFunc::Day => "DAY",
            ScalarFunc::DayName => "DAYNAME",
            ScalarFunc::DayOfWeek => "DAYOFWEEK",
            ScalarFunc::Now => "NOW",
            ScalarFunc::DateSub => "DATE_SUB",
        }
    }

    /// Number of arguments the function takes
    pub fn arity(&self) -> usize {
        match self {
            ScalarFunc::Now => 0,
            ScalarFunc::DateSub => 2,
            _ => 1,
        }
    }
}

/// DATE_SUB interval units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().trim_end_matches('S') {
            "MINUTE" => Some(IntervalUnit::Minute),
            "HOUR" => Some(IntervalUnit::Hour),
            "DAY" => Some(IntervalUnit::Day),
            "WEEK" => Some(IntervalUnit::Week),
            "MONTH" => Some(IntervalUnit::Month),
            "YEAR" => Some(IntervalUnit::Year),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntervalUnit::Minute => "MINUTE",
            IntervalUnit::Hour => "HOUR",
            IntervalUnit::Day => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Year => "YEAR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        let count_star = Expr::Aggregate { func: AggregateFunc::Count, arg: None, distinct: false };
        assert_eq!(count_star.to_string(), "COUNT(*)");

        let sum = Expr::Aggregate {
            func: AggregateFunc::Sum,
            arg: Some(Box::new(Expr::Column("amount".into()))),
            distinct: false,
        };
        assert_eq!(sum.to_string(), "SUM(amount)");

        let year = Expr::Function { func: ScalarFunc::Year, args: vec![Expr::Column("date".into())] };
        assert_eq!(year.to_string(), "YEAR(date)");
    }

    #[test]
    fn test_contains_aggregate() {
        let having = Expr::BinaryOp {
            left: Box::new(Expr::Aggregate { func: AggregateFunc::Count, arg: None, distinct: false }),
            op: BinaryOperator::Gt,
            right: Box::new(Expr::Literal(Value::Integer(0))),
        };
        assert!(having.contains_aggregate());
        assert!(!Expr::Column("a".into()).contains_aggregate());
    }

    #[test]
    fn test_interval_unit_plural() {
        assert_eq!(IntervalUnit::from_name("days"), Some(IntervalUnit::Day));
        assert_eq!(IntervalUnit::from_name("Month"), Some(IntervalUnit::Month));
        assert_eq!(IntervalUnit::from_name("fortnight"), None);
    }
}
