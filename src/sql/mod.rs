/// PesaDB SQL engine
///
/// Architecture:
/// - Lexer: Tokenizes SQL strings
/// - Parser: Builds AST from tokens
/// - Binder: Validates the AST against a table schema
/// - Optimizer: Chooses index lookup or full scan
/// - Executor: Executes statements against a database

pub mod aggregate;
pub mod ast;
pub mod binder;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod token;

pub use ast::{BinaryOperator, Expr, SelectStmt, Statement};
pub use evaluator::{ExprEvaluator, PatternCache};
pub use executor::{ExecutionContext, QueryExecutor, QueryResult};
pub use lexer::{tokenize, Lexer};
pub use optimizer::{QueryOptimizer, QueryPlan, ScanMethod};
pub use parser::{parse_statement, Parser};
pub use token::{Token, TokenKind, TokenType};
