/// SQL Parser - converts tokens into AST
///
/// Every syntax error has the shape `Expected <what> near '<lexeme>'`,
/// pointing at the first token that cannot continue the grammar.
use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenType};
use crate::error::{DbError, Result};
use crate::types::{ColumnDef, ColumnType, TableSchema, Value};

/// Deepest expression nesting accepted before the input is rejected
const MAX_EXPR_DEPTH: usize = 128;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// Parse exactly one statement; a trailing `;` is optional
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = match &self.current().token_type {
            TokenType::Select => Statement::Select(self.parse_select()?),
            TokenType::Insert => Statement::Insert(self.parse_insert()?),
            TokenType::Update => Statement::Update(self.parse_update()?),
            TokenType::Delete => Statement::Delete(self.parse_delete()?),
            TokenType::Create => self.parse_create()?,
            TokenType::Drop => self.parse_drop()?,
            TokenType::Show => self.parse_show()?,
            _ => return Err(self.error("statement")),
        };

        self.match_token(TokenType::Semicolon);
        if !matches!(self.current().token_type, TokenType::Eof) {
            return Err(self.error("EOF"));
        }

        Ok(stmt)
    }

    /// Parse SELECT statement
    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect(TokenType::Select)?;

        let columns = self.parse_select_columns()?;

        self.expect(TokenType::From)?;
        let from = self.parse_name()?;

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(1)?)
        } else {
            None
        };

        let group_by = if self.match_token(TokenType::Group) {
            self.expect(TokenType::By)?;
            Some(self.parse_name_list()?)
        } else {
            None
        };

        let having = if self.match_token(TokenType::Having) {
            Some(self.parse_expr(1)?)
        } else {
            None
        };

        let order_by = if self.match_token(TokenType::Order) {
            self.expect(TokenType::By)?;
            Some(self.parse_order_by()?)
        } else {
            None
        };

        let limit = if self.match_token(TokenType::Limit) {
            Some(self.parse_usize()?)
        } else {
            None
        };

        let offset = if self.match_token(TokenType::Offset) {
            Some(self.parse_usize()?)
        } else {
            None
        };

        Ok(SelectStmt {
            columns,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>> {
        let mut columns = Vec::new();

        loop {
            if self.match_token(TokenType::Star) {
                columns.push(SelectColumn::Star);
            } else {
                let expr = self.parse_expr(1)?;
                let alias = if self.match_token(TokenType::As) {
                    Some(self.parse_name()?)
                } else if let TokenType::Identifier(name) = &self.current().token_type {
                    let name = name.clone();
                    self.advance();
                    Some(name)
                } else {
                    None
                };
                columns.push(SelectColumn::Expr { expr, alias });
            }

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut items = Vec::new();

        loop {
            let column = self.parse_name()?;
            let asc = if self.match_token(TokenType::Desc) {
                false
            } else {
                self.match_token(TokenType::Asc);
                true
            };
            items.push(OrderByExpr { column, asc });

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(items)
    }

    /// INSERT INTO t (c, ...) VALUES (v, ...)
    fn parse_insert(&mut self) -> Result<InsertStmt> {
        self.expect(TokenType::Insert)?;
        self.expect(TokenType::Into)?;
        let table = self.parse_name()?;

        self.expect(TokenType::LParen)?;
        let columns = self.parse_name_list()?;
        self.expect(TokenType::RParen)?;

        self.expect(TokenType::Values)?;
        self.expect(TokenType::LParen)?;
        let values = self.parse_expr_list()?;
        self.expect(TokenType::RParen)?;

        Ok(InsertStmt { table, columns, values })
    }

    /// UPDATE t SET c = v, ... [WHERE expr]
    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect(TokenType::Update)?;
        let table = self.parse_name()?;
        self.expect(TokenType::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_name()?;
            self.expect(TokenType::Eq)?;
            let value = self.parse_expr(1)?;
            assignments.push((column, value));

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(1)?)
        } else {
            None
        };

        Ok(UpdateStmt {
            table,
            assignments,
            where_clause,
        })
    }

    /// DELETE FROM t [WHERE expr]
    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect(TokenType::Delete)?;
        self.expect(TokenType::From)?;
        let table = self.parse_name()?;

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expr(1)?)
        } else {
            None
        };

        Ok(DeleteStmt { table, where_clause })
    }

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(TokenType::Create)?;

        match self.current().token_type {
            TokenType::Table => Ok(Statement::CreateTable(self.parse_create_table()?)),
            TokenType::Index => Ok(Statement::CreateIndex(self.parse_create_index()?)),
            _ => Err(self.error("TABLE")),
        }
    }

    /// CREATE TABLE t (col type [PRIMARY KEY] [REFERENCES t(c)], ...)
    fn parse_create_table(&mut self) -> Result<CreateTableStmt> {
        self.expect(TokenType::Table)?;
        let name = self.parse_name()?;
        self.expect(TokenType::LParen)?;

        let mut columns: Vec<ColumnDef> = Vec::new();
        loop {
            let has_primary_key = columns.iter().any(|c| c.primary_key);
            columns.push(self.parse_column_def(has_primary_key)?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        let has_primary_key = columns.iter().any(|c| c.primary_key);
        if !has_primary_key && matches!(self.current().token_type, TokenType::RParen) {
            return Err(self.error("PRIMARY KEY"));
        }
        self.expect(TokenType::RParen)?;

        let schema = TableSchema::new(name, columns)?;
        Ok(CreateTableStmt { schema })
    }

    fn parse_column_def(&mut self, has_primary_key: bool) -> Result<ColumnDef> {
        let name = self.parse_name()?;
        let col_type = self.parse_data_type()?;
        let mut column = ColumnDef::new(name, col_type);

        loop {
            match self.current().token_type {
                TokenType::Primary => {
                    // One PRIMARY KEY per table
                    if column.primary_key || has_primary_key {
                        return Err(self.error("','"));
                    }
                    self.advance();
                    self.expect(TokenType::Key)?;
                    column = column.primary_key();
                }
                TokenType::References => {
                    if column.references.is_some() {
                        return Err(self.error("','"));
                    }
                    self.advance();
                    let table = self.parse_name()?;
                    self.expect(TokenType::LParen)?;
                    let target = self.parse_name()?;
                    self.expect(TokenType::RParen)?;
                    column = column.references(table, target);
                }
                // NOT NULL, DEFAULT, CHECK, UNIQUE, AUTO_INCREMENT all land here
                _ => break,
            }
        }

        Ok(column)
    }

    fn parse_data_type(&mut self) -> Result<ColumnType> {
        let col_type = match self.current().token_type {
            TokenType::Integer => ColumnType::Integer,
            TokenType::Float => ColumnType::Float,
            TokenType::Text => ColumnType::Text,
            TokenType::Boolean => ColumnType::Boolean,
            _ => return Err(self.error("column type")),
        };
        self.advance();

        // VARCHAR(255) / DECIMAL(10, 2): the size is accepted and ignored
        if self.match_token(TokenType::LParen) {
            self.parse_usize()?;
            if self.match_token(TokenType::Comma) {
                self.parse_usize()?;
            }
            self.expect(TokenType::RParen)?;
        }

        Ok(col_type)
    }

    /// CREATE INDEX name ON t (col)
    fn parse_create_index(&mut self) -> Result<CreateIndexStmt> {
        self.expect(TokenType::Index)?;
        let index_name = self.parse_name()?;
        self.expect(TokenType::On)?;
        let table = self.parse_name()?;
        self.expect(TokenType::LParen)?;
        let column = self.parse_name()?;
        self.expect(TokenType::RParen)?;

        Ok(CreateIndexStmt {
            index_name,
            table,
            column,
        })
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(TokenType::Drop)?;
        self.expect(TokenType::Table)?;
        let table = self.parse_name()?;
        Ok(Statement::DropTable(DropTableStmt { table }))
    }

    fn parse_show(&mut self) -> Result<Statement> {
        self.expect(TokenType::Show)?;
        self.expect(TokenType::Tables)?;
        Ok(Statement::ShowTables)
    }

    // ==================== Expressions ====================

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr> {
        self.nested(|p| p.parse_binary_expr(min_precedence))
    }

    /// Run `parse` one nesting level deeper, failing once MAX_EXPR_DEPTH is hit
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_EXPR_DEPTH {
            return Err(self.error("expression"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Pratt loop. Comparison-level predicates (IS, IN, LIKE, BETWEEN) are
    /// handled inside the loop at the comparison precedence so that
    /// `a LIKE 'x%' AND b = 1` groups as expected.
    fn parse_binary_expr(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_prefix_expr()?;

        loop {
            if self.at_predicate() {
                if COMPARISON_PRECEDENCE < min_precedence {
                    break;
                }
                left = self.parse_predicate(left)?;
                continue;
            }

            let op = match self.try_parse_binary_op() {
                Some(op) if op.precedence() >= min_precedence => op,
                _ => break,
            };
            self.advance();
            let right = self.parse_expr(op.precedence() + 1)?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix_expr(&mut self) -> Result<Expr> {
        let token_type = self.current().token_type.clone();

        match token_type {
            TokenType::IntLiteral(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Integer(n)))
            }
            TokenType::FloatLiteral(x) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(x)))
            }
            TokenType::StringLiteral(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Text(s)))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenType::Minus => {
                self.advance();
                match self.current().token_type {
                    TokenType::IntLiteral(n) => {
                        self.advance();
                        Ok(Expr::Literal(Value::Integer(-n)))
                    }
                    TokenType::FloatLiteral(x) => {
                        self.advance();
                        Ok(Expr::Literal(Value::Float(-x)))
                    }
                    _ => {
                        let expr = self.nested(|p| p.parse_prefix_expr())?;
                        Ok(Expr::UnaryOp {
                            op: UnaryOperator::Minus,
                            expr: Box::new(expr),
                        })
                    }
                }
            }
            TokenType::Not => {
                self.advance();
                let expr = self.parse_expr(COMPARISON_PRECEDENCE)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(expr),
                })
            }
            TokenType::LParen => {
                self.advance();
                let expr = self.parse_expr(1)?;
                self.expect(TokenType::RParen)?;
                Ok(expr)
            }
            ref t if t.is_aggregate() && self.peek_is(&TokenType::LParen) => {
                self.parse_aggregate()
            }
            TokenType::Identifier(name) if self.peek_is(&TokenType::LParen) => {
                self.parse_function_call(&name)
            }
            _ => Ok(Expr::Column(self.parse_name()?)),
        }
    }

    fn parse_aggregate(&mut self) -> Result<Expr> {
        let func = match self.current().token_type {
            TokenType::Count => AggregateFunc::Count,
            TokenType::Sum => AggregateFunc::Sum,
            TokenType::Avg => AggregateFunc::Avg,
            TokenType::Min => AggregateFunc::Min,
            TokenType::Max => AggregateFunc::Max,
            _ => return Err(self.error("aggregate function")),
        };
        self.advance();
        self.expect(TokenType::LParen)?;

        if func == AggregateFunc::Count && self.match_token(TokenType::Star) {
            self.expect(TokenType::RParen)?;
            return Ok(Expr::Aggregate {
                func,
                arg: None,
                distinct: false,
            });
        }

        let distinct = self.match_token(TokenType::Distinct);
        let arg = self.parse_expr(1)?;
        self.expect(TokenType::RParen)?;

        Ok(Expr::Aggregate {
            func,
            arg: Some(Box::new(arg)),
            distinct,
        })
    }

    fn parse_function_call(&mut self, name: &str) -> Result<Expr> {
        let func = ScalarFunc::from_name(name).ok_or_else(|| self.error("function name"))?;
        self.advance();
        self.expect(TokenType::LParen)?;

        let mut args = Vec::new();
        if !matches!(self.current().token_type, TokenType::RParen) {
            loop {
                if func == ScalarFunc::DateSub && args.len() == 1 && self.match_token(TokenType::Interval) {
                    args.push(self.parse_interval()?);
                } else {
                    args.push(self.parse_expr(1)?);
                }
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }

        if args.len() != func.arity() {
            let expected = if args.len() < func.arity() { "','" } else { "')'" };
            return Err(self.error(expected));
        }
        self.expect(TokenType::RParen)?;

        Ok(Expr::Function { func, args })
    }

    /// `INTERVAL` already consumed: `<amount> <UNIT>`
    fn parse_interval(&mut self) -> Result<Expr> {
        let amount = self.parse_prefix_expr()?;
        let unit = match &self.current().token_type {
            TokenType::Identifier(name) => IntervalUnit::from_name(name),
            _ => None,
        }
        .ok_or_else(|| self.error("interval unit"))?;
        self.advance();

        Ok(Expr::Interval {
            amount: Box::new(amount),
            unit,
        })
    }

    fn at_predicate(&self) -> bool {
        match self.current().token_type {
            TokenType::Is | TokenType::In | TokenType::Like | TokenType::Between => true,
            TokenType::Not => matches!(
                self.peek().map(|t| &t.token_type),
                Some(TokenType::In) | Some(TokenType::Like) | Some(TokenType::Between)
            ),
            _ => false,
        }
    }

    fn parse_predicate(&mut self, expr: Expr) -> Result<Expr> {
        if self.match_token(TokenType::Is) {
            let negated = self.match_token(TokenType::Not);
            self.expect(TokenType::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(expr),
                negated,
            });
        }

        let negated = self.match_token(TokenType::Not);

        if self.match_token(TokenType::In) {
            self.expect(TokenType::LParen)?;
            let list = self.parse_expr_list()?;
            self.expect(TokenType::RParen)?;
            Ok(Expr::In {
                expr: Box::new(expr),
                list,
                negated,
            })
        } else if self.match_token(TokenType::Like) {
            let pattern = self.parse_expr(COMPARISON_PRECEDENCE + 1)?;
            Ok(Expr::Like {
                expr: Box::new(expr),
                pattern: Box::new(pattern),
                negated,
            })
        } else if self.match_token(TokenType::Between) {
            let low = self.parse_expr(COMPARISON_PRECEDENCE + 1)?;
            self.expect(TokenType::And)?;
            let high = self.parse_expr(COMPARISON_PRECEDENCE + 1)?;
            Ok(Expr::Between {
                expr: Box::new(expr),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            })
        } else {
            Err(self.error("IN, LIKE or BETWEEN"))
        }
    }

    fn try_parse_binary_op(&self) -> Option<BinaryOperator> {
        match self.current().token_type {
            TokenType::Eq => Some(BinaryOperator::Eq),
            TokenType::Ne => Some(BinaryOperator::Ne),
            TokenType::Lt => Some(BinaryOperator::Lt),
            TokenType::Le => Some(BinaryOperator::Le),
            TokenType::Gt => Some(BinaryOperator::Gt),
            TokenType::Ge => Some(BinaryOperator::Ge),
            TokenType::And => Some(BinaryOperator::And),
            TokenType::Or => Some(BinaryOperator::Or),
            TokenType::Plus => Some(BinaryOperator::Add),
            TokenType::Minus => Some(BinaryOperator::Sub),
            TokenType::Star => Some(BinaryOperator::Mul),
            TokenType::Slash => Some(BinaryOperator::Div),
            _ => None,
        }
    }

    // ==================== Helper methods ====================

    /// Table, column or alias name. Non-reserved keywords are accepted as
    /// long as an aggregate keyword is not actually a call.
    fn parse_name(&mut self) -> Result<String> {
        let token = self.current();
        let accepted = match &token.token_type {
            TokenType::Identifier(name) => Some(name.clone()),
            t if t.is_non_reserved() && !(t.is_aggregate() && self.peek_is(&TokenType::LParen)) => {
                Some(token.lexeme.clone())
            }
            _ => None,
        };

        match accepted {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(self.error("IDENTIFIER")),
        }
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_name()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_expr(1)?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_usize(&mut self) -> Result<usize> {
        if let TokenType::IntLiteral(n) = self.current().token_type {
            if n >= 0 {
                self.advance();
                return Ok(n as usize);
            }
        }
        Err(self.error("INT_LITERAL"))
    }

    fn current(&self) -> &Token {
        // tokenize() always ends the stream with Eof and advance() never moves past it
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position + 1)
    }

    fn peek_is(&self, token_type: &TokenType) -> bool {
        self.peek().map_or(false, |t| {
            std::mem::discriminant(&t.token_type) == std::mem::discriminant(token_type)
        })
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(&token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: TokenType) -> Result<()> {
        if self.match_token(token_type.clone()) {
            Ok(())
        } else {
            Err(self.error(&token_type.describe()))
        }
    }

    fn error(&self, expected: &str) -> DbError {
        DbError::Syntax(format!("Expected {} near '{}'", expected, self.current().near()))
    }
}

/// Tokenize and parse a single statement
pub fn parse_statement(sql: &str) -> Result<Statement> {
    let tokens = Lexer::new(sql).tokenize()?;
    Parser::new(tokens).parse()
}
