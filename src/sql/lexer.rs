/// SQL Lexer - converts SQL string into tokens

use super::token::{Token, TokenType};
use crate::error::{DbError, Result};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();
            if self.current_char() == '-' && self.peek_char() == Some('-') {
                self.skip_line_comment();
            } else if self.current_char() == '/' && self.peek_char() == Some('*') {
                self.skip_block_comment()?;
            } else {
                break;
            }
        }

        let start = self.position;
        let line = self.line;
        let column = self.column;

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, "", start, line, column));
        }

        let ch = self.current_char();

        let token_type = match ch {
            '\'' => self.read_string()?,
            '"' => self.read_quoted_identifier()?,
            '0'..='9' => self.read_number()?,
            '.' if self.peek_char().map_or(false, |c| c.is_ascii_digit()) => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),

            '=' => {
                self.advance();
                TokenType::Eq
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ne
                } else {
                    return Err(self.unexpected('!', start));
                }
            }
            '<' => {
                self.advance();
                match self.current_char() {
                    '=' => {
                        self.advance();
                        TokenType::Le
                    }
                    '>' => {
                        self.advance();
                        TokenType::Ne
                    }
                    _ => TokenType::Lt,
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ge
                } else {
                    TokenType::Gt
                }
            }
            '+' => {
                self.advance();
                TokenType::Plus
            }
            '-' => {
                self.advance();
                TokenType::Minus
            }
            '*' => {
                self.advance();
                TokenType::Star
            }
            '/' => {
                self.advance();
                TokenType::Slash
            }
            '(' => {
                self.advance();
                TokenType::LParen
            }
            ')' => {
                self.advance();
                TokenType::RParen
            }
            ',' => {
                self.advance();
                TokenType::Comma
            }
            ';' => {
                self.advance();
                TokenType::Semicolon
            }
            '.' => {
                self.advance();
                TokenType::Dot
            }
            other => return Err(self.unexpected(other, start)),
        };

        let lexeme: String = self.input[start..self.position].iter().collect();
        Ok(Token::new(token_type, lexeme, start, line, column))
    }

    fn unexpected(&self, ch: char, position: usize) -> DbError {
        DbError::Syntax(format!(
            "Unexpected character '{}' at position {}",
            ch, position
        ))
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            if self.input[self.position] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let start = self.position;
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(DbError::Syntax(format!(
            "Unterminated comment starting with '/*' at position {}",
            start
        )))
    }

    /// Single-quoted literal. `''` inside the literal is one quote; every
    /// other character, backslashes included, is taken verbatim.
    fn read_string(&mut self) -> Result<TokenType> {
        let start = self.position;
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(DbError::Syntax(format!(
                    "Unterminated string literal starting with ''' at position {}",
                    start
                )));
            }
            let ch = self.current_char();
            self.advance();
            if ch == '\'' {
                if self.current_char() == '\'' && !self.is_eof() {
                    value.push('\'');
                    self.advance();
                } else {
                    break;
                }
            } else {
                value.push(ch);
            }
        }

        Ok(TokenType::StringLiteral(value))
    }

    fn read_quoted_identifier(&mut self) -> Result<TokenType> {
        let start = self.position;
        self.advance(); // opening quote
        let mut value = String::new();

        while !self.is_eof() && self.current_char() != '"' {
            value.push(self.current_char());
            self.advance();
        }

        if self.is_eof() || value.is_empty() {
            return Err(DbError::Syntax(format!(
                "Unterminated quoted identifier starting with '\"' at position {}",
                start
            )));
        }

        self.advance(); // closing quote
        Ok(TokenType::Identifier(value))
    }

    fn read_number(&mut self) -> Result<TokenType> {
        let start = self.position;
        let mut value = String::new();
        let mut is_float = false;

        while self.current_char().is_ascii_digit() {
            value.push(self.current_char());
            self.advance();
        }

        if self.current_char() == '.' {
            is_float = true;
            value.push('.');
            self.advance();
            while self.current_char().is_ascii_digit() {
                value.push(self.current_char());
                self.advance();
            }
        }

        // Scientific notation (e.g., 1.5e10)
        if matches!(self.current_char(), 'e' | 'E') {
            let sign = self.peek_char();
            let digit_follows = match sign {
                Some('+') | Some('-') => self
                    .input
                    .get(self.position + 2)
                    .map_or(false, |c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if digit_follows {
                is_float = true;
                value.push(self.current_char());
                self.advance();
                if matches!(self.current_char(), '+' | '-') {
                    value.push(self.current_char());
                    self.advance();
                }
                while self.current_char().is_ascii_digit() {
                    value.push(self.current_char());
                    self.advance();
                }
            }
        }

        if is_float {
            value
                .parse::<f64>()
                .map(TokenType::FloatLiteral)
                .map_err(|_| DbError::Syntax(format!("Invalid number '{}' at position {}", value, start)))
        } else {
            value.parse::<i64>().map(TokenType::IntLiteral).map_err(|_| {
                DbError::Syntax(format!(
                    "Integer literal '{}' out of range at position {}",
                    value, start
                ))
            })
        }
    }

    fn read_identifier(&mut self) -> TokenType {
        let mut value = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        TokenType::from_keyword(&value).unwrap_or(TokenType::Identifier(value))
    }
}

/// Tokenize a full statement
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    Lexer::new(sql).tokenize()
}
