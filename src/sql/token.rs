/// Token types for the SQL tokenizer
use phf::phf_map;
use std::fmt;

// Perfect hash map for O(1) keyword lookup (keys are lowercase)
static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "select" => TokenType::Select,
    "from" => TokenType::From,
    "where" => TokenType::Where,
    "insert" => TokenType::Insert,
    "into" => TokenType::Into,
    "values" => TokenType::Values,
    "update" => TokenType::Update,
    "set" => TokenType::Set,
    "delete" => TokenType::Delete,
    "create" => TokenType::Create,
    "table" => TokenType::Table,
    "index" => TokenType::Index,
    "on" => TokenType::On,
    "drop" => TokenType::Drop,
    "show" => TokenType::Show,
    "tables" => TokenType::Tables,
    "and" => TokenType::And,
    "or" => TokenType::Or,
    "not" => TokenType::Not,
    "like" => TokenType::Like,
    "in" => TokenType::In,
    "between" => TokenType::Between,
    "is" => TokenType::Is,
    "null" => TokenType::Null,
    "as" => TokenType::As,
    "order" => TokenType::Order,
    "by" => TokenType::By,
    "asc" => TokenType::Asc,
    "desc" => TokenType::Desc,
    "limit" => TokenType::Limit,
    "offset" => TokenType::Offset,
    "group" => TokenType::Group,
    "having" => TokenType::Having,
    "distinct" => TokenType::Distinct,
    "primary" => TokenType::Primary,
    "key" => TokenType::Key,
    "references" => TokenType::References,
    "true" => TokenType::True,
    "false" => TokenType::False,
    "interval" => TokenType::Interval,
    "count" => TokenType::Count,
    "sum" => TokenType::Sum,
    "avg" => TokenType::Avg,
    "min" => TokenType::Min,
    "max" => TokenType::Max,
    "int" => TokenType::Integer,
    "integer" => TokenType::Integer,
    "float" => TokenType::Float,
    "real" => TokenType::Float,
    "double" => TokenType::Float,
    "decimal" => TokenType::Float,
    "string" => TokenType::Text,
    "text" => TokenType::Text,
    "varchar" => TokenType::Text,
    "bool" => TokenType::Boolean,
    "boolean" => TokenType::Boolean,
    // Recognized only so they can be rejected with a precise message
    "default" => TokenType::Default,
    "auto_increment" => TokenType::AutoIncrement,
    "check" => TokenType::Check,
    "unique" => TokenType::Unique,
    "if" => TokenType::If,
    "exists" => TokenType::Exists,
    "join" => TokenType::Join,
    "alter" => TokenType::Alter,
    "database" => TokenType::Database,
};

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    Operator,
    Punctuation,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::IntLiteral => "INT_LITERAL",
            TokenKind::FloatLiteral => "FLOAT_LITERAL",
            TokenKind::StringLiteral => "STRING_LITERAL",
            TokenKind::Operator => "OPERATOR",
            TokenKind::Punctuation => "PUNCTUATION",
            TokenKind::Eof => "EOF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Index,
    On,
    Drop,
    Show,
    Tables,
    And,
    Or,
    Not,
    Like,
    In,
    Between,
    Is,
    Null,
    As,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Offset,
    Group,
    Having,
    Distinct,
    Primary,
    Key,
    References,
    True,
    False,
    Interval,

    // Aggregates
    Count,
    Sum,
    Avg,
    Min,
    Max,

    // Data types
    Integer,
    Float,
    Text,
    Boolean,

    // Unsupported constructs
    Default,
    AutoIncrement,
    Check,
    Unique,
    If,
    Exists,
    Join,
    Alter,
    Database,

    // Operators
    Eq,    // =
    Ne,    // != or <>
    Lt,    // <
    Gt,    // >
    Le,    // <=
    Ge,    // >=
    Plus,  // +
    Minus, // -
    Star,  // *
    Slash, // /

    // Delimiters
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Semicolon, // ;
    Dot,       // .

    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    Identifier(String),

    // Special
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    /// Source text exactly as written
    pub lexeme: String,
    /// 0-based character offset
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        lexeme: impl Into<String>,
        position: usize,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            token_type,
            lexeme: lexeme.into(),
            position,
            line,
            column,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.token_type.kind()
    }

    /// Text used after `near` in syntax errors
    pub fn near(&self) -> &str {
        match self.token_type {
            TokenType::Eof => "EOF",
            _ => &self.lexeme,
        }
    }
}

impl TokenType {
    /// Keyword lookup, case-insensitive
    pub fn from_keyword(s: &str) -> Option<Self> {
        let lowercase = s.to_ascii_lowercase();
        KEYWORDS.get(lowercase.as_str()).cloned()
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            TokenType::IntLiteral(_) => TokenKind::IntLiteral,
            TokenType::FloatLiteral(_) => TokenKind::FloatLiteral,
            TokenType::StringLiteral(_) => TokenKind::StringLiteral,
            TokenType::Identifier(_) => TokenKind::Identifier,
            TokenType::Eq
            | TokenType::Ne
            | TokenType::Lt
            | TokenType::Gt
            | TokenType::Le
            | TokenType::Ge
            | TokenType::Plus
            | TokenType::Minus
            | TokenType::Star
            | TokenType::Slash => TokenKind::Operator,
            TokenType::LParen
            | TokenType::RParen
            | TokenType::Comma
            | TokenType::Semicolon
            | TokenType::Dot => TokenKind::Punctuation,
            TokenType::Eof => TokenKind::Eof,
            _ => TokenKind::Keyword,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            TokenType::Count | TokenType::Sum | TokenType::Avg | TokenType::Min | TokenType::Max
        )
    }

    /// Keywords that may still be used as column names and aliases
    /// (`amount AS count`, a column called `text` or `key`).
    pub fn is_non_reserved(&self) -> bool {
        self.is_aggregate()
            || matches!(
                self,
                TokenType::Integer
                    | TokenType::Float
                    | TokenType::Text
                    | TokenType::Boolean
                    | TokenType::Key
                    | TokenType::Tables
                    | TokenType::Database
                    | TokenType::Interval
            )
    }

    /// How this token type is named when the parser expects it
    pub fn describe(&self) -> String {
        match self {
            TokenType::Eq => "'='".into(),
            TokenType::Ne => "'!='".into(),
            TokenType::Lt => "'<'".into(),
            TokenType::Gt => "'>'".into(),
            TokenType::Le => "'<='".into(),
            TokenType::Ge => "'>='".into(),
            TokenType::Plus => "'+'".into(),
            TokenType::Minus => "'-'".into(),
            TokenType::Star => "'*'".into(),
            TokenType::Slash => "'/'".into(),
            TokenType::LParen => "'('".into(),
            TokenType::RParen => "')'".into(),
            TokenType::Comma => "','".into(),
            TokenType::Semicolon => "';'".into(),
            TokenType::Dot => "'.'".into(),
            TokenType::IntLiteral(_) => "INT_LITERAL".into(),
            TokenType::FloatLiteral(_) => "FLOAT_LITERAL".into(),
            TokenType::StringLiteral(_) => "STRING_LITERAL".into(),
            TokenType::Identifier(_) => "IDENTIFIER".into(),
            TokenType::Eof => "EOF".into(),
            TokenType::AutoIncrement => "AUTO_INCREMENT".into(),
            keyword => format!("{:?}", keyword).to_ascii_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_is_case_insensitive() {
        assert_eq!(TokenType::from_keyword("SeLeCt"), Some(TokenType::Select));
        assert_eq!(TokenType::from_keyword("DOUBLE"), Some(TokenType::Float));
        assert_eq!(TokenType::from_keyword("year"), None);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(TokenType::Select.kind(), TokenKind::Keyword);
        assert_eq!(TokenType::Count.kind(), TokenKind::Keyword);
        assert_eq!(TokenType::Le.kind(), TokenKind::Operator);
        assert_eq!(TokenType::Comma.kind(), TokenKind::Punctuation);
        assert_eq!(TokenType::IntLiteral(1).kind().to_string(), "INT_LITERAL");
    }

    #[test]
    fn test_describe() {
        assert_eq!(TokenType::From.describe(), "FROM");
        assert_eq!(TokenType::Identifier(String::new()).describe(), "IDENTIFIER");
        assert_eq!(TokenType::RParen.describe(), "')'");
        assert_eq!(TokenType::AutoIncrement.describe(), "AUTO_INCREMENT");
    }
}
