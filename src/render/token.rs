//! JPQL tokens - the atomic units of rendered query text.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Every element the renderer can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Clause keywords ===
    Select,
    Update,
    Delete,
    Set,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    As,
    On,
    Join,
    Left,
    Right,
    Fetch,
    Distinct,
    New,

    // === Predicate keywords ===
    And,
    Or,
    Is,
    Not,
    Null,
    Empty,
    MemberOf,
    Like,
    Escape,
    Exists,
    All,
    Any,
    Some,
    True,
    False,

    // === Expression keywords ===
    Case,
    When,
    Then,
    Else,
    End,
    Treat,
    Both,
    Leading,
    Trailing,
    Asc,
    Desc,
    NullsFirst,
    NullsLast,

    // === Punctuation ===
    Comma,
    Dot,
    LParen,
    RParen,
    Bang,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,

    Space,

    // === Dynamic content ===
    /// Identifier (alias, attribute, entity name); emitted unquoted.
    Ident(String),
    NamedParam(String),
    PositionalParam(usize),
    LitInt(i64),
    LitFloat(f64),
    LitString(String),
    LitChar(char),
    LitBool(bool),
    LitNull,
    LitDate(NaiveDate),
    LitTime(NaiveTime),
    LitTimestamp(NaiveDateTime),
    /// Function name, emitted as given.
    FunctionName(String),

    /// Pre-rendered query text, spliced verbatim (subquery bodies).
    Raw(String),
}

/// `'...'` with embedded quotes doubled.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl Token {
    /// Fixed text of keyword, punctuation and operator tokens.
    pub fn keyword(&self) -> Option<&'static str> {
        let text = match self {
            Token::Select => "SELECT",
            Token::Update => "UPDATE",
            Token::Delete => "DELETE",
            Token::Set => "SET",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::GroupBy => "GROUP BY",
            Token::Having => "HAVING",
            Token::OrderBy => "ORDER BY",
            Token::As => "AS",
            Token::On => "ON",
            Token::Join => "JOIN",
            Token::Left => "LEFT",
            Token::Right => "RIGHT",
            Token::Fetch => "FETCH",
            Token::Distinct => "DISTINCT",
            Token::New => "NEW",

            Token::And => "AND",
            Token::Or => "OR",
            Token::Is => "IS",
            Token::Not => "NOT",
            Token::Null | Token::LitNull => "NULL",
            Token::Empty => "EMPTY",
            Token::MemberOf => "MEMBER OF",
            Token::Like => "LIKE",
            Token::Escape => "ESCAPE",
            Token::Exists => "EXISTS",
            Token::All => "ALL",
            Token::Any => "ANY",
            Token::Some => "SOME",
            Token::True | Token::LitBool(true) => "TRUE",
            Token::False | Token::LitBool(false) => "FALSE",

            Token::Case => "CASE",
            Token::When => "WHEN",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::End => "END",
            Token::Treat => "TREAT",
            Token::Both => "BOTH",
            Token::Leading => "LEADING",
            Token::Trailing => "TRAILING",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::NullsFirst => "NULLS FIRST",
            Token::NullsLast => "NULLS LAST",

            Token::Comma => ",",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Bang => "!",
            Token::Eq => "=",
            Token::Ne => "<>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Lte => "<=",
            Token::Gte => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Mul => "*",
            Token::Div => "/",
            Token::Space => " ",

            _ => return None,
        };
        Some(text)
    }

    /// JPQL text of this token.
    pub fn serialize(&self) -> String {
        if let Some(text) = self.keyword() {
            return text.to_string();
        }
        match self {
            Token::Ident(name) | Token::FunctionName(name) | Token::Raw(name) => name.clone(),
            Token::NamedParam(name) => format!(":{}", name),
            Token::PositionalParam(n) => format!("?{}", n),
            Token::LitInt(n) => n.to_string(),
            // Non-finite values are rejected before a token is built.
            Token::LitFloat(f) => ryu::Buffer::new().format(*f).to_string(),
            Token::LitString(s) => quote(s),
            Token::LitChar(c) => quote(c.encode_utf8(&mut [0; 4])),
            Token::LitDate(d) => format!("{{d '{}'}}", d.format("%Y-%m-%d")),
            Token::LitTime(t) => format!("{{t '{}'}}", t.format("%H:%M:%S")),
            Token::LitTimestamp(ts) => format!("{{ts '{}'}}", ts.format("%Y-%m-%d %H:%M:%S")),
            _ => String::new(),
        }
    }
}

/// A stream of tokens that can be serialized to JPQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append a copy of `other`.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.extend(other.tokens.iter().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn serialize(&self) -> String {
        self.to_string()
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}

impl fmt::Display for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tokens.iter().try_for_each(|token| match token.keyword() {
            Some(text) => f.write_str(text),
            None => f.write_str(&token.serialize()),
        })
    }
}
