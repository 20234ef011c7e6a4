//! Token definitions for the query parser
//!
//! 词法单元：OData 表达式中的标识符、各类字面量、运算符（符号与单词两种形式）以及标点。

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::fmt;
use uuid::Uuid;

use super::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, position: Position) -> Self {
        Self {
            kind,
            lexeme,
            position,
        }
    }

    /// 词法单元结束处的偏移量（不含）
    pub fn end_offset(&self) -> usize {
        self.position.offset + self.lexeme.chars().count()
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // 标识符与字面量
    Identifier(String),
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Null,
    Date(NaiveDate),
    TimeOfDay(NaiveTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
    Duration(String),
    Geography(String),
    Geometry(String),
    /// `Namespace.Type'Member'`
    Enum { type_name: String, member: String },

    // 比较运算符
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Has,
    In,

    // 逻辑运算符
    And,
    Or,
    Not,

    // 算术运算符
    Add,
    Sub,
    Mul,
    Div,
    DivBy,
    Mod,

    // 标点
    LParen,
    RParen,
    Comma,
    Slash,
    Colon,

    Eof,
}

impl TokenKind {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::Ne
                | TokenKind::Gt
                | TokenKind::Ge
                | TokenKind::Lt
                | TokenKind::Le
                | TokenKind::Has
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::String(_)
                | TokenKind::Integer(_)
                | TokenKind::Decimal(_)
                | TokenKind::Boolean(_)
                | TokenKind::Null
                | TokenKind::Date(_)
                | TokenKind::TimeOfDay(_)
                | TokenKind::DateTimeOffset(_)
                | TokenKind::Guid(_)
                | TokenKind::Duration(_)
                | TokenKind::Geography(_)
                | TokenKind::Geometry(_)
                | TokenKind::Enum { .. }
        )
    }

    /// 能结束一个操作数的标记；其后的 `-` 视为二元减号
    pub fn ends_operand(&self) -> bool {
        self.is_literal() || matches!(self, TokenKind::Identifier(_) | TokenKind::RParen)
    }

    /// 词法类别名称，用于 `Token` 的 `type` 视图与错误消息
    pub fn category(&self) -> &'static str {
        match self {
            TokenKind::Identifier(_) => "Identifier",
            TokenKind::String(_) => "String",
            TokenKind::Integer(_) | TokenKind::Decimal(_) => "Number",
            TokenKind::Boolean(_) => "Boolean",
            TokenKind::Null => "Null",
            TokenKind::Date(_) => "Date",
            TokenKind::TimeOfDay(_) => "Time",
            TokenKind::DateTimeOffset(_) => "DateTime",
            TokenKind::Guid(_) => "GUID",
            TokenKind::Duration(_) => "Duration",
            TokenKind::Geography(_) | TokenKind::Geometry(_) => "Geo",
            TokenKind::Enum { .. } => "Enum",
            TokenKind::Eq
            | TokenKind::Ne
            | TokenKind::Gt
            | TokenKind::Ge
            | TokenKind::Lt
            | TokenKind::Le
            | TokenKind::Has
            | TokenKind::In => "Comparison",
            TokenKind::And | TokenKind::Or | TokenKind::Not => "Logical",
            TokenKind::Add
            | TokenKind::Sub
            | TokenKind::Mul
            | TokenKind::Div
            | TokenKind::DivBy
            | TokenKind::Mod => "Arithmetic",
            TokenKind::LParen => "LParen",
            TokenKind::RParen => "RParen",
            TokenKind::Comma => "Comma",
            TokenKind::Slash => "Slash",
            TokenKind::Colon => "Colon",
            TokenKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s) => write!(f, "identifier '{}'", s),
            TokenKind::String(s) => write!(f, "string '{}'", s),
            TokenKind::Integer(i) => write!(f, "{}", i),
            TokenKind::Decimal(d) => write!(f, "{}", d),
            TokenKind::Boolean(b) => write!(f, "{}", b),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Date(d) => write!(f, "{}", d),
            TokenKind::TimeOfDay(t) => write!(f, "{}", t),
            TokenKind::DateTimeOffset(dt) => write!(f, "{}", dt.to_rfc3339()),
            TokenKind::Guid(g) => write!(f, "{}", g),
            TokenKind::Duration(d) => write!(f, "duration'{}'", d),
            TokenKind::Geography(g) => write!(f, "geography'{}'", g),
            TokenKind::Geometry(g) => write!(f, "geometry'{}'", g),
            TokenKind::Enum { type_name, member } => write!(f, "{}'{}'", type_name, member),
            TokenKind::Eq => write!(f, "eq"),
            TokenKind::Ne => write!(f, "ne"),
            TokenKind::Gt => write!(f, "gt"),
            TokenKind::Ge => write!(f, "ge"),
            TokenKind::Lt => write!(f, "lt"),
            TokenKind::Le => write!(f, "le"),
            TokenKind::Has => write!(f, "has"),
            TokenKind::In => write!(f, "in"),
            TokenKind::And => write!(f, "and"),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::Add => write!(f, "add"),
            TokenKind::Sub => write!(f, "sub"),
            TokenKind::Mul => write!(f, "mul"),
            TokenKind::Div => write!(f, "div"),
            TokenKind::DivBy => write!(f, "divby"),
            TokenKind::Mod => write!(f, "mod"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}
