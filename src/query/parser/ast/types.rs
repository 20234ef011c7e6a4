//! AST 基础类型定义
//!
//! 运算符与字面量类型标签。

use std::fmt;

pub use crate::query::parser::core::Span;

/// 二元运算符（算术与逻辑）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    DivBy,
    Mod,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_arithmetic(&self) -> bool {
        !self.is_logical()
    }

    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::DivBy => "divby",
            BinaryOp::Mod => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => f.write_str("not"),
            UnaryOp::Negate => f.write_str("-"),
        }
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Has,
    In,
}

impl ComparisonOp {
    pub fn name(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Ge => "ge",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Le => "le",
            ComparisonOp::Has => "has",
            ComparisonOp::In => "in",
        }
    }

    /// 交换左右操作数后的等价运算符
    pub fn flipped(&self) -> ComparisonOp {
        match self {
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Ge => ComparisonOp::Le,
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Le => ComparisonOp::Ge,
            other => *other,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LambdaOp {
    Any,
    All,
}

impl LambdaOp {
    pub fn from_name(name: &str) -> Option<LambdaOp> {
        match name {
            "any" => Some(LambdaOp::Any),
            "all" => Some(LambdaOp::All),
            _ => None,
        }
    }
}

impl fmt::Display for LambdaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LambdaOp::Any => f.write_str("any"),
            LambdaOp::All => f.write_str("all"),
        }
    }
}

/// 字面量的类型标签
///
/// `Value` 无法区分的 OData 字面量（duration、地理、枚举）靠它保留原始类型
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralKind {
    Null,
    Boolean,
    Integer,
    Decimal,
    String,
    Date,
    TimeOfDay,
    DateTimeOffset,
    Guid,
    Duration,
    Geography,
    Geometry,
    Enum { type_name: String },
}

impl LiteralKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, LiteralKind::Integer | LiteralKind::Decimal)
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, LiteralKind::Geography | LiteralKind::Geometry)
    }
}
