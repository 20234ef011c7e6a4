//! 表达式 AST 定义
//!
//! 基于枚举的表达式定义，语义解析器对其做穷尽匹配。

use super::types::*;
use crate::core::Value;

/// 表达式枚举 - 核心 AST 节点
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Comparison(ComparisonExpr),
    FunctionCall(FunctionCallExpr),
    Lambda(LambdaExpr),
    Identifier(IdentifierExpr),
    Literal(LiteralExpr),
    Group(GroupExpr),
    Collection(CollectionExpr),
}

impl Expr {
    /// 获取表达式的位置信息
    pub fn span(&self) -> Span {
        match self {
            Expr::Binary(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Comparison(e) => e.span,
            Expr::FunctionCall(e) => e.span,
            Expr::Lambda(e) => e.span,
            Expr::Identifier(e) => e.span,
            Expr::Literal(e) => e.span,
            Expr::Group(e) => e.span,
            Expr::Collection(e) => e.span,
        }
    }

    /// 去掉外层括号
    pub fn unwrap_group(&self) -> &Expr {
        match self {
            Expr::Group(g) => g.inner.unwrap_group(),
            other => other,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.unwrap_group(), Expr::Literal(_))
    }

    /// 结果为布尔值的表达式（可直接作为过滤条件）
    pub fn is_predicate(&self) -> bool {
        match self.unwrap_group() {
            Expr::Binary(b) => b.op.is_logical(),
            Expr::Unary(u) => u.op == UnaryOp::Not,
            Expr::Comparison(_) | Expr::Lambda(_) => true,
            Expr::FunctionCall(f) => matches!(
                f.name.as_str(),
                "contains"
                    | "startswith"
                    | "endswith"
                    | "matchesPattern"
                    | "isof"
                    | "geo.intersects"
            ),
            Expr::Identifier(_) => true,
            Expr::Literal(l) => matches!(l.kind, LiteralKind::Boolean),
            _ => false,
        }
    }

    /// 以 OData 语法重新输出表达式
    pub fn to_odata(&self) -> String {
        match self {
            Expr::Binary(e) => format!("{} {} {}", e.left.to_odata(), e.op, e.right.to_odata()),
            Expr::Unary(e) => match e.op {
                UnaryOp::Not => format!("not {}", e.operand.to_odata()),
                UnaryOp::Negate => format!("-{}", e.operand.to_odata()),
            },
            Expr::Comparison(e) => {
                format!("{} {} {}", e.left.to_odata(), e.op, e.right.to_odata())
            }
            Expr::FunctionCall(e) => {
                let args = e
                    .args
                    .iter()
                    .map(|arg| arg.to_odata())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}({})", e.name, args)
            }
            Expr::Lambda(e) => match (&e.variable, &e.predicate) {
                (Some(var), Some(pred)) => format!(
                    "{}/{}({}:{})",
                    e.collection_path.join("/"),
                    e.op,
                    var,
                    pred.to_odata()
                ),
                _ => format!("{}/{}()", e.collection_path.join("/"), e.op),
            },
            Expr::Identifier(e) => e.name.clone(),
            Expr::Literal(e) => e.to_odata(),
            Expr::Group(e) => format!("({})", e.inner.to_odata()),
            Expr::Collection(e) => {
                let values = e
                    .values
                    .iter()
                    .map(|v| v.to_odata())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("({})", values)
            }
        }
    }
}

/// 二元表达式（算术与逻辑）
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub span: Span,
    pub left: Box<Expr>,
    pub op: BinaryOp,
    pub right: Box<Expr>,
}

impl BinaryExpr {
    pub fn new(left: Expr, op: BinaryOp, right: Expr, span: Span) -> Self {
        Self {
            span,
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

/// 一元表达式
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub span: Span,
    pub op: UnaryOp,
    pub operand: Box<Expr>,
}

impl UnaryExpr {
    pub fn new(op: UnaryOp, operand: Expr, span: Span) -> Self {
        Self {
            span,
            op,
            operand: Box::new(operand),
        }
    }
}

/// 比较表达式
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    pub span: Span,
    pub left: Box<Expr>,
    pub op: ComparisonOp,
    pub right: Box<Expr>,
}

impl ComparisonExpr {
    pub fn new(left: Expr, op: ComparisonOp, right: Expr, span: Span) -> Self {
        Self {
            span,
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

/// 函数调用表达式
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallExpr {
    pub span: Span,
    pub name: String,
    pub args: Vec<Expr>,
}

impl FunctionCallExpr {
    pub fn new(name: String, args: Vec<Expr>, span: Span) -> Self {
        Self { span, name, args }
    }
}

/// Lambda 表达式：`Orders/any(o:o/Amount gt 100)`
///
/// `any()` 不带参数时 `variable` 与 `predicate` 都为空
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpr {
    pub span: Span,
    pub collection_path: Vec<String>,
    pub op: LambdaOp,
    pub variable: Option<String>,
    pub predicate: Option<Box<Expr>>,
}

impl LambdaExpr {
    pub fn new(
        collection_path: Vec<String>,
        op: LambdaOp,
        variable: Option<String>,
        predicate: Option<Expr>,
        span: Span,
    ) -> Self {
        Self {
            span,
            collection_path,
            op,
            variable,
            predicate: predicate.map(Box::new),
        }
    }
}

/// 标识符或属性路径，路径段以 `/` 连接
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierExpr {
    pub span: Span,
    pub name: String,
}

impl IdentifierExpr {
    pub fn new(name: String, span: Span) -> Self {
        Self { span, name }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.name.split('/').collect()
    }

    pub fn is_path(&self) -> bool {
        self.name.contains('/')
    }
}

/// 字面量表达式
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub span: Span,
    pub value: Value,
    pub kind: LiteralKind,
}

impl LiteralExpr {
    pub fn new(value: Value, kind: LiteralKind, span: Span) -> Self {
        Self { span, value, kind }
    }

    pub fn to_odata(&self) -> String {
        match (&self.kind, &self.value) {
            (LiteralKind::String, Value::String(s)) => format!("'{}'", s.replace('\'', "''")),
            (LiteralKind::Duration, v) => format!("duration'{}'", v),
            (LiteralKind::Geography, v) => format!("geography'{}'", v),
            (LiteralKind::Geometry, v) => format!("geometry'{}'", v),
            (LiteralKind::Enum { type_name }, v) => format!("{}'{}'", type_name, v),
            (LiteralKind::Null, _) => "null".to_string(),
            (_, v) => v.to_string(),
        }
    }
}

/// 括号分组
#[derive(Debug, Clone, PartialEq)]
pub struct GroupExpr {
    pub span: Span,
    pub inner: Box<Expr>,
}

impl GroupExpr {
    pub fn new(inner: Expr, span: Span) -> Self {
        Self {
            span,
            inner: Box::new(inner),
        }
    }
}

/// `in` 右侧的字面量集合
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionExpr {
    pub span: Span,
    pub values: Vec<Expr>,
}

impl CollectionExpr {
    pub fn new(values: Vec<Expr>, span: Span) -> Self {
        Self { span, values }
    }
}
