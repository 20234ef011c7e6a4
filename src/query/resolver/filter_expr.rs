//! 解析后的过滤表达式
//!
//! 与方言无关、已按元数据校验的谓词树。节点要么是逻辑节点（and/or，两个子节点），
//! 要么是否定节点，要么是叶子（比较、in、字符串谓词、lambda、类型检查、布尔常量）。
//! 叶子的操作数已经解析成列、字面量、函数、算术子树等。

use std::collections::BTreeMap;
use std::fmt;

use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::{JoinPair, PropertyType};
use crate::core::Value;
use crate::query::parser::ast::LambdaOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn sql(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn name(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// 在内存中比较两个值；类型不可比时返回 false
    pub fn evaluate(&self, ordering: Option<std::cmp::Ordering>) -> bool {
        use std::cmp::Ordering::*;
        match (self, ordering) {
            (CompareOp::Ne, None) => true,
            (_, None) => false,
            (CompareOp::Eq, Some(o)) => o == Equal,
            (CompareOp::Ne, Some(o)) => o != Equal,
            (CompareOp::Gt, Some(o)) => o == Greater,
            (CompareOp::Ge, Some(o)) => o != Less,
            (CompareOp::Lt, Some(o)) => o == Less,
            (CompareOp::Le, Some(o)) => o != Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringMatchOp {
    Contains,
    StartsWith,
    EndsWith,
    MatchesPattern,
}

impl StringMatchOp {
    pub fn from_function(name: &str) -> Option<StringMatchOp> {
        match name {
            "contains" => Some(StringMatchOp::Contains),
            "startswith" => Some(StringMatchOp::StartsWith),
            "endswith" => Some(StringMatchOp::EndsWith),
            "matchesPattern" => Some(StringMatchOp::MatchesPattern),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StringMatchOp::Contains => "contains",
            StringMatchOp::StartsWith => "startswith",
            StringMatchOp::EndsWith => "endswith",
            StringMatchOp::MatchesPattern => "matchesPattern",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    DivBy,
    Mod,
}

impl ArithmeticOp {
    pub fn sql(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div | ArithmeticOp::DivBy => "/",
            ArithmeticOp::Mod => "%",
        }
    }
}

/// `$apply` 聚合方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateMethod {
    Sum,
    Min,
    Max,
    Average,
    CountDistinct,
    /// `$count as Alias`
    Count,
}

impl AggregateMethod {
    pub fn from_name(name: &str) -> Option<AggregateMethod> {
        match name {
            "sum" => Some(AggregateMethod::Sum),
            "min" => Some(AggregateMethod::Min),
            "max" => Some(AggregateMethod::Max),
            "average" => Some(AggregateMethod::Average),
            "countdistinct" => Some(AggregateMethod::CountDistinct),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateMethod::Sum => "sum",
            AggregateMethod::Min => "min",
            AggregateMethod::Max => "max",
            AggregateMethod::Average => "average",
            AggregateMethod::CountDistinct => "countdistinct",
            AggregateMethod::Count => "$count",
        }
    }
}

/// 已解析的结构属性引用
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    /// OData 属性名
    pub name: String,
    pub column: String,
    /// 列的限定名（表名或别名）；顶层查询的列不限定
    pub qualifier: Option<String>,
    pub property_type: PropertyType,
    pub enum_members: BTreeMap<String, i64>,
}

impl PropertyRef {
    pub fn new(name: impl Into<String>, column: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            qualifier: None,
            property_type,
            enum_members: BTreeMap::new(),
        }
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

/// 关联子查询中的一跳
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedHop {
    pub table: String,
    /// 子查询中使用的名称；与表名相同时不生成 AS
    pub alias: String,
    pub joins: Vec<JoinPair>,
}

/// 从外层表出发的导航链
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedPath {
    /// 外层表（或别名）
    pub parent: String,
    pub hops: Vec<CorrelatedHop>,
}

impl CorrelatedPath {
    pub fn last_alias(&self) -> &str {
        self.hops
            .last()
            .map(|h| h.alias.as_str())
            .unwrap_or(self.parent.as_str())
    }
}

/// 比较与函数的操作数
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Property(PropertyRef),
    /// 单值导航路径，生成关联标量子查询
    Navigation {
        path: String,
        correlation: CorrelatedPath,
        leaf: PropertyRef,
    },
    /// `Nav/$count`
    CollectionCount {
        path: String,
        correlation: CorrelatedPath,
    },
    Literal(Value),
    /// 地理/几何字面量（WKT）
    Spatial { wkt: String, srid: i64 },
    Function { name: String, args: Vec<Operand> },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Operand>,
        right: Box<Operand>,
    },
    Negate(Box<Operand>),
    Cast {
        operand: Box<Operand>,
        target: PropertyType,
    },
    /// `$compute` 别名，使用处内联其表达式
    Computed { alias: String, expr: Box<Operand> },
    /// `$apply` 聚合别名，只出现在 HAVING 中
    Aggregate {
        alias: String,
        method: AggregateMethod,
        operand: Option<Box<Operand>>,
    },
}

impl Operand {
    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Literal(_))
    }

    /// 列、导航路径或别名的名称
    pub fn key_name(&self) -> Option<String> {
        match self {
            Operand::Property(p) => Some(p.column.clone()),
            Operand::Navigation { path, .. } | Operand::CollectionCount { path, .. } => {
                Some(path.clone())
            }
            Operand::Computed { alias, .. } | Operand::Aggregate { alias, .. } => {
                Some(alias.clone())
            }
            Operand::Cast { operand, .. } | Operand::Negate(operand) => operand.key_name(),
            Operand::Function { args, .. } => args.iter().find_map(|a| a.key_name()),
            Operand::Arithmetic { left, right, .. } => left.key_name().or_else(|| right.key_name()),
            Operand::Literal(_) | Operand::Spatial { .. } => None,
        }
    }

    /// 操作数的静态类型（可推断时）
    pub fn property_type(&self) -> Option<PropertyType> {
        match self {
            Operand::Property(p) => Some(p.property_type),
            Operand::Navigation { leaf, .. } => Some(leaf.property_type),
            Operand::CollectionCount { .. } => Some(PropertyType::Int64),
            Operand::Cast { target, .. } => Some(*target),
            Operand::Computed { expr, .. } => expr.property_type(),
            Operand::Spatial { .. } => Some(PropertyType::Geography),
            _ => None,
        }
    }

    /// 引用的结构属性（用于枚举成员与数值范围校验）
    pub fn property_ref(&self) -> Option<&PropertyRef> {
        match self {
            Operand::Property(p) => Some(p),
            Operand::Navigation { leaf, .. } => Some(leaf),
            _ => None,
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Operand::Aggregate { .. } => true,
            Operand::Computed { expr, .. } | Operand::Negate(expr) => expr.contains_aggregate(),
            Operand::Cast { operand, .. } => operand.contains_aggregate(),
            Operand::Function { args, .. } => args.iter().any(|a| a.contains_aggregate()),
            Operand::Arithmetic { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            _ => false,
        }
    }
}

/// 解析后的过滤表达式
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Logical {
        op: LogicalOp,
        left: Box<FilterExpression>,
        right: Box<FilterExpression>,
    },
    Not(Box<FilterExpression>),
    Comparison {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    In {
        operand: Operand,
        values: Vec<Value>,
    },
    /// `Color has Ns.Color'Red'`
    HasFlag { operand: Operand, flag: i64 },
    StringMatch {
        op: StringMatchOp,
        operand: Operand,
        pattern: Operand,
    },
    /// 返回布尔值的其它函数（geo.intersects）
    BoolFunction { name: String, args: Vec<Operand> },
    /// `isof('Ns.Type')`：没有鉴别列时恒为假
    IsOf {
        type_name: String,
        discriminator: Option<PropertyRef>,
    },
    Lambda {
        op: LambdaOp,
        path: String,
        correlation: CorrelatedPath,
        predicate: Option<Box<FilterExpression>>,
    },
    Constant(bool),
}

impl FilterExpression {
    pub fn and(left: FilterExpression, right: FilterExpression) -> FilterExpression {
        FilterExpression::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: FilterExpression, right: FilterExpression) -> FilterExpression {
        FilterExpression::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(inner: FilterExpression) -> FilterExpression {
        FilterExpression::Not(Box::new(inner))
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, FilterExpression::Logical { .. })
    }

    /// 叶子节点的属性键：列名，或函数包裹比较时的 `_func_<fn>_<col>_<cmp>`
    pub fn property_key(&self) -> Option<String> {
        match self {
            FilterExpression::Comparison { left, op, right } => match left {
                Operand::Function { name, args } => {
                    let column = args
                        .iter()
                        .find_map(|a| a.key_name())
                        .unwrap_or_default();
                    Some(format!("_func_{}_{}_{}", name, column, op.name()))
                }
                _ => left.key_name().or_else(|| right.key_name()),
            },
            FilterExpression::In { operand, .. }
            | FilterExpression::HasFlag { operand, .. }
            | FilterExpression::StringMatch { operand, .. } => operand.key_name(),
            FilterExpression::BoolFunction { args, .. } => args.iter().find_map(|a| a.key_name()),
            FilterExpression::IsOf { discriminator, .. } => {
                discriminator.as_ref().map(|d| d.column.clone())
            }
            FilterExpression::Lambda { path, .. } => Some(path.clone()),
            FilterExpression::Logical { .. }
            | FilterExpression::Not(_)
            | FilterExpression::Constant(_) => None,
        }
    }

    /// 递归校验 in 列表的大小
    pub fn validate_in_clause_size(&self, max: usize) -> ODataResult<()> {
        match self {
            FilterExpression::In { values, .. } if values.len() > max => {
                Err(ODataError::InClauseTooLarge {
                    size: values.len(),
                    max,
                })
            }
            FilterExpression::Logical { left, right, .. } => {
                left.validate_in_clause_size(max)?;
                right.validate_in_clause_size(max)
            }
            FilterExpression::Not(inner) => inner.validate_in_clause_size(max),
            FilterExpression::Lambda {
                predicate: Some(p), ..
            } => p.validate_in_clause_size(max),
            _ => Ok(()),
        }
    }

    /// 是否引用了聚合别名（决定放入 WHERE 还是 HAVING）
    pub fn references_aggregate(&self) -> bool {
        match self {
            FilterExpression::Logical { left, right, .. } => {
                left.references_aggregate() || right.references_aggregate()
            }
            FilterExpression::Not(inner) => inner.references_aggregate(),
            FilterExpression::Comparison { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            FilterExpression::In { operand, .. }
            | FilterExpression::HasFlag { operand, .. } => operand.contains_aggregate(),
            FilterExpression::StringMatch {
                operand, pattern, ..
            } => operand.contains_aggregate() || pattern.contains_aggregate(),
            FilterExpression::BoolFunction { args, .. } => {
                args.iter().any(|a| a.contains_aggregate())
            }
            _ => false,
        }
    }

    /// 叶子节点数量
    pub fn leaf_count(&self) -> usize {
        match self {
            FilterExpression::Logical { left, right, .. } => left.leaf_count() + right.leaf_count(),
            FilterExpression::Not(inner) => inner.leaf_count(),
            _ => 1,
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpression::Logical { op, left, right } => {
                write!(f, "({}) {} ({})", left, op.sql(), right)
            }
            FilterExpression::Not(inner) => write!(f, "NOT ({})", inner),
            FilterExpression::Constant(b) => write!(f, "{}", b),
            other => write!(f, "{}", other.property_key().unwrap_or_else(|| "?".to_string())),
        }
    }
}
