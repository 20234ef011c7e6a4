//! 语义解析
//!
//! 把 AST 按实体元数据解析成与方言无关的 `FilterExpression`。

pub mod cache;
pub mod context;
pub mod converter;
pub mod filter_expr;
pub mod functions;

pub use cache::{CacheStats, ResolutionCache};
pub use context::{ConversionContext, LambdaScope, DEFAULT_MAX_IN_CLAUSE_SIZE};
pub use converter::{resolve, resolve_operand};
pub use filter_expr::{
    AggregateMethod, ArithmeticOp, CompareOp, CorrelatedHop, CorrelatedPath, FilterExpression,
    LogicalOp, Operand, PropertyRef, StringMatchOp,
};
