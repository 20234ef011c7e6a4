//! OData 表达式 AST
//!
//! 基于枚举的表达式定义：解析器一次性构造，解析器下游的语义解析只遍历一次。

// 基础类型定义
pub mod types;
pub use types::*;

// 表达式定义
pub mod expr;
pub use expr::*;
