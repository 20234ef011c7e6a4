//! 查询处理
//!
//! `$filter` 等表达式经词法、语法分析得到 AST，`resolver` 按实体元数据解析为
//! 与方言无关的过滤树，`sql` 再把过滤树和其余选项翻译成参数化 SQL。

pub mod arena;
pub mod options;
pub mod parser;
pub mod resolver;
pub mod sql;

pub use arena::{ArenaStats, QueryArena};
pub use options::{
    parse_query_options, parse_query_options_authorized, parse_query_string, QueryOptions,
};
pub use parser::parse_filter;
pub use resolver::{resolve, FilterExpression, Operand};
pub use sql::{build_select, SelectStatement, SqlDialect, SqlFragment};
