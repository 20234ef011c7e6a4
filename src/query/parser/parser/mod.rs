//! 解析器模块
//!
//! 表达式解析的上下文、递归下降实现与对外门面。

mod expr_parser;
mod parse_context;
mod parser;

pub use expr_parser::ExprParser;
pub use parse_context::{ParseContext, DEFAULT_MAX_RECURSION_DEPTH};
pub use parser::{parse_filter, Parser};
