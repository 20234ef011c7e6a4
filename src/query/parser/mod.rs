//! OData 表达式解析模块
//!
//! 词法分析 → 递归下降语法分析 → 表达式 AST。
//! `$search` 使用独立的宽松语法，见 `crate::search`。

pub mod ast;
pub mod core;
pub mod lexer;
pub mod parser;

// 重新导出 core 模块的常用类型
pub use core::{ParseError, ParseErrorKind, Position, Span, Token, TokenKind};

// 重新导出统一解析器
pub use parser::{parse_filter, Parser};
