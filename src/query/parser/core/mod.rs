pub mod error;
pub mod position;
pub mod token;

// 重新导出常用类型，方便其他模块使用
pub use error::{ParseError, ParseErrorKind};
pub use position::{Position, Span};
pub use token::{Token, TokenKind};
