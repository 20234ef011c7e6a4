//! 统一错误处理系统
//!
//! ## 设计理念
//!
//! 1. **分层**：词法错误 (`LexError`) 与语法错误 (`ParseError`) 保留位置信息，
//!    通过 `#[from]` 自动转换为顶层的 `ODataError`
//! 2. **语义错误**：属性不存在、导航无效、IN 列表过大、数值溢出等使用结构化变体
//! 3. **统一接口**：`ODataResult<T>` 提供统一的返回类型
//!
//! 授权拒绝不是错误通道：被拒绝的属性会被静默裁剪

use crate::query::parser::core::error::{ParseError, ParseErrorKind};
use crate::query::parser::lexer::LexError;
use thiserror::Error;

/// 统一的查询错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ODataError {
    #[error("{0}")]
    Lexical(#[from] LexError),

    #[error("{0}")]
    Syntax(#[from] ParseError),

    #[error("property '{property}' does not exist on entity '{entity}'")]
    PropertyNotFound { property: String, entity: String },

    #[error("invalid navigation: {0}")]
    InvalidNavigation(String),

    #[error("navigation target '{0}' is not registered")]
    NavigationTargetNotRegistered(String),

    #[error("expand depth {depth} exceeds the maximum of {max}")]
    ExpandDepthExceeded { depth: usize, max: usize },

    #[error("IN clause contains {size} values, maximum is {max}")]
    InClauseTooLarge { size: usize, max: usize },

    #[error("numeric value {value} overflows {type_name} property '{property}'")]
    NumericOverflow {
        value: String,
        property: String,
        type_name: String,
    },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("unsupported function '{0}'")]
    UnsupportedFunction(String),

    #[error("function '{function}' expects {expected} argument(s), found {found}")]
    InvalidArgumentCount {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("invalid query option: {0}")]
    InvalidQueryOption(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// 统一的结果类型
pub type ODataResult<T> = Result<T, ODataError>;

/// 错误分类
///
/// 宿主据此映射 HTTP 状态码：前三类为 400，其余为 500
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Lexical,
    Syntax,
    Semantic,
    Execution,
    Configuration,
}

impl ODataError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ODataError::Lexical(_) => ErrorCategory::Lexical,
            // 语法分析器转交的词法错误
            ODataError::Syntax(e) if e.kind == ParseErrorKind::LexicalError => ErrorCategory::Lexical,
            ODataError::Syntax(_) | ODataError::InvalidQueryOption(_) => ErrorCategory::Syntax,
            ODataError::Execution(_) => ErrorCategory::Execution,
            ODataError::Config(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::Semantic,
        }
    }

    /// 是否属于客户端请求错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Lexical | ErrorCategory::Syntax | ErrorCategory::Semantic
        )
    }

    pub fn property_not_found(property: impl Into<String>, entity: impl Into<String>) -> Self {
        ODataError::PropertyNotFound {
            property: property.into(),
            entity: entity.into(),
        }
    }

    pub fn invalid_option(message: impl Into<String>) -> Self {
        ODataError::InvalidQueryOption(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::core::position::Position;

    #[test]
    fn test_error_category() {
        let err = ODataError::property_not_found("Foo", "Product");
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert!(err.is_client_error());
        assert!(err.to_string().contains("does not exist"));

        let err = ODataError::Execution("db down".to_string());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_lex_error_conversion() {
        let err: ODataError = LexError::unterminated_string(Position::new(3)).into();
        assert_eq!(err.category(), ErrorCategory::Lexical);
        assert!(err.to_string().contains("Unterminated"));
    }
}
