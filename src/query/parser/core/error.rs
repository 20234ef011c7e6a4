//! 解析错误
//!
//! 语法错误携带位置、意外的标记、期望的标记以及提示信息，
//! 最终通过 `ODataError::Syntax` 原样返回给调用方。

use std::error::Error;
use std::fmt;

use super::position::Position;
use crate::query::parser::lexer::LexError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    LexicalError,
    SyntaxError,
    UnexpectedToken,
    UnexpectedEndOfInput,
    UnbalancedParentheses,
    InvalidLambda,
    TrailingTokens,
    RecursionLimitExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub position: Position,
    pub unexpected_token: Option<String>,
    pub expected_tokens: Vec<String>,
    pub hints: Vec<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: String, position: Position) -> Self {
        ParseError {
            kind,
            message,
            position,
            unexpected_token: None,
            expected_tokens: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn syntax_error<T: fmt::Display>(msg: T, position: Position) -> ParseError {
        ParseError::new(
            ParseErrorKind::SyntaxError,
            format!("Syntax error: {}", msg),
            position,
        )
    }

    pub fn unexpected_token<T: fmt::Display>(token: T, position: Position) -> ParseError {
        ParseError::new(
            ParseErrorKind::UnexpectedToken,
            format!("Unexpected token: {}", token),
            position,
        )
        .with_unexpected_token(token)
    }

    pub fn unexpected_end(position: Position) -> ParseError {
        ParseError::new(
            ParseErrorKind::UnexpectedEndOfInput,
            "Unexpected end of input".to_string(),
            position,
        )
    }

    pub fn unbalanced<T: fmt::Display>(what: T, position: Position) -> ParseError {
        ParseError::new(
            ParseErrorKind::UnbalancedParentheses,
            format!("Unbalanced parentheses or quotes in {}", what),
            position,
        )
    }

    pub fn invalid_lambda<T: fmt::Display>(msg: T, position: Position) -> ParseError {
        ParseError::new(
            ParseErrorKind::InvalidLambda,
            format!("Invalid lambda expression: {}", msg),
            position,
        )
    }

    pub fn trailing_tokens<T: fmt::Display>(token: T, position: Position) -> ParseError {
        ParseError::new(
            ParseErrorKind::TrailingTokens,
            format!("Unexpected trailing token: {}", token),
            position,
        )
        .with_unexpected_token(token)
    }

    pub fn with_unexpected_token<T: fmt::Display>(mut self, token: T) -> Self {
        self.unexpected_token = Some(token.to_string());
        self
    }

    pub fn with_expected_tokens(mut self, tokens: Vec<String>) -> Self {
        self.expected_tokens = tokens;
        self
    }

    pub fn with_hint(mut self, hint: String) -> Self {
        self.hints.push(hint);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at position {}: {}", self.position, self.message)?;

        if !self.expected_tokens.is_empty() {
            write!(f, " (expected one of: {})", self.expected_tokens.join(", "))?;
        }

        for hint in &self.hints {
            write!(f, "; hint: {}", hint)?;
        }

        Ok(())
    }
}

impl Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(lex_error: LexError) -> Self {
        ParseError::new(
            ParseErrorKind::LexicalError,
            lex_error.message,
            lex_error.position,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::unexpected_token("RPAREN", Position::new(10));
        let display = error.to_string();
        assert!(display.contains("position 10"));
        assert!(display.contains("Unexpected token: RPAREN"));
        assert_eq!(error.unexpected_token.as_deref(), Some("RPAREN"));
    }

    #[test]
    fn test_parse_error_with_hint() {
        let error = ParseError::syntax_error("invalid syntax", Position::new(5))
            .with_hint("wrap the collection in parentheses".to_string());

        let display = error.to_string();
        assert!(display.contains("hint"));
        assert!(display.contains("parentheses"));
    }

    #[test]
    fn test_expected_tokens_listed() {
        let error = ParseError::unexpected_end(Position::new(4))
            .with_expected_tokens(vec!["')'".to_string(), "','".to_string()]);
        assert!(error.to_string().contains("expected one of: ')', ','"));
    }
}
