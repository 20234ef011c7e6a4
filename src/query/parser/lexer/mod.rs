pub mod lexer;

pub use crate::query::parser::core::{Token, TokenKind};
pub use lexer::{tokenize, Lexer};

use crate::query::parser::core::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

impl LexError {
    pub fn new(message: String, position: Position) -> Self {
        LexError { message, position }
    }

    pub fn unterminated_string(position: Position) -> Self {
        LexError::new("Unterminated string literal".to_string(), position)
    }

    pub fn invalid_number(message: String, position: Position) -> Self {
        LexError::new(format!("Invalid number: {}", message), position)
    }

    pub fn invalid_literal(kind: &str, text: &str, position: Position) -> Self {
        LexError::new(format!("Invalid {} literal: '{}'", kind, text), position)
    }

    pub fn unexpected_character(ch: char, position: Position) -> Self {
        LexError::new(format!("Unexpected character: '{}'", ch), position)
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lex error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for LexError {}
