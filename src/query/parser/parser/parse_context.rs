use crate::query::parser::core::error::{ParseError, ParseErrorKind};
use crate::query::parser::core::position::{Position, Span};
use crate::query::parser::lexer::Lexer;
use crate::query::parser::Token;
use crate::query::parser::TokenKind;

/// 默认的最大嵌套深度
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 100;

pub struct ParseContext<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    /// 上一个已消费标记的结束偏移量，用于判断 `/` 是否紧贴两侧
    previous_end: Option<usize>,
    recursion_depth: usize,
    max_recursion_depth: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;

        Ok(Self {
            lexer,
            current_token,
            previous_end: None,
            recursion_depth: 0,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        })
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn enter_recursion(&mut self) -> Result<(), ParseError> {
        self.recursion_depth += 1;
        if self.recursion_depth > self.max_recursion_depth {
            let pos = self.current_position();
            Err(ParseError::new(
                ParseErrorKind::RecursionLimitExceeded,
                format!(
                    "Expression nesting exceeds the limit of {}",
                    self.max_recursion_depth
                ),
                pos,
            ))
        } else {
            Ok(())
        }
    }

    pub fn exit_recursion(&mut self) {
        if self.recursion_depth > 0 {
            self.recursion_depth -= 1;
        }
    }

    pub fn current_position(&self) -> Position {
        self.current_token.position
    }

    pub fn merge_span(&self, start: Position, end: Position) -> Span {
        Span::new(start, end)
    }

    /// 从 `start` 到上一个已消费标记结束处的区间
    pub fn span_from(&self, start: Position) -> Span {
        let end = self.previous_end.unwrap_or(start.offset);
        Span::new(start, Position::new(end))
    }

    pub fn current_token(&self) -> &Token {
        &self.current_token
    }

    pub fn previous_end(&self) -> Option<usize> {
        self.previous_end
    }

    /// 消费当前标记并返回它
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        let consumed = std::mem::replace(&mut self.current_token, next);
        self.previous_end = Some(consumed.end_offset());
        Ok(consumed)
    }

    /// 查看当前标记之后的标记，不消费任何输入
    pub fn peek_next(&self) -> Result<Token, ParseError> {
        if self.current_token.is_eof() {
            return Ok(self.current_token.clone());
        }
        let mut lookahead = self.lexer.clone();
        Ok(lookahead.next_token()?)
    }

    pub fn is_at_end(&self) -> bool {
        self.current_token.is_eof()
    }

    pub fn match_token(&mut self, expected: TokenKind) -> Result<bool, ParseError> {
        if self.current_token.kind == expected {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn check_token(&self, expected: TokenKind) -> bool {
        self.current_token.kind == expected
    }

    pub fn expect_token(&mut self, expected: TokenKind) -> Result<(), ParseError> {
        if self.current_token.kind == expected {
            self.next_token()?;
            Ok(())
        } else if self.current_token.is_eof() {
            let pos = self.current_position();
            Err(ParseError::unexpected_end(pos).with_expected_tokens(vec![expected.to_string()]))
        } else {
            let pos = self.current_position();
            Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                format!("Expected {}, found {}", expected, self.current_token.kind),
                pos,
            )
            .with_unexpected_token(&self.current_token.lexeme))
        }
    }

    pub fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current_token.kind {
            TokenKind::Identifier(s) => {
                let id = s.clone();
                self.next_token()?;
                Ok(id)
            }
            TokenKind::Eof => Err(ParseError::unexpected_end(self.current_position())
                .with_expected_tokens(vec!["identifier".to_string()])),
            _ => {
                let pos = self.current_position();
                Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken,
                    format!("Expected identifier, found {}", self.current_token.kind),
                    pos,
                )
                .with_unexpected_token(&self.current_token.lexeme))
            }
        }
    }

    /// 当前标记是否为指定的上下文关键字（`as`、`with`、`asc` 等，不区分大小写）
    pub fn check_word(&self, word: &str) -> bool {
        matches!(&self.current_token.kind, TokenKind::Identifier(s) if s.eq_ignore_ascii_case(word))
    }

    pub fn match_word(&mut self, word: &str) -> Result<bool, ParseError> {
        if self.check_word(word) {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        if self.match_word(word)? {
            return Ok(());
        }
        let pos = self.current_position();
        if self.current_token.is_eof() {
            return Err(ParseError::unexpected_end(pos).with_expected_tokens(vec![word.to_string()]));
        }
        Err(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            format!("Expected '{}', found {}", word, self.current_token.kind),
            pos,
        )
        .with_unexpected_token(&self.current_token.lexeme))
    }

    /// 要求输入已全部消费
    pub fn expect_end(&self) -> Result<(), ParseError> {
        if self.current_token.is_eof() {
            Ok(())
        } else {
            Err(ParseError::trailing_tokens(
                &self.current_token.lexeme,
                self.current_position(),
            ))
        }
    }
}
