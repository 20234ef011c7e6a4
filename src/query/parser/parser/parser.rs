use crate::query::parser::ast::Expr;
use crate::query::parser::core::error::ParseError;
use crate::query::parser::parser::expr_parser::ExprParser;
use crate::query::parser::parser::parse_context::ParseContext;

/// 表达式解析器门面
///
/// `$filter` 只需要 `parse_filter`；`$orderby`、`$compute`、`$apply` 在表达式之后
/// 还有 `asc`/`as`/`with` 之类的上下文关键字，通过 `match_word` 等方法逐步读取。
pub struct Parser<'a> {
    ctx: ParseContext<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        Ok(Self {
            ctx: ParseContext::new(input)?,
        })
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.ctx = self.ctx.with_max_recursion_depth(depth);
        self
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr_parser = ExprParser::new(&self.ctx);
        expr_parser.parse_expression(&mut self.ctx)
    }

    pub fn match_word(&mut self, word: &str) -> Result<bool, ParseError> {
        self.ctx.match_word(word)
    }

    pub fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        self.ctx.expect_word(word)
    }

    pub fn expect_identifier(&mut self) -> Result<String, ParseError> {
        self.ctx.expect_identifier()
    }

    pub fn is_at_end(&self) -> bool {
        self.ctx.is_at_end()
    }

    pub fn finish(&self) -> Result<(), ParseError> {
        self.ctx.expect_end()
    }

    pub fn context(&self) -> &ParseContext<'a> {
        &self.ctx
    }
}

/// 解析完整的布尔/算术表达式，要求消费全部输入
pub fn parse_filter(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_expression()?;
    parser.finish()?;
    Ok(expr)
}
