//! 表达式解析模块
//!
//! 递归下降，优先级从低到高：
//! or → and → not → 比较 → 加减 → 乘除取模 → 一元 → 基本表达式。
//! 基本表达式包括括号分组、字面量、标识符与属性路径、函数调用、lambda。

use crate::core::Value;
use crate::query::parser::ast::expr::*;
use crate::query::parser::ast::types::{BinaryOp, ComparisonOp, LambdaOp, LiteralKind, UnaryOp};
use crate::query::parser::core::error::{ParseError, ParseErrorKind};
use crate::query::parser::core::position::Span;
use crate::query::parser::parser::ParseContext;
use crate::query::parser::{Token, TokenKind};

pub struct ExprParser<'a> {
    _phantom: std::marker::PhantomData<&'a ()>,
}

impl<'a> ExprParser<'a> {
    pub fn new(_ctx: &ParseContext<'a>) -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn parse_expression(&mut self, ctx: &mut ParseContext<'a>) -> Result<Expr, ParseError> {
        self.parse_or_expression(ctx)
    }

    fn parse_or_expression(&mut self, ctx: &mut ParseContext<'a>) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expression(ctx)?;

        while ctx.match_token(TokenKind::Or)? {
            let right = self.parse_and_expression(ctx)?;
            let span = ctx.merge_span(left.span().start, right.span().end);
            left = Expr::Binary(BinaryExpr::new(left, BinaryOp::Or, right, span));
        }

        Ok(left)
    }

    fn parse_and_expression(&mut self, ctx: &mut ParseContext<'a>) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expression(ctx)?;

        while ctx.match_token(TokenKind::And)? {
            let right = self.parse_not_expression(ctx)?;
            let span = ctx.merge_span(left.span().start, right.span().end);
            left = Expr::Binary(BinaryExpr::new(left, BinaryOp::And, right, span));
        }

        Ok(left)
    }

    fn parse_not_expression(&mut self, ctx: &mut ParseContext<'a>) -> Result<Expr, ParseError> {
        let start = ctx.current_position();
        if ctx.match_token(TokenKind::Not)? {
            ctx.enter_recursion()?;
            let operand = self.parse_not_expression(ctx);
            ctx.exit_recursion();
            let operand = operand?;
            let span = ctx.merge_span(start, operand.span().end);
            Ok(Expr::Unary(UnaryExpr::new(UnaryOp::Not, operand, span)))
        } else {
            self.parse_comparison_expression(ctx)
        }
    }

    fn parse_comparison_expression(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Expr, ParseError> {
        let left = self.parse_additive_expression(ctx)?;

        if ctx.match_token(TokenKind::In)? {
            let right = self.parse_collection(ctx)?;
            let span = ctx.merge_span(left.span().start, right.span().end);
            return Ok(Expr::Comparison(ComparisonExpr::new(
                left,
                ComparisonOp::In,
                right,
                span,
            )));
        }

        if let Some(op) = self.parse_comparison_op(ctx)? {
            let right = self.parse_additive_expression(ctx)?;
            let span = ctx.merge_span(left.span().start, right.span().end);
            return Ok(Expr::Comparison(ComparisonExpr::new(left, op, right, span)));
        }

        Ok(left)
    }

    fn parse_comparison_op(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Option<ComparisonOp>, ParseError> {
        let op = match ctx.current_token().kind {
            TokenKind::Eq => ComparisonOp::Eq,
            TokenKind::Ne => ComparisonOp::Ne,
            TokenKind::Gt => ComparisonOp::Gt,
            TokenKind::Ge => ComparisonOp::Ge,
            TokenKind::Lt => ComparisonOp::Lt,
            TokenKind::Le => ComparisonOp::Le,
            TokenKind::Has => ComparisonOp::Has,
            _ => return Ok(None),
        };
        ctx.next_token()?;
        Ok(Some(op))
    }

    /// `in` 右侧：括号包围、逗号分隔的字面量集合
    fn parse_collection(&mut self, ctx: &mut ParseContext<'a>) -> Result<Expr, ParseError> {
        let start = ctx.current_position();
        if !ctx.check_token(TokenKind::LParen) {
            return Err(ParseError::syntax_error(
                format!(
                    "'in' requires a parenthesized collection, found {}",
                    ctx.current_token().kind
                ),
                start,
            )
            .with_hint("write the values as ('a','b')".to_string()));
        }
        ctx.next_token()?;

        let mut values = Vec::new();
        loop {
            if ctx.is_at_end() {
                return Err(ParseError::unbalanced("collection", ctx.current_position()));
            }
            let value = self.parse_unary_expression(ctx)?;
            if !value.is_literal() {
                return Err(ParseError::syntax_error(
                    "'in' collection may only contain literal values",
                    value.span().start,
                ));
            }
            values.push(value);
            if !ctx.match_token(TokenKind::Comma)? {
                break;
            }
        }

        if ctx.is_at_end() {
            return Err(ParseError::unbalanced("collection", ctx.current_position()));
        }
        ctx.expect_token(TokenKind::RParen)?;
        Ok(Expr::Collection(CollectionExpr::new(values, ctx.span_from(start))))
    }

    fn parse_additive_expression(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative_expression(ctx)?;

        while let Some(op) = self.parse_additive_op(ctx)? {
            let right = self.parse_multiplicative_expression(ctx)?;
            let span = ctx.merge_span(left.span().start, right.span().end);
            left = Expr::Binary(BinaryExpr::new(left, op, right, span));
        }

        Ok(left)
    }

    fn parse_additive_op(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Option<BinaryOp>, ParseError> {
        let op = match ctx.current_token().kind {
            TokenKind::Add => BinaryOp::Add,
            TokenKind::Sub => BinaryOp::Sub,
            _ => return Ok(None),
        };
        ctx.next_token()?;
        Ok(Some(op))
    }

    fn parse_multiplicative_expression(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expression(ctx)?;

        while let Some(op) = self.parse_multiplicative_op(ctx)? {
            let right = self.parse_unary_expression(ctx)?;
            let span = ctx.merge_span(left.span().start, right.span().end);
            left = Expr::Binary(BinaryExpr::new(left, op, right, span));
        }

        Ok(left)
    }

    fn parse_multiplicative_op(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Option<BinaryOp>, ParseError> {
        let op = match ctx.current_token().kind {
            TokenKind::Mul => BinaryOp::Mul,
            TokenKind::Div => BinaryOp::Div,
            TokenKind::DivBy => BinaryOp::DivBy,
            TokenKind::Mod => BinaryOp::Mod,
            // 两侧不都紧贴的 `/` 是除法
            TokenKind::Slash => BinaryOp::Div,
            _ => return Ok(None),
        };
        ctx.next_token()?;
        Ok(Some(op))
    }

    fn parse_unary_expression(&mut self, ctx: &mut ParseContext<'a>) -> Result<Expr, ParseError> {
        let start = ctx.current_position();
        if ctx.match_token(TokenKind::Sub)? {
            ctx.enter_recursion()?;
            let operand = self.parse_unary_expression(ctx);
            ctx.exit_recursion();
            let operand = operand?;
            let span = ctx.merge_span(start, operand.span().end);

            // 常量折叠：-(5) 直接成为负数字面量
            if let Expr::Literal(lit) = operand.unwrap_group() {
                let negated = match &lit.value {
                    Value::Int(i) => i.checked_neg().map(Value::Int),
                    Value::Float(f) => Some(Value::Float(-f)),
                    _ => None,
                };
                if let Some(value) = negated {
                    return Ok(Expr::Literal(LiteralExpr::new(value, lit.kind.clone(), span)));
                }
            }
            Ok(Expr::Unary(UnaryExpr::new(UnaryOp::Negate, operand, span)))
        } else {
            self.parse_primary_expression(ctx)
        }
    }

    fn parse_primary_expression(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Expr, ParseError> {
        let token = ctx.current_token().clone();
        let start_pos = token.position;

        match &token.kind {
            TokenKind::LParen => {
                ctx.next_token()?;
                ctx.enter_recursion()?;
                let inner = self.parse_expression(ctx);
                ctx.exit_recursion();
                let inner = inner?;
                if ctx.is_at_end() {
                    return Err(ParseError::unbalanced("expression", ctx.current_position())
                        .with_expected_tokens(vec!["')'".to_string()]));
                }
                ctx.expect_token(TokenKind::RParen)?;
                Ok(Expr::Group(GroupExpr::new(inner, ctx.span_from(start_pos))))
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                ctx.next_token()?;
                if ctx.check_token(TokenKind::LParen) {
                    self.parse_function_call(name, start_pos, ctx)
                } else {
                    self.parse_path(name, start_pos, ctx)
                }
            }
            TokenKind::RParen => Err(ParseError::new(
                ParseErrorKind::UnbalancedParentheses,
                "Unexpected ')'".to_string(),
                start_pos,
            )
            .with_unexpected_token(")")),
            TokenKind::Eof => Err(ParseError::unexpected_end(start_pos)
                .with_expected_tokens(vec!["expression".to_string()])),
            kind if kind.is_literal() => {
                ctx.next_token()?;
                let span = ctx.span_from(start_pos);
                Ok(Expr::Literal(literal_from_token(token, span)))
            }
            _ => Err(ParseError::unexpected_token(&token.lexeme, start_pos)
                .with_expected_tokens(vec!["expression".to_string()])),
        }
    }

    /// 当前 `/` 是否为路径分隔符：与前一个标记、后一个标识符都紧贴
    fn slash_continues_path(&self, ctx: &ParseContext<'a>) -> Result<bool, ParseError> {
        let slash = ctx.current_token();
        if slash.kind != TokenKind::Slash || ctx.previous_end() != Some(slash.position.offset) {
            return Ok(false);
        }
        let next = ctx.peek_next()?;
        Ok(matches!(next.kind, TokenKind::Identifier(_))
            && next.position.offset == slash.end_offset())
    }

    fn parse_path(
        &mut self,
        first: String,
        start_pos: crate::query::parser::core::Position,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Expr, ParseError> {
        let mut segments = vec![first];

        while self.slash_continues_path(ctx)? {
            ctx.next_token()?;
            let segment = ctx.expect_identifier()?;

            if ctx.check_token(TokenKind::LParen) {
                if let Some(op) = LambdaOp::from_name(&segment) {
                    return self.parse_lambda(segments, op, start_pos, ctx);
                }
                return Err(ParseError::syntax_error(
                    format!("function '{}' cannot follow a property path", segment),
                    ctx.current_position(),
                )
                .with_hint("use any(...) or all(...) on collection paths".to_string()));
            }
            segments.push(segment);
        }

        let span = ctx.span_from(start_pos);
        Ok(Expr::Identifier(IdentifierExpr::new(segments.join("/"), span)))
    }

    fn parse_lambda(
        &mut self,
        collection_path: Vec<String>,
        op: LambdaOp,
        start_pos: crate::query::parser::core::Position,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Expr, ParseError> {
        ctx.expect_token(TokenKind::LParen)?;

        if ctx.match_token(TokenKind::RParen)? {
            if op == LambdaOp::All {
                return Err(ParseError::invalid_lambda(
                    "all() requires a predicate",
                    ctx.current_position(),
                ));
            }
            let span = ctx.span_from(start_pos);
            return Ok(Expr::Lambda(LambdaExpr::new(
                collection_path,
                op,
                None,
                None,
                span,
            )));
        }

        let variable = match &ctx.current_token().kind {
            TokenKind::Identifier(v) if !v.contains('.') => v.clone(),
            _ => {
                return Err(ParseError::invalid_lambda(
                    format!("expected a range variable, found {}", ctx.current_token().kind),
                    ctx.current_position(),
                ))
            }
        };
        ctx.next_token()?;

        if !ctx.match_token(TokenKind::Colon)? {
            return Err(ParseError::invalid_lambda(
                format!("expected ':' after range variable '{}'", variable),
                ctx.current_position(),
            ));
        }

        ctx.enter_recursion()?;
        let predicate = self.parse_expression(ctx);
        ctx.exit_recursion();
        let predicate = predicate?;

        if ctx.check_token(TokenKind::Comma) {
            return Err(ParseError::invalid_lambda(
                format!("{}() takes exactly one predicate", op),
                ctx.current_position(),
            ));
        }
        if ctx.is_at_end() {
            return Err(ParseError::unbalanced("lambda expression", ctx.current_position()));
        }
        ctx.expect_token(TokenKind::RParen)?;

        let span = ctx.span_from(start_pos);
        Ok(Expr::Lambda(LambdaExpr::new(
            collection_path,
            op,
            Some(variable),
            Some(predicate),
            span,
        )))
    }

    fn parse_function_call(
        &mut self,
        name: String,
        start_pos: crate::query::parser::core::Position,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Expr, ParseError> {
        ctx.expect_token(TokenKind::LParen)?;
        let args = if ctx.match_token(TokenKind::RParen)? {
            Vec::new()
        } else {
            ctx.enter_recursion()?;
            let args = self.parse_expression_list(ctx);
            ctx.exit_recursion();
            let args = args?;
            if ctx.is_at_end() {
                return Err(ParseError::unbalanced(
                    format!("call to '{}'", name),
                    ctx.current_position(),
                ));
            }
            ctx.expect_token(TokenKind::RParen)?;
            args
        };
        let span = ctx.span_from(start_pos);
        Ok(Expr::FunctionCall(FunctionCallExpr::new(name, args, span)))
    }

    fn parse_expression_list(
        &mut self,
        ctx: &mut ParseContext<'a>,
    ) -> Result<Vec<Expr>, ParseError> {
        let mut expressions = Vec::new();
        expressions.push(self.parse_expression(ctx)?);
        while ctx.match_token(TokenKind::Comma)? {
            expressions.push(self.parse_expression(ctx)?);
        }
        Ok(expressions)
    }
}

fn literal_from_token(token: Token, span: Span) -> LiteralExpr {
    let (value, kind) = match token.kind {
        TokenKind::String(s) => (Value::String(s), LiteralKind::String),
        TokenKind::Integer(i) => (Value::Int(i), LiteralKind::Integer),
        TokenKind::Decimal(d) => (Value::Float(d), LiteralKind::Decimal),
        TokenKind::Boolean(b) => (Value::Bool(b), LiteralKind::Boolean),
        TokenKind::Date(d) => (Value::Date(d), LiteralKind::Date),
        TokenKind::TimeOfDay(t) => (Value::TimeOfDay(t), LiteralKind::TimeOfDay),
        TokenKind::DateTimeOffset(dt) => (Value::DateTimeOffset(dt), LiteralKind::DateTimeOffset),
        TokenKind::Guid(g) => (Value::Guid(g), LiteralKind::Guid),
        TokenKind::Duration(d) => (Value::String(d), LiteralKind::Duration),
        TokenKind::Geography(g) => (Value::String(g), LiteralKind::Geography),
        TokenKind::Geometry(g) => (Value::String(g), LiteralKind::Geometry),
        TokenKind::Enum { type_name, member } => {
            (Value::String(member), LiteralKind::Enum { type_name })
        }
        _ => (Value::Null, LiteralKind::Null),
    };
    LiteralExpr::new(value, kind, span)
}
