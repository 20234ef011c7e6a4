//! `$orderby` 解析

use std::fmt;

use crate::core::error::{ODataError, ODataResult};
use crate::query::parser::ast::Expr;
use crate::query::parser::Parser;
use crate::utils::split_top_level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

/// 排序项：属性、单值导航路径或计算别名
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl OrderByItem {
    /// 排序的属性路径
    pub fn property(&self) -> &str {
        match &self.expr {
            Expr::Identifier(ident) => &ident.name,
            _ => "",
        }
    }
}

impl fmt::Display for OrderByItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.property(), self.direction)
    }
}

fn parse_item(item: &str) -> ODataResult<OrderByItem> {
    let mut parser = Parser::new(item)?;
    let expr = parser.parse_expression()?;
    if !matches!(expr, Expr::Identifier(_)) {
        return Err(ODataError::invalid_option(format!(
            "$orderby item '{}' must be a property path",
            item
        )));
    }
    let direction = if parser.match_word("desc")? {
        SortDirection::Desc
    } else {
        parser.match_word("asc")?;
        SortDirection::Asc
    };
    parser.finish()?;
    Ok(OrderByItem { expr, direction })
}

pub fn parse_orderby(input: &str) -> ODataResult<Vec<OrderByItem>> {
    let parts = split_top_level(input, ',').map_err(|offset| {
        ODataError::invalid_option(format!("unbalanced $orderby at offset {}", offset))
    })?;
    parts
        .into_iter()
        .map(|part| {
            if part.is_empty() {
                Err(ODataError::invalid_option("empty $orderby item"))
            } else {
                parse_item(part)
            }
        })
        .collect()
}
