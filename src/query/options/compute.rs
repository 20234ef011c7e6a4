//! `$compute` 解析：`expr as Alias, ...`

use std::collections::HashMap;

use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::EntityMetadata;
use crate::query::parser::ast::Expr;
use crate::query::parser::Parser;
use crate::query::resolver::{resolve_operand, Operand};
use crate::utils::split_top_level;

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeItem {
    pub expr: Expr,
    pub alias: String,
}

/// 读取 `expr as Alias`
pub(crate) fn parse_aliased(input: &str) -> ODataResult<(Expr, String)> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_expression()?;
    parser.expect_word("as")?;
    let alias = parser.expect_identifier()?;
    parser.finish()?;
    Ok((expr, alias))
}

pub fn parse_compute(input: &str) -> ODataResult<Vec<ComputeItem>> {
    let parts = split_top_level(input, ',').map_err(|offset| {
        ODataError::invalid_option(format!("unbalanced $compute at offset {}", offset))
    })?;
    let mut items: Vec<ComputeItem> = Vec::with_capacity(parts.len());
    for part in parts {
        let (expr, alias) = parse_aliased(part)?;
        if items.iter().any(|i| i.alias == alias) {
            return Err(ODataError::invalid_option(format!(
                "duplicate $compute alias '{}'",
                alias
            )));
        }
        items.push(ComputeItem { expr, alias });
    }
    Ok(items)
}

/// 按顺序解析计算列，后面的表达式可以引用前面的别名
pub fn resolve_compute(
    items: &[ComputeItem],
    metadata: &EntityMetadata,
    aliases: &mut HashMap<String, Operand>,
) -> ODataResult<Vec<(String, Operand)>> {
    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        if metadata.find_property(&item.alias).is_some() {
            return Err(ODataError::invalid_option(format!(
                "$compute alias '{}' collides with a property",
                item.alias
            )));
        }
        let operand = Operand::Computed {
            alias: item.alias.clone(),
            expr: Box::new(resolve_operand(&item.expr, metadata, aliases)?),
        };
        aliases.insert(item.alias.clone(), operand.clone());
        columns.push((item.alias.clone(), operand));
    }
    Ok(columns)
}
