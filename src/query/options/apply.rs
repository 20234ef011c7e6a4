//! `$apply` 解析（数据聚合扩展）
//!
//! 支持的变换以 `/` 串联：
//! `filter(expr)`、`groupby((P1,P2)[,aggregate(...)])`、
//! `aggregate(P with sum as Alias, $count as N)`、`compute(expr as Alias)`。

use std::collections::HashMap;

use super::compute::{parse_aliased, ComputeItem};
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::EntityMetadata;
use crate::query::parser::ast::Expr;
use crate::query::parser::{parse_filter, Parser};
use crate::query::resolver::{resolve, resolve_operand, AggregateMethod, FilterExpression, Operand};
use crate::utils::split_top_level;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateItem {
    /// `$count as Alias` 时为空
    pub expr: Option<Expr>,
    pub method: AggregateMethod,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyTransformation {
    Filter(Expr),
    GroupBy {
        properties: Vec<String>,
        aggregates: Vec<AggregateItem>,
    },
    Aggregate(Vec<AggregateItem>),
    Compute(Vec<ComputeItem>),
}

/// `name(args)` → (name, args)
fn split_call(input: &str) -> ODataResult<(&str, &str)> {
    let open = input.find('(').ok_or_else(|| {
        ODataError::invalid_option(format!("expected a transformation call, found '{}'", input))
    })?;
    if !input.ends_with(')') {
        return Err(ODataError::invalid_option(format!(
            "unbalanced transformation '{}'",
            input
        )));
    }
    Ok((input[..open].trim(), &input[open + 1..input.len() - 1]))
}

fn split(input: &str, sep: char) -> ODataResult<Vec<&str>> {
    split_top_level(input, sep).map_err(|offset| {
        ODataError::invalid_option(format!("unbalanced $apply at offset {}", offset))
    })
}

fn parse_aggregate_item(input: &str) -> ODataResult<AggregateItem> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_expression()?;

    if let Expr::Identifier(ident) = &expr {
        if ident.name == "$count" {
            parser.expect_word("as")?;
            let alias = parser.expect_identifier()?;
            parser.finish()?;
            return Ok(AggregateItem {
                expr: None,
                method: AggregateMethod::Count,
                alias,
            });
        }
    }

    parser.expect_word("with")?;
    let method_name = parser.expect_identifier()?;
    let method = AggregateMethod::from_name(&method_name).ok_or_else(|| {
        ODataError::UnsupportedFunction(format!("aggregate method '{}'", method_name))
    })?;
    parser.expect_word("as")?;
    let alias = parser.expect_identifier()?;
    parser.finish()?;
    Ok(AggregateItem {
        expr: Some(expr),
        method,
        alias,
    })
}

fn parse_aggregates(args: &str) -> ODataResult<Vec<AggregateItem>> {
    split(args, ',')?
        .into_iter()
        .map(parse_aggregate_item)
        .collect()
}

fn parse_groupby(args: &str) -> ODataResult<ApplyTransformation> {
    let parts = split(args, ',')?;
    let Some((first, rest)) = parts.split_first() else {
        return Err(ODataError::invalid_option("groupby requires a property list"));
    };
    let list = first
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| ODataError::invalid_option("groupby properties must be parenthesized"))?;
    let properties: Vec<String> = split(list, ',')?
        .into_iter()
        .map(str::to_string)
        .collect();
    if properties.iter().any(|p| p.is_empty()) {
        return Err(ODataError::invalid_option("empty groupby property"));
    }

    let mut aggregates = Vec::new();
    for part in rest {
        let (name, inner) = split_call(part)?;
        if name != "aggregate" {
            return Err(ODataError::UnsupportedFeature(format!(
                "groupby transformation '{}'",
                name
            )));
        }
        aggregates.extend(parse_aggregates(inner)?);
    }
    Ok(ApplyTransformation::GroupBy {
        properties,
        aggregates,
    })
}

pub fn parse_apply(input: &str) -> ODataResult<Vec<ApplyTransformation>> {
    let mut transformations = Vec::new();
    for step in split(input, '/')? {
        let (name, args) = split_call(step)?;
        let transformation = match name {
            "filter" => ApplyTransformation::Filter(parse_filter(args)?),
            "groupby" => parse_groupby(args)?,
            "aggregate" => ApplyTransformation::Aggregate(parse_aggregates(args)?),
            "compute" => {
                let items = split(args, ',')?
                    .into_iter()
                    .map(|item| parse_aliased(item).map(|(expr, alias)| ComputeItem { expr, alias }))
                    .collect::<ODataResult<Vec<_>>>()?;
                ApplyTransformation::Compute(items)
            }
            other => {
                return Err(ODataError::UnsupportedFeature(format!(
                    "$apply transformation '{}'",
                    other
                )))
            }
        };
        transformations.push(transformation);
    }
    Ok(transformations)
}

/// 解析后的聚合计划
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplyPlan {
    /// 分组前的过滤条件（WHERE）
    pub pre_filters: Vec<FilterExpression>,
    pub group_by: Vec<Operand>,
    /// 别名 → 聚合/计算表达式，按出现顺序
    pub columns: Vec<(String, Operand)>,
    /// 分组或聚合之后的过滤条件（HAVING）
    pub post_filters: Vec<FilterExpression>,
}

impl ApplyPlan {
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || self.columns.iter().any(|(_, o)| o.contains_aggregate())
    }
}

/// 按元数据解析全部变换；聚合与计算别名写入 `aliases`
pub fn resolve_apply(
    transformations: &[ApplyTransformation],
    metadata: &EntityMetadata,
    aliases: &mut HashMap<String, Operand>,
    max_in_clause_size: usize,
) -> ODataResult<ApplyPlan> {
    let mut plan = ApplyPlan::default();

    let resolve_aggregates = |items: &[AggregateItem],
                              aliases: &mut HashMap<String, Operand>|
     -> ODataResult<Vec<(String, Operand)>> {
        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            let operand = match &item.expr {
                Some(expr) => Some(Box::new(resolve_operand(expr, metadata, aliases)?)),
                None => None,
            };
            let aggregate = Operand::Aggregate {
                alias: item.alias.clone(),
                method: item.method,
                operand,
            };
            aliases.insert(item.alias.clone(), aggregate.clone());
            columns.push((item.alias.clone(), aggregate));
        }
        Ok(columns)
    };

    for transformation in transformations {
        match transformation {
            ApplyTransformation::Filter(expr) => {
                let filter = resolve(expr, metadata, aliases, max_in_clause_size)?;
                if plan.is_grouped() || filter.references_aggregate() {
                    plan.post_filters.push(filter);
                } else {
                    plan.pre_filters.push(filter);
                }
            }
            ApplyTransformation::GroupBy {
                properties,
                aggregates,
            } => {
                for property in properties {
                    let ident = parse_filter(property)?;
                    plan.group_by.push(resolve_operand(&ident, metadata, aliases)?);
                }
                let columns = resolve_aggregates(aggregates, aliases)?;
                plan.columns.extend(columns);
            }
            ApplyTransformation::Aggregate(items) => {
                let columns = resolve_aggregates(items, aliases)?;
                plan.columns.extend(columns);
            }
            ApplyTransformation::Compute(items) => {
                for item in items {
                    let operand = Operand::Computed {
                        alias: item.alias.clone(),
                        expr: Box::new(resolve_operand(&item.expr, metadata, aliases)?),
                    };
                    aliases.insert(item.alias.clone(), operand.clone());
                    plan.columns.push((item.alias.clone(), operand));
                }
            }
        }
    }
    Ok(plan)
}
