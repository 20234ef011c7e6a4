//! `$apply` 聚合计划 → SELECT / WHERE / GROUP BY / HAVING

use super::dialect::SqlDialect;
use super::filter_sql::FilterSqlBuilder;
use super::fragment::SqlFragment;
use crate::core::error::ODataResult;
use crate::query::options::ApplyPlan;
use crate::query::resolver::{FilterExpression, Operand};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplyClauses {
    /// 分组列与聚合列；计划不分组时只含计算列
    pub select: SqlFragment,
    pub fields: Vec<String>,
    pub where_clause: Option<SqlFragment>,
    pub group_by: Option<SqlFragment>,
    pub having: Option<SqlFragment>,
}

fn conjunction(filters: &[FilterExpression]) -> Option<FilterExpression> {
    filters
        .iter()
        .cloned()
        .reduce(FilterExpression::and)
}

/// 分组列在结果行中的键：属性名或导航路径
fn group_field(operand: &Operand) -> String {
    match operand {
        Operand::Property(p) => p.name.clone(),
        Operand::Navigation { path, .. } => path.clone(),
        other => other.key_name().unwrap_or_default(),
    }
}

pub fn apply_to_sql(plan: &ApplyPlan, dialect: SqlDialect) -> ODataResult<ApplyClauses> {
    let builder = FilterSqlBuilder::new(dialect);
    let mut clauses = ApplyClauses::default();

    let mut select_parts = Vec::new();
    let mut group_parts = Vec::new();
    for operand in &plan.group_by {
        let expr = builder.operand_sql(operand)?;
        let field = group_field(operand);
        let mut part = expr.clone();
        part.push_str(&format!(" AS {}", dialect.quote_if_needed(&field)));
        select_parts.push(part);
        group_parts.push(expr);
        clauses.fields.push(field);
    }
    for (alias, operand) in &plan.columns {
        let mut part = builder.operand_sql(operand)?;
        part.push_str(&format!(" AS {}", dialect.quote_if_needed(alias)));
        select_parts.push(part);
        clauses.fields.push(alias.clone());
    }
    clauses.select = SqlFragment::join(&select_parts, ", ");

    if !group_parts.is_empty() {
        clauses.group_by = Some(SqlFragment::join(&group_parts, ", "));
    }
    if let Some(filter) = conjunction(&plan.pre_filters) {
        clauses.where_clause = Some(builder.build(&filter)?);
    }
    if let Some(filter) = conjunction(&plan.post_filters) {
        clauses.having = Some(builder.build(&filter)?);
    }
    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;
    use crate::core::metadata::EntityRegistry;
    use crate::query::options::{parse_apply, resolve_apply};
    use std::collections::HashMap;

    fn clauses(input: &str) -> ApplyClauses {
        register_catalog();
        let meta = EntityRegistry::get("Products").expect("实体集应已注册");
        let steps = parse_apply(input).expect("解析应该成功");
        let plan = resolve_apply(&steps, &meta, &mut HashMap::new(), 1000).expect("聚合计划应可解析");
        apply_to_sql(&plan, SqlDialect::Sqlite).expect("SQL 生成应该成功")
    }

    #[test]
    fn test_groupby_with_having() {
        let c = clauses(
            "filter(Price gt 10)/groupby((CategoryID),aggregate(Price with sum as Total,$count as N))/filter(Total gt 100)",
        );
        assert_eq!(
            c.select.sql,
            "category_id AS \"CategoryID\", SUM(price) AS \"Total\", COUNT(*) AS \"N\""
        );
        assert_eq!(c.group_by.map(|g| g.sql), Some("category_id".to_string()));
        assert_eq!(c.where_clause.map(|w| w.sql), Some("price > ?".to_string()));
        let having = c.having.expect("应该有 HAVING");
        assert_eq!(having.sql, "SUM(price) > ?");
        assert!(having.is_consistent());
        assert_eq!(c.fields, vec!["CategoryID", "Total", "N"]);
    }

    #[test]
    fn test_aggregate_without_groupby() {
        let c = clauses("aggregate(Price with average as AvgPrice, Stock with max as MaxStock)");
        assert_eq!(c.select.sql, "AVG(price) AS \"AvgPrice\", MAX(stock) AS \"MaxStock\"");
        assert!(c.group_by.is_none());
        assert!(c.having.is_none());
    }
}
