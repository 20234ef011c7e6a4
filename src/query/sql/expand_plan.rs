//! `$expand` → 预加载计划
//!
//! 每个展开项解析为一个计划：目标实体、两端的连接列、解析后的嵌套选项与加载方式。
//! 子实体按父键批量查询 `WHERE fk IN (...)`，复合键使用 `(a = ? AND b = ?) OR ...`。

use std::collections::HashMap;
use std::sync::Arc;

use super::builder::{QueryBuilder, SelectStatement};
use super::dialect::SqlDialect;
use super::filter_sql::FilterSqlBuilder;
use super::fragment::SqlFragment;
use super::orderby_sql::{orderby_to_sql, resolve_orderby, SortKey};
use super::select_sql::build_projection;
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::EntityMetadata;
use crate::core::Value;
use crate::query::options::{resolve_compute, ExpandOption};
use crate::query::resolver::{resolve, FilterExpression, Operand};

/// 加载方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// 没有嵌套选项的简单预加载
    Preload,
    /// 带过滤、排序或投影的子查询
    Scoped,
    /// 集合导航带 `$top`/`$skip`：批量查询后逐父分页
    PerParent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpandPlan {
    pub navigation: String,
    /// 导航在父行中的键
    pub field: String,
    pub target: Arc<EntityMetadata>,
    pub is_collection: bool,
    /// 父行中的连接键（JSON 名）
    pub parent_fields: Vec<String>,
    /// 子表中的连接列
    pub child_columns: Vec<String>,
    /// 子行中的连接键（JSON 名）
    pub child_fields: Vec<String>,
    pub strategy: LoadStrategy,
    pub filter: Option<FilterExpression>,
    pub order_by: Vec<SortKey>,
    pub select: Vec<String>,
    pub select_specified: bool,
    pub compute: Vec<(String, Operand)>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: bool,
    /// 嵌套展开的原始选项，重投影时使用
    pub expand: Vec<ExpandOption>,
    pub children: Vec<ExpandPlan>,
}

fn json_name_of(metadata: &EntityMetadata, column: &str, navigation: &str) -> ODataResult<String> {
    metadata
        .find_by_column(column)
        .map(|p| p.json_name.clone())
        .ok_or_else(|| {
            ODataError::InvalidNavigation(format!(
                "join column '{}' of navigation '{}' is not a property of '{}'",
                column, navigation, metadata.entity_name
            ))
        })
}

fn plan_one(
    option: &ExpandOption,
    metadata: &EntityMetadata,
    max_in_clause_size: usize,
) -> ODataResult<ExpandPlan> {
    let nav = metadata
        .find_navigation_property(&option.navigation_property)
        .ok_or_else(|| {
            ODataError::property_not_found(
                option.navigation_property.clone(),
                metadata.entity_name.clone(),
            )
        })?;
    let target = metadata.resolve_navigation_target(&nav.name)?;
    let joins = metadata.join_columns(nav, &target)?;

    let mut parent_fields = Vec::with_capacity(joins.len());
    let mut child_columns = Vec::with_capacity(joins.len());
    let mut child_fields = Vec::with_capacity(joins.len());
    for pair in &joins {
        parent_fields.push(json_name_of(metadata, &pair.source_column, &nav.name)?);
        child_fields.push(json_name_of(&target, &pair.target_column, &nav.name)?);
        child_columns.push(pair.target_column.clone());
    }

    let mut aliases: HashMap<String, Operand> = HashMap::new();
    let compute = resolve_compute(&option.compute, &target, &mut aliases)?;
    let filter = option
        .filter
        .as_ref()
        .map(|expr| resolve(expr, &target, &aliases, max_in_clause_size))
        .transpose()?;
    let order_by = resolve_orderby(&option.order_by, &target, &aliases)?;
    let children = plan_expand(&option.expand, &target, max_in_clause_size)?;

    let strategy = if option.is_simple() {
        LoadStrategy::Preload
    } else if nav.navigation_is_array && option.is_paginated() {
        LoadStrategy::PerParent
    } else {
        LoadStrategy::Scoped
    };

    Ok(ExpandPlan {
        navigation: nav.name.clone(),
        field: nav.json_name.clone(),
        is_collection: nav.navigation_is_array,
        target,
        parent_fields,
        child_columns,
        child_fields,
        strategy,
        filter,
        order_by,
        select: option.select.clone(),
        select_specified: !option.select.is_empty(),
        compute,
        top: option.top,
        skip: option.skip,
        count: option.count,
        expand: option.expand.clone(),
        children,
    })
}

/// 为展开列表生成计划，嵌套展开递归处理
pub fn plan_expand(
    options: &[ExpandOption],
    metadata: &EntityMetadata,
    max_in_clause_size: usize,
) -> ODataResult<Vec<ExpandPlan>> {
    options
        .iter()
        .map(|option| plan_one(option, metadata, max_in_clause_size))
        .collect()
}

impl ExpandPlan {
    /// 每批父键可用的参数个数之外的参数（过滤条件、计算列）
    pub fn fixed_arg_count(&self, dialect: SqlDialect) -> ODataResult<usize> {
        let builder = FilterSqlBuilder::new(dialect);
        let mut count = 0;
        if let Some(filter) = &self.filter {
            count += builder.build(filter)?.args.len();
        }
        for (_, operand) in &self.compute {
            count += builder.operand_sql(operand)?.args.len();
        }
        for key in &self.order_by {
            count += builder.operand_sql(&key.operand)?.args.len();
        }
        Ok(count)
    }

    /// 父键条件：单列 `col IN (?, ...)`，复合键 `(a = ? AND b = ?) OR ...`
    fn key_condition(&self, dialect: SqlDialect, keys: &[Vec<Value>]) -> SqlFragment {
        let mut out = SqlFragment::default();
        if let [column] = self.child_columns.as_slice() {
            out.push_str(&format!("{} IN (", dialect.column(None, column)));
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.bind(key.first().cloned().unwrap_or(Value::Null));
            }
            out.push_str(")");
            return out;
        }

        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                out.push_str(" OR ");
            }
            out.push_str("(");
            for (j, (column, value)) in self.child_columns.iter().zip(key).enumerate() {
                if j > 0 {
                    out.push_str(" AND ");
                }
                out.push_str(&format!("{} = ", dialect.column(None, column)));
                out.bind(value.clone());
            }
            out.push_str(")");
        }
        out
    }

    /// 一批父键对应的子查询
    pub fn batch_statement(
        &self,
        dialect: SqlDialect,
        keys: &[Vec<Value>],
    ) -> ODataResult<SelectStatement> {
        let mut select = self.select.clone();
        if self.select_specified {
            for field in &self.child_fields {
                if !select.contains(field) {
                    select.push(field.clone());
                }
            }
        }
        let projection = build_projection(
            &self.target,
            &select,
            self.select_specified,
            &self.expand,
            &self.compute,
            dialect,
            None,
        )?;

        let mut statement = SelectStatement::for_entity(&self.target, dialect);
        statement.select(projection.fragment);
        statement.and_where(self.key_condition(dialect, keys));
        if let Some(filter) = &self.filter {
            statement.and_where(FilterSqlBuilder::new(dialect).build(filter)?);
        }

        if !self.order_by.is_empty() {
            statement.order_by(orderby_to_sql(&self.order_by, dialect)?);
        }
        // 主键作为最后的排序键，分页结果稳定
        let key_order = self
            .target
            .key_properties()
            .iter()
            .map(|p| format!("{} ASC", dialect.column(None, &p.column_name)))
            .collect::<Vec<_>>()
            .join(", ");
        statement.order_by(SqlFragment::new(key_order));
        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;
    use crate::core::metadata::EntityRegistry;
    use crate::query::options::{parse_expand, DEFAULT_MAX_EXPAND_DEPTH};

    fn plans(set: &str, input: &str) -> Vec<ExpandPlan> {
        register_catalog();
        let meta = EntityRegistry::get(set).expect("实体集应已注册");
        let options = parse_expand(input, &meta, DEFAULT_MAX_EXPAND_DEPTH).expect("解析应该成功");
        plan_expand(&options, &meta, 1000).expect("计划应可生成")
    }

    #[test]
    fn test_strategies() {
        let p = plans(
            "Products",
            "Category,Reviews($filter=Rating ge 4;$top=2;$orderby=Rating desc)",
        );
        assert_eq!(p[0].strategy, LoadStrategy::Preload);
        assert!(!p[0].is_collection);
        assert_eq!(p[0].parent_fields, vec!["CategoryID"]);
        assert_eq!(p[0].child_fields, vec!["ID"]);
        assert_eq!(p[1].strategy, LoadStrategy::PerParent);
        assert_eq!(p[1].parent_fields, vec!["ID"]);
        assert_eq!(p[1].child_columns, vec!["product_id"]);

        let scoped = plans("Products", "Reviews($filter=Rating ge 4)");
        assert_eq!(scoped[0].strategy, LoadStrategy::Scoped);
    }

    #[test]
    fn test_batch_statement() {
        let p = plans("Products", "Reviews($select=Rating;$filter=Rating ge 4;$orderby=Rating desc)");
        let stmt = p[0]
            .batch_statement(SqlDialect::Sqlite, &[vec![Value::Int(1)], vec![Value::Int(2)]])
            .expect("子查询应可生成");
        let sql = stmt.to_sql();
        assert_eq!(
            sql.sql,
            "SELECT id AS \"ID\", product_id AS \"ProductID\", rating AS \"Rating\" FROM reviews \
             WHERE (product_id IN (?, ?)) AND (rating >= ?) ORDER BY rating DESC, id ASC"
        );
        assert_eq!(sql.args, vec![Value::Int(1), Value::Int(2), Value::Int(4)]);
        assert_eq!(p[0].fixed_arg_count(SqlDialect::Sqlite).expect("应可计算"), 1);
    }

    #[test]
    fn test_composite_key_condition() {
        let p = plans("Shipments", "Lines");
        assert_eq!(p[0].child_columns.len(), 2);
        let stmt = p[0]
            .batch_statement(
                SqlDialect::Postgres,
                &[
                    vec![Value::Int(1), Value::Int(1)],
                    vec![Value::Int(1), Value::Int(2)],
                ],
            )
            .expect("子查询应可生成");
        let sql = stmt.to_sql();
        assert!(sql.sql.contains(
            "WHERE (shipment_no = $1 AND shipment_order_id = $2) OR (shipment_no = $3 AND shipment_order_id = $4)"
        ));
        assert_eq!(sql.args.len(), 4);
    }

    #[test]
    fn test_nested_plans() {
        let p = plans("Categories", "Products($expand=Reviews($top=1))");
        assert_eq!(p[0].children.len(), 1);
        assert_eq!(p[0].children[0].strategy, LoadStrategy::PerParent);
        assert_eq!(p[0].strategy, LoadStrategy::Preload);
    }
}
