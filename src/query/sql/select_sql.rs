//! `$select` → 投影列，以及查询后的行重投影
//!
//! SQL 投影总是包含主键与展开所需的外键列，计算列追加在末尾。
//! 结果行以 JSON 名为键；重投影只保留请求的属性、主键与展开的导航。

use std::collections::BTreeSet;

use super::dialect::SqlDialect;
use super::filter_sql::FilterSqlBuilder;
use super::fragment::SqlFragment;
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::{EntityMetadata, JsonRow, PropertyMetadata};
use crate::query::options::{is_select_all, ExpandOption};
use crate::query::resolver::Operand;
use serde_json::Value as JsonValue;

/// 生成的投影
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub fragment: SqlFragment,
    /// 结果行中的键（JSON 名与计算别名），按列顺序
    pub fields: Vec<String>,
}

/// 选择项中属于本实体的结构属性名（`Nav/Prop` 只贡献导航名）
fn selected_roots(select: &[String]) -> BTreeSet<&str> {
    select
        .iter()
        .map(|s| s.split('/').next().unwrap_or(s.as_str()))
        .collect()
}

/// 展开需要的本实体连接列
fn expand_join_columns(
    metadata: &EntityMetadata,
    expand: &[ExpandOption],
) -> ODataResult<Vec<String>> {
    let mut columns = Vec::new();
    for option in expand {
        let nav = metadata
            .find_navigation_property(&option.navigation_property)
            .ok_or_else(|| {
                ODataError::property_not_found(
                    option.navigation_property.clone(),
                    metadata.entity_name.clone(),
                )
            })?;
        let target = metadata.resolve_navigation_target(&nav.name)?;
        for pair in metadata.join_columns(nav, &target)? {
            if !columns.contains(&pair.source_column) {
                columns.push(pair.source_column);
            }
        }
    }
    Ok(columns)
}

/// 需要投影的结构属性，按元数据顺序
fn projected_properties<'m>(
    metadata: &'m EntityMetadata,
    select: &[String],
    select_specified: bool,
    expand: &[ExpandOption],
    computed: &[(String, Operand)],
) -> ODataResult<Vec<&'m PropertyMetadata>> {
    if !select_specified || is_select_all(select) {
        return Ok(metadata.structural_properties().collect());
    }

    let roots = selected_roots(select);
    for root in &roots {
        let known = metadata.find_property(root).is_some()
            || computed.iter().any(|(alias, _)| alias == root);
        if !known {
            return Err(ODataError::property_not_found(
                root.to_string(),
                metadata.entity_name.clone(),
            ));
        }
    }

    let join_columns = expand_join_columns(metadata, expand)?;
    Ok(metadata
        .structural_properties()
        .filter(|p| {
            p.is_key
                || roots.contains(p.name.as_str())
                || roots.contains(p.json_name.as_str())
                || join_columns.contains(&p.column_name)
        })
        .collect())
}

/// 构建投影；`qualifier` 为列限定名（顶层查询传 `None`）
pub fn build_projection(
    metadata: &EntityMetadata,
    select: &[String],
    select_specified: bool,
    expand: &[ExpandOption],
    computed: &[(String, Operand)],
    dialect: SqlDialect,
    qualifier: Option<&str>,
) -> ODataResult<Projection> {
    let properties = projected_properties(metadata, select, select_specified, expand, computed)?;
    let builder = FilterSqlBuilder::new(dialect);

    let mut parts = Vec::with_capacity(properties.len() + computed.len());
    let mut fields = Vec::with_capacity(parts.capacity());
    for prop in properties {
        let mut column = dialect.column(qualifier, &prop.column_name);
        if prop.json_name != prop.column_name {
            column.push_str(&format!(" AS {}", dialect.quote_if_needed(&prop.json_name)));
        }
        parts.push(SqlFragment::new(column));
        fields.push(prop.json_name.clone());
    }
    for (alias, operand) in computed {
        let mut part = builder.operand_sql(operand)?;
        part.push_str(&format!(" AS {}", dialect.quote_if_needed(alias)));
        parts.push(part);
        fields.push(alias.clone());
    }

    Ok(Projection {
        fragment: SqlFragment::join(&parts, ", "),
        fields,
    })
}

/// 一行中应保留的键
fn retained_keys(
    metadata: &EntityMetadata,
    select: &[String],
    select_specified: bool,
    expand: &[ExpandOption],
    computed: &[(String, Operand)],
) -> Option<BTreeSet<String>> {
    if !select_specified || is_select_all(select) {
        return None;
    }
    let roots = selected_roots(select);
    let mut keep: BTreeSet<String> = metadata
        .key_properties()
        .iter()
        .map(|p| p.json_name.clone())
        .collect();
    for root in roots {
        match metadata.find_property(root) {
            Some(prop) => keep.insert(prop.json_name.clone()),
            None => keep.insert(root.to_string()),
        };
    }
    for (alias, _) in computed {
        if select.iter().any(|s| s == alias) {
            keep.insert(alias.clone());
        }
    }
    for option in expand {
        if let Some(nav) = metadata.find_navigation_property(&option.navigation_property) {
            keep.insert(nav.json_name.clone());
            keep.insert(format!("{}@odata.count", nav.json_name));
        }
    }
    Some(keep)
}

/// `Nav/Prop` 选择项按导航分组：导航 → 子属性列表
fn nested_selects(select: &[String], nav: &str) -> Vec<String> {
    select
        .iter()
        .filter_map(|s| s.split_once('/'))
        .filter(|(head, _)| *head == nav)
        .map(|(_, rest)| rest.to_string())
        .collect()
}

fn reproject_value(value: &mut JsonValue, target: &EntityMetadata, select: &[String]) {
    match value {
        JsonValue::Object(row) => reproject_row(row, target, select, true, &[], &[]),
        JsonValue::Array(items) => {
            for item in items {
                reproject_value(item, target, select);
            }
        }
        _ => {}
    }
}

fn reproject_row(
    row: &mut JsonRow,
    metadata: &EntityMetadata,
    select: &[String],
    select_specified: bool,
    expand: &[ExpandOption],
    computed: &[(String, Operand)],
) {
    if let Some(keep) = retained_keys(metadata, select, select_specified, expand, computed) {
        row.retain(|key, _| keep.contains(key));
    }

    // `Nav/Prop` 选择同时裁剪导航对象
    for root in selected_roots(select) {
        let Some(nav) = metadata.find_navigation_property(root) else {
            continue;
        };
        let nested = nested_selects(select, root);
        if nested.is_empty() {
            continue;
        }
        let Ok(target) = metadata.resolve_navigation_target(&nav.name) else {
            continue;
        };
        if let Some(value) = row.get_mut(&nav.json_name) {
            reproject_value(value, &target, &nested);
        }
    }
}

/// 查询后的重投影：去掉只为连接而查询的列
pub fn reproject_rows(
    rows: &mut [JsonRow],
    metadata: &EntityMetadata,
    select: &[String],
    select_specified: bool,
    expand: &[ExpandOption],
    computed: &[(String, Operand)],
) {
    for row in rows.iter_mut() {
        reproject_row(row, metadata, select, select_specified, expand, computed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;
    use crate::core::metadata::EntityRegistry;
    use serde_json::json;

    fn row(value: JsonValue) -> JsonRow {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_projection_includes_keys_and_join_columns() {
        register_catalog();
        let meta = EntityRegistry::get("Products").expect("实体集应已注册");
        let expand = vec![ExpandOption::new("Category")];
        let projection = build_projection(
            &meta,
            &["Name".to_string()],
            true,
            &expand,
            &[],
            SqlDialect::Sqlite,
            None,
        )
        .expect("投影应可生成");
        assert_eq!(
            projection.fragment.sql,
            "id AS \"ID\", name AS \"Name\", category_id AS \"CategoryID\""
        );
        assert_eq!(projection.fields, vec!["ID", "Name", "CategoryID"]);
    }

    #[test]
    fn test_projection_qualified_with_computed() {
        register_catalog();
        let meta = EntityRegistry::get("Reviews").expect("实体集应已注册");
        let computed = vec![(
            "Double".to_string(),
            Operand::Computed {
                alias: "Double".to_string(),
                expr: Box::new(Operand::Literal(crate::core::Value::Int(2))),
            },
        )];
        let projection = build_projection(
            &meta,
            &["Rating".to_string(), "Double".to_string()],
            true,
            &[],
            &computed,
            SqlDialect::Postgres,
            Some("reviews"),
        )
        .expect("投影应可生成");
        assert_eq!(
            projection.fragment.sql,
            "reviews.id AS \"ID\", reviews.rating AS \"Rating\", (?) AS \"Double\""
        );
        assert_eq!(projection.fragment.args.len(), 1);
    }

    #[test]
    fn test_unknown_select_is_error() {
        register_catalog();
        let meta = EntityRegistry::get("Products").expect("实体集应已注册");
        let result = build_projection(
            &meta,
            &["Nope".to_string()],
            true,
            &[],
            &[],
            SqlDialect::Sqlite,
            None,
        );
        assert!(matches!(result, Err(ODataError::PropertyNotFound { .. })));
    }

    #[test]
    fn test_reproject_rows() {
        register_catalog();
        let meta = EntityRegistry::get("Products").expect("实体集应已注册");
        let mut rows = vec![row(json!({
            "ID": 1,
            "Name": "Laptop",
            "CategoryID": 7,
            "Category": {"ID": 7, "Name": "Computers", "ParentID": null}
        }))];
        let select = vec!["Name".to_string(), "Category/Name".to_string()];
        let expand = vec![ExpandOption::new("Category")];
        reproject_rows(&mut rows, &meta, &select, true, &expand, &[]);

        assert_eq!(
            JsonValue::Object(rows[0].clone()),
            json!({"ID": 1, "Name": "Laptop", "Category": {"ID": 7, "Name": "Computers"}})
        );
    }
}
