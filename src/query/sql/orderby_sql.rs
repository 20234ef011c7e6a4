//! `$orderby` → ORDER BY

use std::collections::HashMap;

use super::dialect::SqlDialect;
use super::filter_sql::FilterSqlBuilder;
use super::fragment::SqlFragment;
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::EntityMetadata;
use crate::query::options::{OrderByItem, SortDirection};
use crate::query::resolver::{resolve_operand, Operand};

/// 已解析的排序键
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// 查询字符串中的属性路径
    pub property: String,
    pub operand: Operand,
    pub direction: SortDirection,
}

/// 排序项只能是属性、单值导航路径或别名
pub fn resolve_orderby(
    items: &[OrderByItem],
    metadata: &EntityMetadata,
    aliases: &HashMap<String, Operand>,
) -> ODataResult<Vec<SortKey>> {
    items
        .iter()
        .map(|item| {
            let operand = resolve_operand(&item.expr, metadata, aliases)?;
            if let Operand::CollectionCount { .. } = operand {
                // `Nav/$count` 排序在 OData 中合法，但不属于属性路径
                return Err(ODataError::invalid_option(format!(
                    "cannot order by collection count '{}'",
                    item.property()
                )));
            }
            Ok(SortKey {
                property: item.property().to_string(),
                operand,
                direction: item.direction,
            })
        })
        .collect()
}

/// `a ASC, b DESC`（不含 `ORDER BY` 关键字）
pub fn orderby_to_sql(keys: &[SortKey], dialect: SqlDialect) -> ODataResult<SqlFragment> {
    let builder = FilterSqlBuilder::new(dialect);
    let parts = keys
        .iter()
        .map(|key| {
            let mut part = builder.operand_sql(&key.operand)?;
            part.push_str(&format!(" {}", key.direction.sql()));
            Ok(part)
        })
        .collect::<ODataResult<Vec<_>>>()?;
    Ok(SqlFragment::join(&parts, ", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;
    use crate::core::metadata::EntityRegistry;
    use crate::query::options::parse_orderby;

    fn order_sql(input: &str) -> ODataResult<SqlFragment> {
        register_catalog();
        let meta = EntityRegistry::get("Products").expect("实体集应已注册");
        let items = parse_orderby(input)?;
        let keys = resolve_orderby(&items, &meta, &HashMap::new())?;
        orderby_to_sql(&keys, SqlDialect::Sqlite)
    }

    #[test]
    fn test_property_and_navigation() {
        let frag = order_sql("Price desc,Category/Name").expect("排序应可生成");
        assert_eq!(
            frag.sql,
            "price DESC, (SELECT categories.name FROM categories WHERE categories.id = products.category_id) ASC"
        );
        assert!(frag.args.is_empty());
    }

    #[test]
    fn test_unknown_property() {
        assert!(matches!(
            order_sql("Nope"),
            Err(ODataError::PropertyNotFound { .. })
        ));
        assert!(order_sql("Reviews/$count").is_err());
    }
}
