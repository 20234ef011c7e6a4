//! 关联子查询
//!
//! lambda 的 `EXISTS`、单值导航的标量子查询以及 `Nav/$count` 的计数子查询
//! 共用同一套导航链渲染：每一跳的连接条件都引用上一跳（第一跳引用外层表）。

use super::dialect::SqlDialect;
use super::fragment::SqlFragment;
use crate::query::parser::ast::LambdaOp;
use crate::query::resolver::CorrelatedPath;

/// 第 i 跳的连接条件：`alias.target = prev.source`
fn join_condition(dialect: SqlDialect, path: &CorrelatedPath, index: usize) -> String {
    let hop = &path.hops[index];
    let previous = if index == 0 {
        path.parent.as_str()
    } else {
        path.hops[index - 1].alias.as_str()
    };
    hop.joins
        .iter()
        .map(|pair| {
            format!(
                "{} = {}",
                dialect.column(Some(&hop.alias), &pair.target_column),
                dialect.column(Some(previous), &pair.source_column)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// 扁平的 `FROM t1, t2 WHERE 连接条件`，用于标量与计数子查询
fn flat_from_where(dialect: SqlDialect, path: &CorrelatedPath) -> String {
    let tables = path
        .hops
        .iter()
        .map(|hop| dialect.table_ref(&hop.table, &hop.alias))
        .collect::<Vec<_>>()
        .join(", ");
    let conditions = (0..path.hops.len())
        .map(|i| join_condition(dialect, path, i))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!("FROM {} WHERE {}", tables, conditions)
}

/// `(SELECT alias.column FROM ... WHERE ...)`
pub fn scalar_subquery(dialect: SqlDialect, path: &CorrelatedPath, column: &str) -> SqlFragment {
    SqlFragment::new(format!(
        "(SELECT {} {})",
        dialect.column(Some(path.last_alias()), column),
        flat_from_where(dialect, path)
    ))
}

/// `(SELECT COUNT(*) FROM ... WHERE ...)`
pub fn count_subquery(dialect: SqlDialect, path: &CorrelatedPath) -> SqlFragment {
    SqlFragment::new(format!("(SELECT COUNT(*) {})", flat_from_where(dialect, path)))
}

/// 嵌套的 `EXISTS` 链，最内层附加谓词
///
/// any: `EXISTS (SELECT 1 FROM t WHERE join AND (pred))`
/// all: `NOT EXISTS (SELECT 1 FROM t WHERE join AND NOT (pred))`
pub fn lambda_exists(
    dialect: SqlDialect,
    op: LambdaOp,
    path: &CorrelatedPath,
    predicate: Option<&SqlFragment>,
) -> SqlFragment {
    let mut out = SqlFragment::default();
    if op == LambdaOp::All {
        out.push_str("NOT ");
    }
    for (i, hop) in path.hops.iter().enumerate() {
        if i > 0 {
            out.push_str(" AND ");
        }
        out.push_str(&format!(
            "EXISTS (SELECT 1 FROM {} WHERE {}",
            dialect.table_ref(&hop.table, &hop.alias),
            join_condition(dialect, path, i)
        ));
    }
    if let Some(pred) = predicate {
        match op {
            LambdaOp::Any => out.push_str(" AND ("),
            LambdaOp::All => out.push_str(" AND NOT ("),
        };
        out.push_fragment(pred);
        out.push_str(")");
    }
    for _ in &path.hops {
        out.push_str(")");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::JoinPair;
    use crate::core::Value;
    use crate::query::resolver::CorrelatedHop;

    fn reviews_path() -> CorrelatedPath {
        CorrelatedPath {
            parent: "products".to_string(),
            hops: vec![CorrelatedHop {
                table: "reviews".to_string(),
                alias: "reviews".to_string(),
                joins: vec![JoinPair {
                    source_column: "id".to_string(),
                    target_column: "product_id".to_string(),
                }],
            }],
        }
    }

    #[test]
    fn test_any_and_all() {
        let pred = SqlFragment::with_args("reviews.rating >= ?", vec![Value::Int(4)]);
        let any = lambda_exists(SqlDialect::Sqlite, LambdaOp::Any, &reviews_path(), Some(&pred));
        assert_eq!(
            any.sql,
            "EXISTS (SELECT 1 FROM reviews WHERE reviews.product_id = products.id AND (reviews.rating >= ?))"
        );
        let all = lambda_exists(SqlDialect::Sqlite, LambdaOp::All, &reviews_path(), Some(&pred));
        assert_eq!(
            all.sql,
            "NOT EXISTS (SELECT 1 FROM reviews WHERE reviews.product_id = products.id AND NOT (reviews.rating >= ?))"
        );
        assert!(all.is_consistent());
    }

    #[test]
    fn test_any_without_predicate() {
        let any = lambda_exists(SqlDialect::Sqlite, LambdaOp::Any, &reviews_path(), None);
        assert_eq!(
            any.sql,
            "EXISTS (SELECT 1 FROM reviews WHERE reviews.product_id = products.id)"
        );
    }

    #[test]
    fn test_count_subquery() {
        assert_eq!(
            count_subquery(SqlDialect::Sqlite, &reviews_path()).sql,
            "(SELECT COUNT(*) FROM reviews WHERE reviews.product_id = products.id)"
        );
    }
}
