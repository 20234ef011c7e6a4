//! `$filter` 端到端测试
//!
//! 测试范围:
//! - query::parser - 词法、语法分析
//! - query::resolver - 属性、导航与 lambda 解析
//! - query::sql - WHERE 片段与完整语句

mod common;

use std::collections::HashMap;

use common::assertions::{assert_client_error, assert_consistent, assert_ok, assert_sql_contains};
use common::{entity, select_sql};
use odata_query::config::QueryConfig;
use odata_query::query::resolver::resolve;
use odata_query::query::sql::filter_to_sql;
use odata_query::{parse_filter, parse_query_string, ErrorCategory, ODataError, SqlDialect, Value};

fn where_sql(set: &str, filter: &str, dialect: SqlDialect) -> odata_query::SqlFragment {
    let meta = entity(set);
    let expr = assert_ok(parse_filter(filter));
    let resolved = assert_ok(resolve(&expr, &meta, &HashMap::new(), 1000));
    let fragment = assert_ok(filter_to_sql(&resolved, dialect));
    assert_consistent(&fragment);
    fragment
}

// ==================== 比较与参数 ====================

#[test]
fn test_column_comparison_binds_nothing() {
    let frag = where_sql("Products", "Price gt Cost", SqlDialect::Sqlite);
    assert_eq!(frag.sql, "price > cost");
    assert!(frag.args.is_empty());

    let frag = where_sql("Products", "Price gt 100", SqlDialect::Sqlite);
    assert_eq!(frag.sql, "price > ?");
    assert_eq!(frag.args, vec![Value::Int(100)]);
}

#[test]
fn test_cast_with_logical_and() {
    let frag = where_sql(
        "Products",
        "cast(Price,'Edm.Int32') gt 100 and Name eq 'Laptop'",
        SqlDialect::Sqlite,
    );
    assert_eq!(frag.sql, "(CAST(price AS INTEGER) > ?) AND (name = ?)");
    assert_eq!(frag.args, vec![Value::Int(100), Value::from("Laptop")]);
}

#[test]
fn test_full_statement_with_filter() {
    let sql = assert_ok(select_sql(
        "Products",
        "$select=Name&$filter=Price gt 100&$orderby=Price desc&$top=5",
        SqlDialect::Sqlite,
    ));
    assert_eq!(
        sql.sql,
        "SELECT id AS \"ID\", name AS \"Name\" FROM products WHERE price > ? ORDER BY price DESC LIMIT 5"
    );
    assert_eq!(sql.args, vec![Value::Int(100)]);
}

#[test]
fn test_postgres_placeholders_are_numbered() {
    let sql = assert_ok(select_sql(
        "Products",
        "$select=Name&$filter=Price gt 10 and contains(Name,'pro')",
        SqlDialect::Postgres,
    ));
    assert_sql_contains(&sql, &["(price > $1) AND (name LIKE $2 ESCAPE '\\')"]);
    assert_eq!(sql.args, vec![Value::Int(10), Value::from("%pro%")]);
    assert_consistent(&sql);
}

#[test]
fn test_reparse_yields_equal_trees() {
    let meta = entity("Products");
    let filter = "Reviews/any(r: r/Rating ge 4) and (Price sub Cost) gt 10 or not Active";
    let first = assert_ok(resolve(&assert_ok(parse_filter(filter)), &meta, &HashMap::new(), 1000));
    let second = assert_ok(resolve(&assert_ok(parse_filter(filter)), &meta, &HashMap::new(), 1000));
    assert_eq!(first, second);
    assert_eq!(assert_ok(parse_filter(filter)), assert_ok(parse_filter(filter)));
}

#[test]
fn test_placeholder_count_matches_args() {
    let filters = [
        "Name eq 'a' and Price lt 5.5",
        "ID in (1, 2, 3) or Stock le 0",
        "contains(tolower(Name),'pro') and endswith(Description,'x')",
        "Color has Catalog.Color'Blue'",
        "year(CreatedAt) eq 2024 and month(CreatedAt) ge 6",
        "Category/Name eq 'Books' and Reviews/$count gt 2",
        "Reviews/all(r: r/Rating ge 2 and r/Comment ne null)",
        "round(Price) eq 10 and Price mod 3 eq 1",
    ];
    for dialect in [SqlDialect::Sqlite, SqlDialect::Postgres] {
        for filter in filters {
            where_sql("Products", filter, dialect);
        }
    }
}

// ==================== 导航与 lambda ====================

#[test]
fn test_navigation_and_lambda_subqueries() {
    let frag = where_sql("Products", "Category/Name eq 'Books'", SqlDialect::Sqlite);
    assert_eq!(
        frag.sql,
        "(SELECT categories.name FROM categories WHERE categories.id = products.category_id) = ?"
    );

    let frag = where_sql("Products", "Reviews/any(r: r/Rating ge 4)", SqlDialect::Sqlite);
    assert_eq!(
        frag.sql,
        "EXISTS (SELECT 1 FROM reviews WHERE reviews.product_id = products.id AND (reviews.rating >= ?))"
    );
}

#[test]
fn test_composite_key_navigation() {
    let frag = where_sql("OrderLines", "Shipment/Carrier eq 'UPS'", SqlDialect::Sqlite);
    assert_sql_contains(
        &frag,
        &[
            "shipments.no = order_lines.shipment_no",
            "shipments.order_id = order_lines.shipment_order_id",
        ],
    );
}

#[test]
fn test_lambda_variable_cannot_escape_element_type() {
    let meta = entity("Products");
    let expr = assert_ok(parse_filter("Reviews/any(r: r/Title eq 'x')"));
    let err = resolve(&expr, &meta, &HashMap::new(), 1000).expect_err("元素类型上不存在的属性应报错");
    assert!(matches!(err, ODataError::PropertyNotFound { .. }));
}

// ==================== 错误分类 ====================

#[test]
fn test_error_taxonomy() {
    let meta = entity("Products");
    let config = QueryConfig::default();

    let err = assert_client_error(parse_query_string("$filter=Name eq 'abc", &meta, &config));
    assert_eq!(err.category(), ErrorCategory::Lexical);

    let err = assert_client_error(parse_query_string("$filter=(Price gt 1", &meta, &config));
    assert_eq!(err.category(), ErrorCategory::Syntax);

    let err = assert_client_error(parse_query_string("$filter=Foo eq 1", &meta, &config));
    assert!(matches!(err, ODataError::PropertyNotFound { .. }));

    let err = assert_client_error(parse_query_string("$filter=Stock eq 2147483648", &meta, &config));
    assert!(matches!(err, ODataError::NumericOverflow { .. }));
}

#[test]
fn test_in_clause_limit_from_config() {
    let meta = entity("Products");
    let config = QueryConfig {
        max_in_clause_size: 2,
        ..QueryConfig::default()
    };
    assert!(parse_query_string("$filter=ID in (1, 2)", &meta, &config).is_ok());
    let err = parse_query_string("$filter=ID in (1, 2, 3)", &meta, &config)
        .expect_err("超过上限应报错");
    assert_eq!(err, ODataError::InClauseTooLarge { size: 3, max: 2 });
}

#[test]
fn test_isof_degrades_without_discriminator() {
    assert_eq!(where_sql("Categories", "isof('Catalog.Special')", SqlDialect::Sqlite).sql, "1=0");
    let frag = where_sql("Products", "isof('Catalog.Gadget')", SqlDialect::Sqlite);
    assert_eq!(frag.sql, "kind = ?");
}
