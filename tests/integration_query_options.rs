//! 查询选项端到端测试
//!
//! 测试范围:
//! - query::options - 查询串解码、选项校验
//! - query::options::{compute, apply} - 计算列与聚合
//! - query::sql::builder - 计数语句与分页
//! - query::arena - 请求级对象复用

mod common;

use common::assertions::{assert_client_error, assert_consistent, assert_ok, assert_sql_contains};
use common::{entity, options, select_sql};
use odata_query::config::{QueryConfig, SearchConfig};
use odata_query::query::options::parse_query_options_in;
use odata_query::{build_select, parse_query_options, ODataError, QueryArena, SqlDialect, Value};

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_query_string_is_url_decoded() {
    let parsed = assert_ok(options(
        "Products",
        "?%24filter=Name%20eq%20%27Desk%20Lamp%27&$top=3&page=2",
    ));
    assert!(parsed.filter.is_some());
    assert_eq!(parsed.top, Some(3));
}

#[test]
fn test_option_names_are_validated() {
    let err = assert_client_error(options("Products", "$fitler=Price gt 1"));
    assert!(matches!(err, ODataError::InvalidQueryOption(_)));

    let err = assert_client_error(options("Products", "$top=1&$top=2"));
    assert!(matches!(err, ODataError::InvalidQueryOption(_)));

    let err = assert_client_error(options("Products", "$count=yes"));
    assert!(matches!(err, ODataError::InvalidQueryOption(_)));

    let err = assert_client_error(options("Products", "$top=-1"));
    assert!(matches!(err, ODataError::InvalidQueryOption(_)));
}

#[test]
fn test_paging_and_count_statement() {
    let meta = entity("Products");
    let parsed = assert_ok(options(
        "Products",
        "$select=Name&$filter=Active eq true&$orderby=Name&$top=10&$skip=20&$count=true",
    ));
    assert!(parsed.count);

    let stmt = assert_ok(build_select(&parsed, &meta, SqlDialect::Postgres, &SearchConfig::default()));
    let sql = stmt.to_sql();
    assert!(sql.sql.ends_with("ORDER BY name ASC LIMIT 10 OFFSET 20"), "{}", sql.sql);

    let count = stmt.count_sql();
    assert_eq!(count.sql, "SELECT COUNT(*) FROM products WHERE active = $1");
    assert_eq!(count.args, vec![Value::Bool(true)]);
}

#[test]
fn test_skip_without_top() {
    let sql = assert_ok(select_sql("Products", "$select=Name&$skip=5", SqlDialect::Sqlite));
    assert!(sql.sql.ends_with("LIMIT -1 OFFSET 5"));

    let sql = assert_ok(select_sql("Products", "$select=Name&$skip=5", SqlDialect::Postgres));
    assert!(sql.sql.ends_with("FROM products OFFSET 5"), "{}", sql.sql);
}

#[test]
fn test_compute_feeds_filter_select_and_orderby() {
    let sql = assert_ok(select_sql(
        "Products",
        "$compute=Price sub Cost as Margin&$select=Name,Margin&$filter=Margin gt 10&$orderby=Margin desc",
        SqlDialect::Sqlite,
    ));
    assert_sql_contains(&sql, &["price - cost", "AS \"Margin\"", "> ?", "DESC"]);
    assert_eq!(sql.args, vec![Value::Int(10)]);
    assert_consistent(&sql);
}

#[test]
fn test_apply_groupby_statement() {
    let sql = assert_ok(select_sql(
        "Products",
        "$apply=filter(Price gt 10)/groupby((CategoryID),aggregate(Price with sum as Total))/filter(Total gt 100)",
        SqlDialect::Postgres,
    ));
    assert_eq!(
        sql.sql,
        "SELECT category_id AS \"CategoryID\", SUM(price) AS \"Total\" FROM products WHERE price > $1 GROUP BY category_id HAVING SUM(price) > $2"
    );
    assert_eq!(sql.args, vec![Value::Int(10), Value::Int(100)]);
}

#[test]
fn test_grouped_count_wraps_subquery() {
    let meta = entity("Products");
    let parsed = assert_ok(options(
        "Products",
        "$apply=groupby((CategoryID),aggregate($count as N))&$count=true",
    ));
    let stmt = assert_ok(build_select(&parsed, &meta, SqlDialect::Sqlite, &SearchConfig::default()));
    let count = stmt.count_sql();
    assert!(count.sql.starts_with("SELECT COUNT(*) FROM (SELECT category_id"));
    assert!(count.sql.ends_with(") AS counted"));
}

#[test]
fn test_arena_reuses_objects_across_requests() {
    let meta = entity("Products");
    let config = QueryConfig::default();
    let params = pairs(&[("$filter", "Price gt 1 and Price lt 100"), ("$select", "Name")]);

    let mut arena = QueryArena::default();
    let first = assert_ok(parse_query_options_in(&mut arena, &params, &meta, &config));
    let second = assert_ok(parse_query_options_in(&mut arena, &params, &meta, &config));
    assert_eq!(first, second);

    let stats = arena.stats();
    assert!(stats.reused >= 2, "第二次请求应复用对象: {:?}", stats);
    assert!(stats.cache.hits + stats.cache.misses > 0);

    arena.reset();
    assert_eq!(arena.stats().acquired, 0);

    let standalone = assert_ok(parse_query_options(&params, &meta, &config));
    assert_eq!(standalone, first);
}
