//! `$search` 端到端测试
//!
//! 测试范围:
//! - search::parser - 宽松的布尔语法
//! - search::fuzzy / search::matcher - 内存中的模糊匹配
//! - search::fts / query::sql::search_sql - 全文检索查询串与谓词

mod common;

use common::assertions::{assert_consistent, assert_ok, assert_sql_contains};
use common::fixtures::product_rows;
use common::{entity, options, select_sql_with};
use odata_query::config::SearchConfig;
use odata_query::search::{
    fuzzy_contains, parse_search, to_fts34_query, to_fts5_query, to_websearch_query, FtsMode,
    SearchExprNode, SearchMatcher,
};
use odata_query::{ODataError, SqlDialect, Value};

fn search_config(mode: FtsMode) -> SearchConfig {
    SearchConfig {
        fts_mode: mode,
        ..SearchConfig::default()
    }
}

fn matched_ids(search: &str) -> Vec<i64> {
    let meta = entity("Products");
    let rows = product_rows();
    let matcher = SearchMatcher::for_json_rows(&meta, &SearchConfig::default());
    matcher
        .filter(&rows, search)
        .into_iter()
        .filter_map(|r| r.get("ID").and_then(|v| v.as_i64()))
        .collect()
}

#[test]
fn test_fuzzy_contains_is_char_aware() {
    assert!(fuzzy_contains("café latte", "cafe", 2));
    assert!(!fuzzy_contains("東京都", "大阪", 1));
    assert!(fuzzy_contains("東京都", "京都", 1));
    assert!(!fuzzy_contains("café latte", "cafe", 1));
}

#[test]
fn test_fts_serializers() {
    assert_eq!(to_fts5_query("laptop OR phone"), "(laptop OR phone)");
    assert_eq!(to_fts34_query("laptop NOT phone"), "laptop");
    assert_eq!(to_websearch_query("NOT phone"), "-phone");
    assert_eq!(to_websearch_query("laptop OR phone"), "laptop or phone");
}

#[test]
fn test_websearch_keeps_negated_groups() {
    assert_eq!(to_websearch_query("NOT (laptop OR phone)"), "-(laptop or phone)");
    assert_eq!(
        to_websearch_query("tablet NOT (laptop OR phone)"),
        "tablet -(laptop or phone)"
    );

    let sql = assert_ok(select_sql_with(
        "Products",
        "$select=Name&$search=tablet NOT (laptop OR phone)",
        SqlDialect::Postgres,
        &search_config(FtsMode::Postgres),
    ));
    assert_eq!(sql.args, vec![Value::from("tablet -(laptop or phone)")]);
}

#[test]
fn test_keywords_are_case_sensitive() {
    assert!(matches!(parse_search("laptop OR phone"), Some(SearchExprNode::Or(_, _))));
    let lower = parse_search("laptop or phone").expect("应该得到搜索树");
    assert_eq!(lower.positive_terms(), vec!["laptop", "or", "phone"]);
}

#[test]
fn test_parser_is_lenient() {
    assert!(parse_search("(laptop OR").is_some());
    assert!(parse_search("\"unclosed phrase").is_some());
    assert!(parse_search("   ").is_none());
}

#[test]
fn test_in_memory_boolean_search() {
    assert_eq!(matched_ids("laptop OR phone"), vec![1, 2]);
    assert!(matched_ids("laptop or phone").is_empty());
    assert!(matched_ids("desk NOT lamp").is_empty());
    assert_eq!(matched_ids("phone NOT lamp"), vec![2]);
    assert_eq!(matched_ids("\"desk lamp\""), vec![3]);
    assert_eq!(matched_ids("東京都"), vec![4]);
    assert!(matched_ids("大阪").is_empty());
}

#[test]
fn test_per_property_fuzziness() {
    // Description 的模糊度为 2，允许 1 个编辑；Name 只做精确包含
    assert_eq!(matched_ids("laptob"), vec![1]);
    assert!(matched_ids("cafe").contains(&1));
    assert!(matched_ids("Gide").is_empty());
}

#[test]
fn test_fts5_pushdown() {
    let sql = assert_ok(select_sql_with(
        "Products",
        "$select=Name&$search=laptop OR phone",
        SqlDialect::Sqlite,
        &search_config(FtsMode::Fts5),
    ));
    assert_eq!(
        sql.sql,
        "SELECT id AS \"ID\", name AS \"Name\" FROM products WHERE rowid IN (SELECT rowid FROM products_fts WHERE products_fts MATCH ?)"
    );
    assert_eq!(sql.args, vec![Value::from("(laptop OR phone)")]);
}

#[test]
fn test_postgres_websearch_pushdown() {
    let sql = assert_ok(select_sql_with(
        "Products",
        "$select=Name&$filter=Price gt 5&$search=laptop NOT refurbished",
        SqlDialect::Postgres,
        &search_config(FtsMode::Postgres),
    ));
    assert_sql_contains(
        &sql,
        &[
            "(price > $1) AND (to_tsvector('simple', coalesce(name, '') || ' ' || coalesce(description, '')) @@ websearch_to_tsquery('simple', $2))",
        ],
    );
    assert_eq!(sql.args, vec![Value::Int(5), Value::from("laptop -refurbished")]);
    assert_consistent(&sql);
}

#[test]
fn test_mode_must_match_dialect() {
    let err = select_sql_with(
        "Products",
        "$search=laptop",
        SqlDialect::Postgres,
        &search_config(FtsMode::Fts5),
    )
    .expect_err("方言不匹配应报错");
    assert!(matches!(err, ODataError::UnsupportedFeature(_)));
}

#[test]
fn test_search_without_pushdown_keeps_tree() {
    let parsed = assert_ok(options("Products", "$search=laptop"));
    assert_eq!(parsed.search.as_deref(), Some("laptop"));
    assert_eq!(parsed.search_tree, Some(SearchExprNode::Term("laptop".to_string())));

    let sql = assert_ok(select_sql_with(
        "Products",
        "$select=Name&$search=laptop",
        SqlDialect::Sqlite,
        &SearchConfig::default(),
    ));
    assert!(!sql.sql.contains("WHERE"));
}
