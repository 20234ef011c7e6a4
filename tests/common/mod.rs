//! 集成测试共享工具模块
//!
//! 提供测试用实体模型、查询辅助函数和断言，供所有集成测试使用

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

use std::sync::Arc;

use odata_query::config::{QueryConfig, SearchConfig};
use odata_query::{
    build_select, parse_query_string, EntityMetadata, EntityRegistry, ODataResult, QueryOptions,
    SqlDialect, SqlFragment,
};

/// 注册测试模型并返回指定实体集
pub fn entity(set: &str) -> Arc<EntityMetadata> {
    fixtures::register_all();
    EntityRegistry::get(set).expect("实体集应已注册")
}

/// 按默认配置解析查询串
pub fn options(set: &str, query: &str) -> ODataResult<QueryOptions> {
    parse_query_string(query, &entity(set), &QueryConfig::default())
}

/// 解析查询串并生成最终 SQL
pub fn select_sql(set: &str, query: &str, dialect: SqlDialect) -> ODataResult<SqlFragment> {
    select_sql_with(set, query, dialect, &SearchConfig::default())
}

pub fn select_sql_with(
    set: &str,
    query: &str,
    dialect: SqlDialect,
    search: &SearchConfig,
) -> ODataResult<SqlFragment> {
    let meta = entity(set);
    let config = QueryConfig {
        dialect,
        ..QueryConfig::default()
    };
    let options = parse_query_string(query, &meta, &config)?;
    Ok(build_select(&options, &meta, dialect, search)?.to_sql())
}
