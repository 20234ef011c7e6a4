//! OData v4 查询选项编译器
//!
//! 把 `$filter`、`$expand`、`$select`、`$orderby`、`$search`、`$compute`、`$apply`
//! 解析成按实体元数据校验过的中间表示，再生成参数化 SQL 片段或内存中的搜索匹配。
//! 执行引擎与授权策略都是外部协作者，通过窄接口接入。

pub mod auth;
pub mod config;
pub mod core;
pub mod query;
pub mod search;
pub mod utils;

pub use crate::config::Config;
pub use crate::core::{
    EntityMetadata, EntityRegistry, ErrorCategory, ODataError, ODataResult, PropertyMetadata,
    PropertyType, Value,
};
pub use crate::query::{
    build_select, parse_filter, parse_query_options, parse_query_options_authorized,
    parse_query_string, QueryArena, QueryOptions, SelectStatement, SqlDialect, SqlFragment,
};
