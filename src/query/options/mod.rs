//! 系统查询选项
//!
//! 每个 `$` 选项一个子模块，负责语法解析；按元数据解析的部分在各自的
//! `resolve_*` 中完成。`query_options` 把它们组合成一次请求的完整选项。

pub mod apply;
pub mod compute;
pub mod expand;
pub mod orderby;
pub mod query_options;
pub mod select;

pub use apply::{parse_apply, resolve_apply, AggregateItem, ApplyPlan, ApplyTransformation};
pub use compute::{parse_compute, resolve_compute, ComputeItem};
pub use expand::{parse_expand, unroll_levels, ExpandLevels, ExpandOption, DEFAULT_MAX_EXPAND_DEPTH};
pub use orderby::{parse_orderby, OrderByItem, SortDirection};
pub use query_options::{
    parse_query_options, parse_query_options_authorized, parse_query_options_in,
    parse_query_string, QueryOptions,
};
pub use select::{is_select_all, parse_select};
