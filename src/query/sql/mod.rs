//! SQL 生成
//!
//! 片段统一使用 `?` 占位符并携带按顺序绑定的参数，语句组装完成后再按方言编号。

pub mod apply_sql;
pub mod builder;
pub mod dialect;
pub mod expand_plan;
pub mod filter_sql;
pub mod fragment;
pub mod function_sql;
pub mod lambda_sql;
pub mod orderby_sql;
pub mod per_parent;
pub mod search_sql;
pub mod select_sql;

pub use apply_sql::{apply_to_sql, ApplyClauses};
pub use builder::{apply_query_options, build_select, QueryBuilder, SelectStatement};
pub use dialect::SqlDialect;
pub use expand_plan::{plan_expand, ExpandPlan, LoadStrategy};
pub use filter_sql::{filter_to_sql, FilterSqlBuilder};
pub use fragment::SqlFragment;
pub use orderby_sql::{orderby_to_sql, resolve_orderby, SortKey};
pub use per_parent::{load_expansions, ExpandLoader, RowSource, DEFAULT_PARAM_LIMIT};
pub use search_sql::search_clause;
pub use select_sql::{build_projection, reproject_rows, Projection};
