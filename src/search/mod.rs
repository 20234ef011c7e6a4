//! `$search` 支持
//!
//! 独立的宽松布尔语法，两种执行方式：内存中的模糊匹配，或者序列化为数据库全文检索查询串。

pub mod fts;
pub mod fuzzy;
pub mod matcher;
pub mod parser;

use serde::{Deserialize, Serialize};

pub use fts::{to_fts34_query, to_fts5_query, to_websearch_query};
pub use fuzzy::{fuzzy_contains, levenshtein, similarity};
pub use matcher::SearchMatcher;
pub use parser::{parse_search, SearchExprNode};

/// 数据库全文检索方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtsMode {
    /// 不下推到数据库，在内存中匹配
    #[default]
    None,
    Fts5,
    Fts34,
    Postgres,
}
