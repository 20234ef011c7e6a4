use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{ODataError, ODataResult};
use crate::query::sql::SqlDialect;
use crate::search::FtsMode;

/// 查询翻译的全部可调参数
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub query: QueryConfig,
    pub search: SearchConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub dialect: SqlDialect,
    /// `in` 列表的最大元素数
    pub max_in_clause_size: usize,
    /// `$expand` 嵌套与 `$levels` 的最大深度
    pub max_expand_depth: usize,
    /// `$top` 上限，超出时报错
    pub max_top: Option<usize>,
    /// 逐父展开时单条 IN 查询的参数上限
    pub per_parent_param_limit: usize,
    /// `$filter` 字符串的最大长度
    pub max_filter_length: Option<usize>,
    pub max_recursion_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::Sqlite,
            max_in_clause_size: 1000,
            max_expand_depth: 5,
            max_top: None,
            per_parent_param_limit: 900,
            max_filter_length: None,
            max_recursion_depth: 100,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// 属性未单独配置时的模糊度，1 表示精确包含
    pub default_fuzziness: u32,
    /// 最小相似度（0..=1），设置后优先于编辑距离阈值
    pub min_similarity: Option<f64>,
    pub fts_mode: FtsMode,
    pub fts_table_suffix: String,
    /// PostgreSQL 文本检索配置名
    pub text_search_config: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_fuzziness: 1,
            min_similarity: None,
            fts_mode: FtsMode::None,
            fts_table_suffix: "_fts".to_string(),
            text_search_config: "simple".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// 为空时输出到 stderr
    pub dir: String,
    pub file: String,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: String::new(),
            file: "odata-query".to_string(),
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_files: 5,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> ODataResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ODataError::Config(format!("读取 {} 失败: {}", path.display(), e)))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ODataError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ODataResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ODataError::Config(e.to_string()))?;
        fs::write(path, content).map_err(|e| ODataError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> ODataResult<()> {
        if self.query.max_in_clause_size == 0 {
            return Err(ODataError::Config(
                "query.max_in_clause_size must be positive".to_string(),
            ));
        }
        if self.query.max_expand_depth == 0 {
            return Err(ODataError::Config(
                "query.max_expand_depth must be at least 1".to_string(),
            ));
        }
        if self.query.per_parent_param_limit == 0 {
            return Err(ODataError::Config(
                "query.per_parent_param_limit must be positive".to_string(),
            ));
        }
        if self.search.default_fuzziness == 0 {
            return Err(ODataError::Config(
                "search.default_fuzziness must be at least 1".to_string(),
            ));
        }
        if let Some(ratio) = self.search.min_similarity {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ODataError::Config(format!(
                    "search.min_similarity must be in (0, 1], got {}",
                    ratio
                )));
            }
        }
        Ok(())
    }
}
