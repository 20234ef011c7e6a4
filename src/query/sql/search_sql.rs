//! `$search` 下推为数据库全文检索谓词

use log::debug;

use super::dialect::SqlDialect;
use super::fragment::SqlFragment;
use crate::config::SearchConfig;
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::EntityMetadata;
use crate::core::Value;
use crate::search::fts::{tree_to_fts34, tree_to_fts5, tree_to_websearch};
use crate::search::{FtsMode, SearchExprNode};

fn sql_string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// 生成全文检索条件；`FtsMode::None` 或查询串为空时返回 `None`（由调用方在内存中匹配）
pub fn search_clause(
    tree: &SearchExprNode,
    metadata: &EntityMetadata,
    config: &SearchConfig,
    dialect: SqlDialect,
) -> ODataResult<Option<SqlFragment>> {
    let mode = config.fts_mode;
    let compatible = matches!(
        (mode, dialect),
        (FtsMode::None, _)
            | (FtsMode::Fts5, SqlDialect::Sqlite)
            | (FtsMode::Fts34, SqlDialect::Sqlite)
            | (FtsMode::Postgres, SqlDialect::Postgres)
    );
    if !compatible {
        return Err(ODataError::UnsupportedFeature(format!(
            "full-text mode {:?} is not available for {}",
            mode, dialect
        )));
    }

    let query = match mode {
        FtsMode::None => return Ok(None),
        FtsMode::Fts5 => tree_to_fts5(tree),
        FtsMode::Fts34 => tree_to_fts34(tree),
        FtsMode::Postgres => tree_to_websearch(tree),
    };
    if query.is_empty() {
        debug!("搜索表达式 {} 在 {:?} 下为空，不生成条件", tree, mode);
        return Ok(None);
    }

    let fragment = match mode {
        FtsMode::Postgres => {
            let columns = metadata.searchable_properties();
            if columns.is_empty() {
                return Err(ODataError::UnsupportedFeature(format!(
                    "entity '{}' has no searchable properties",
                    metadata.entity_name
                )));
            }
            let document = columns
                .iter()
                .map(|p| format!("coalesce({}, '')", dialect.column(None, &p.column_name)))
                .collect::<Vec<_>>()
                .join(" || ' ' || ");
            let ts_config = sql_string_literal(&config.text_search_config);
            let mut out = SqlFragment::new(format!(
                "to_tsvector({}, {}) @@ websearch_to_tsquery({}, ",
                ts_config, document, ts_config
            ));
            out.bind(Value::String(query));
            out.push_str(")");
            out
        }
        _ => {
            let fts_table = format!("{}{}", metadata.table_name, config.fts_table_suffix);
            let fts_table = dialect.quote_if_needed(&fts_table);
            let mut out = SqlFragment::new(format!(
                "rowid IN (SELECT rowid FROM {} WHERE {} MATCH ",
                fts_table, fts_table
            ));
            out.bind(Value::String(query));
            out.push_str(")");
            out
        }
    };
    Ok(Some(fragment))
}
