//! 展开加载执行
//!
//! 按计划批量查询子行并挂回父行。父键按参数上限分批（批大小 × 键宽度 ≤ 上限），
//! 逐父分页的计划在内存中对每个父行的子行做 skip/take。嵌套展开在挂回之前递归加载。

use std::collections::{HashMap, HashSet};

use log::debug;
use serde_json::Value as JsonValue;

use super::dialect::SqlDialect;
use super::expand_plan::{ExpandPlan, LoadStrategy};
use super::select_sql::reproject_rows;
use crate::core::error::ODataResult;
use crate::core::metadata::JsonRow;
use crate::core::Value;

/// 单条 IN 查询默认的参数上限
pub const DEFAULT_PARAM_LIMIT: usize = 900;

/// 行数据来源：执行参数化 SQL，返回以 JSON 名为键的行
pub trait RowSource {
    fn fetch(&mut self, sql: &str, args: &[Value]) -> ODataResult<Vec<JsonRow>>;
}

impl<F> RowSource for F
where
    F: FnMut(&str, &[Value]) -> ODataResult<Vec<JsonRow>>,
{
    fn fetch(&mut self, sql: &str, args: &[Value]) -> ODataResult<Vec<JsonRow>> {
        self(sql, args)
    }
}

/// 连接键的分组键；任一列缺失或为 null 时返回 `None`
fn join_key(row: &JsonRow, fields: &[String]) -> Option<String> {
    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        match row.get(field) {
            None | Some(JsonValue::Null) => return None,
            Some(value) => values.push(value),
        }
    }
    serde_json::to_string(&values).ok()
}

fn key_values(row: &JsonRow, fields: &[String]) -> Vec<Value> {
    fields
        .iter()
        .map(|f| row.get(f).map(Value::from_json).unwrap_or(Value::Null))
        .collect()
}

pub struct ExpandLoader<'s, S: RowSource + ?Sized> {
    source: &'s mut S,
    dialect: SqlDialect,
    param_limit: usize,
}

impl<'s, S: RowSource + ?Sized> ExpandLoader<'s, S> {
    pub fn new(source: &'s mut S, dialect: SqlDialect) -> Self {
        Self {
            source,
            dialect,
            param_limit: DEFAULT_PARAM_LIMIT,
        }
    }

    pub fn with_param_limit(mut self, limit: usize) -> Self {
        self.param_limit = limit.max(1);
        self
    }

    /// 为所有父行加载全部展开
    pub fn load(&mut self, parents: &mut [JsonRow], plans: &[ExpandPlan]) -> ODataResult<()> {
        for plan in plans {
            self.load_plan(parents, plan)?;
        }
        Ok(())
    }

    fn fetch_children(
        &mut self,
        parents: &[JsonRow],
        plan: &ExpandPlan,
    ) -> ODataResult<Vec<JsonRow>> {
        let mut seen = HashSet::new();
        let mut keys: Vec<Vec<Value>> = Vec::new();
        for parent in parents {
            if let Some(key) = join_key(parent, &plan.parent_fields) {
                if seen.insert(key) {
                    keys.push(key_values(parent, &plan.parent_fields));
                }
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let width = plan.parent_fields.len().max(1);
        let available = self
            .param_limit
            .saturating_sub(plan.fixed_arg_count(self.dialect)?);
        let batch_size = (available / width).max(1);

        let mut rows = Vec::new();
        for batch in keys.chunks(batch_size) {
            let statement = plan.batch_statement(self.dialect, batch)?.to_sql();
            debug!(
                "展开 {}: {} 个父键, {} 个参数",
                plan.navigation,
                batch.len(),
                statement.args.len()
            );
            rows.extend(self.source.fetch(&statement.sql, &statement.args)?);
        }
        Ok(rows)
    }

    fn load_plan(&mut self, parents: &mut [JsonRow], plan: &ExpandPlan) -> ODataResult<()> {
        let mut children = self.fetch_children(parents, plan)?;
        if !plan.children.is_empty() && !children.is_empty() {
            self.load(&mut children, &plan.children)?;
        }

        // 按子行的连接键分组，保持查询返回的顺序
        let mut groups: HashMap<String, Vec<JsonRow>> = HashMap::new();
        for child in children {
            if let Some(key) = join_key(&child, &plan.child_fields) {
                groups.entry(key).or_default().push(child);
            }
        }
        for rows in groups.values_mut() {
            reproject_rows(
                rows,
                &plan.target,
                &plan.select,
                plan.select_specified,
                &plan.expand,
                &plan.compute,
            );
        }

        let skip = plan.skip.unwrap_or(0) as usize;
        let top = plan.top.map(|t| t as usize).unwrap_or(usize::MAX);
        for parent in parents.iter_mut() {
            let matched: &[JsonRow] = join_key(parent, &plan.parent_fields)
                .and_then(|key| groups.get(&key))
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            if plan.count {
                parent.insert(
                    format!("{}@odata.count", plan.field),
                    JsonValue::from(matched.len()),
                );
            }

            let value = if plan.is_collection {
                let page: Vec<JsonValue> = if plan.strategy == LoadStrategy::PerParent {
                    matched
                        .iter()
                        .skip(skip)
                        .take(top)
                        .cloned()
                        .map(JsonValue::Object)
                        .collect()
                } else {
                    matched.iter().cloned().map(JsonValue::Object).collect()
                };
                JsonValue::Array(page)
            } else {
                matched
                    .first()
                    .cloned()
                    .map(JsonValue::Object)
                    .unwrap_or(JsonValue::Null)
            };
            parent.insert(plan.field.clone(), value);
        }
        Ok(())
    }
}

/// 便捷入口：用给定的行来源加载展开
pub fn load_expansions<S: RowSource + ?Sized>(
    source: &mut S,
    dialect: SqlDialect,
    param_limit: usize,
    parents: &mut [JsonRow],
    plans: &[ExpandPlan],
) -> ODataResult<()> {
    ExpandLoader::new(source, dialect)
        .with_param_limit(param_limit)
        .load(parents, plans)
}
