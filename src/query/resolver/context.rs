//! 转换上下文
//!
//! 单次解析使用的状态：根实体元数据、`$compute`/`$apply` 别名、IN 上限、
//! 当前生效的 lambda 作用域以及解析缓存。

use std::collections::HashMap;
use std::sync::Arc;

use super::cache::ResolutionCache;
use super::filter_expr::{CorrelatedHop, CorrelatedPath, Operand};
use crate::core::metadata::{EntityMetadata, NavigationHop};

pub const DEFAULT_MAX_IN_CLAUSE_SIZE: usize = 1000;

/// `Coll/any(v: ...)` 引入的范围变量
#[derive(Debug, Clone)]
pub struct LambdaScope {
    pub variable: String,
    pub entity: Arc<EntityMetadata>,
    /// 元素表在子查询中的名称
    pub qualifier: String,
}

#[derive(Debug)]
pub struct ConversionContext<'a> {
    pub(crate) metadata: &'a EntityMetadata,
    pub(crate) aliases: HashMap<String, Operand>,
    pub(crate) max_in_clause_size: usize,
    pub(crate) scopes: Vec<LambdaScope>,
    /// 外层已占用的表名与别名
    pub(crate) enclosing: Vec<String>,
    pub(crate) cache: ResolutionCache,
}

impl<'a> ConversionContext<'a> {
    pub fn new(metadata: &'a EntityMetadata) -> Self {
        Self {
            metadata,
            aliases: HashMap::new(),
            max_in_clause_size: DEFAULT_MAX_IN_CLAUSE_SIZE,
            scopes: Vec::new(),
            enclosing: vec![metadata.table_name.clone()],
            cache: ResolutionCache::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, Operand>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_max_in_clause_size(mut self, max: usize) -> Self {
        self.max_in_clause_size = max;
        self
    }

    /// 使用外部（通常来自请求 arena）的缓存
    pub fn with_cache(mut self, cache: ResolutionCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn into_cache(self) -> ResolutionCache {
        self.cache
    }

    pub fn metadata(&self) -> &'a EntityMetadata {
        self.metadata
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn define_alias(&mut self, alias: impl Into<String>, operand: Operand) {
        self.aliases.insert(alias.into(), operand);
    }

    pub fn alias(&self, name: &str) -> Option<&Operand> {
        self.aliases.get(name)
    }

    pub fn aliases(&self) -> &HashMap<String, Operand> {
        &self.aliases
    }

    pub fn find_scope(&self, variable: &str) -> Option<&LambdaScope> {
        self.scopes.iter().rev().find(|s| s.variable == variable)
    }

    pub fn in_lambda(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// 根实体列的限定名：顶层不限定，lambda 内用表名限定
    pub(crate) fn root_qualifier(&self) -> Option<String> {
        if self.in_lambda() {
            Some(self.metadata.table_name.clone())
        } else {
            None
        }
    }

    /// 为导航链分配子查询别名：与外层冲突的表名加数字后缀
    pub(crate) fn correlate(&self, parent: &str, hops: &[NavigationHop]) -> CorrelatedPath {
        let mut taken = self.enclosing.clone();
        let hops = hops
            .iter()
            .map(|hop| {
                let alias = unique_alias(&hop.target.table_name, &taken);
                taken.push(alias.clone());
                CorrelatedHop {
                    table: hop.target.table_name.clone(),
                    alias,
                    joins: hop.joins.clone(),
                }
            })
            .collect();
        CorrelatedPath {
            parent: parent.to_string(),
            hops,
        }
    }

    pub(crate) fn push_scope(&mut self, scope: LambdaScope, correlation: &CorrelatedPath) {
        self.enclosing
            .extend(correlation.hops.iter().map(|h| h.alias.clone()));
        self.scopes.push(scope);
    }

    pub(crate) fn pop_scope(&mut self, correlation: &CorrelatedPath) {
        self.scopes.pop();
        let keep = self.enclosing.len().saturating_sub(correlation.hops.len());
        self.enclosing.truncate(keep);
    }
}

fn unique_alias(table: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == table) {
        return table.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", table, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| table.to_string())
}
