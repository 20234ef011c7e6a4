//! SELECT 语句组装
//!
//! `QueryBuilder` 是查询选项落到执行引擎的接缝：宿主可以用自己的构建器实现它，
//! `SelectStatement` 是内置实现，输出完整的参数化 SELECT。

use std::fmt;

use log::debug;

use super::apply_sql::apply_to_sql;
use super::dialect::SqlDialect;
use super::filter_sql::FilterSqlBuilder;
use super::fragment::SqlFragment;
use super::orderby_sql::orderby_to_sql;
use super::search_sql::search_clause;
use super::select_sql::build_projection;
use crate::config::SearchConfig;
use crate::core::error::ODataResult;
use crate::core::metadata::EntityMetadata;
use crate::query::options::QueryOptions;

/// 查询构建器接口，片段内使用 `?` 占位符
pub trait QueryBuilder {
    fn dialect(&self) -> SqlDialect;

    /// 替换投影列
    fn select(&mut self, projection: SqlFragment);

    /// 追加 WHERE 条件，多个条件以 AND 连接
    fn and_where(&mut self, condition: SqlFragment);

    fn group_by(&mut self, columns: SqlFragment);

    fn having(&mut self, condition: SqlFragment);

    fn order_by(&mut self, ordering: SqlFragment);

    fn limit(&mut self, limit: u64);

    fn offset(&mut self, offset: u64);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    dialect: SqlDialect,
    table: String,
    columns: Option<SqlFragment>,
    conditions: Vec<SqlFragment>,
    group_by: Option<SqlFragment>,
    having: Vec<SqlFragment>,
    order_by: Vec<SqlFragment>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectStatement {
    pub fn new(dialect: SqlDialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            columns: None,
            conditions: Vec::new(),
            group_by: None,
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn for_entity(metadata: &EntityMetadata, dialect: SqlDialect) -> Self {
        Self::new(dialect, metadata.table_name.clone())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[SqlFragment] {
        &self.conditions
    }

    fn combine(conditions: &[SqlFragment]) -> Option<SqlFragment> {
        match conditions {
            [] => None,
            [single] => Some(single.clone()),
            many => {
                let parts: Vec<SqlFragment> = many.iter().map(SqlFragment::parenthesized).collect();
                Some(SqlFragment::join(&parts, " AND "))
            }
        }
    }

    /// 不含分页与排序的主体：`SELECT ... FROM ... WHERE ... GROUP BY ... HAVING ...`
    fn body(&self) -> SqlFragment {
        let mut out = SqlFragment::new("SELECT ");
        match &self.columns {
            Some(columns) if !columns.is_empty() => {
                out.push_fragment(columns);
            }
            _ => {
                out.push_str("*");
            }
        }
        out.push_str(&format!(" FROM {}", self.dialect.quote_if_needed(&self.table)));
        if let Some(condition) = Self::combine(&self.conditions) {
            out.push_str(" WHERE ");
            out.push_fragment(&condition);
        }
        if let Some(group_by) = &self.group_by {
            out.push_str(" GROUP BY ");
            out.push_fragment(group_by);
        }
        if let Some(condition) = Self::combine(&self.having) {
            out.push_str(" HAVING ");
            out.push_fragment(&condition);
        }
        out
    }

    /// 使用 `?` 占位符的语句
    pub fn to_fragment(&self) -> SqlFragment {
        let mut out = self.body();
        if !self.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_fragment(&SqlFragment::join(&self.order_by, ", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                out.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
            }
            (Some(limit), None) => {
                out.push_str(&format!(" LIMIT {}", limit));
            }
            (None, Some(offset)) => match self.dialect {
                // SQLite 的 OFFSET 必须跟在 LIMIT 之后
                SqlDialect::Sqlite => {
                    out.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
                }
                SqlDialect::Postgres => {
                    out.push_str(&format!(" OFFSET {}", offset));
                }
            },
            (None, None) => {}
        }
        out
    }

    /// 最终语句，占位符按方言编号
    pub fn to_sql(&self) -> SqlFragment {
        self.finish(self.to_fragment())
    }

    /// `$count=true` 使用的计数语句，忽略排序与分页
    pub fn count_sql(&self) -> SqlFragment {
        let fragment = if self.group_by.is_some() || !self.having.is_empty() {
            let mut out = SqlFragment::new("SELECT COUNT(*) FROM (");
            out.push_fragment(&self.body());
            out.push_str(") AS counted");
            out
        } else {
            let mut out = SqlFragment::new(format!(
                "SELECT COUNT(*) FROM {}",
                self.dialect.quote_if_needed(&self.table)
            ));
            if let Some(condition) = Self::combine(&self.conditions) {
                out.push_str(" WHERE ");
                out.push_fragment(&condition);
            }
            out
        };
        self.finish(fragment)
    }

    fn finish(&self, fragment: SqlFragment) -> SqlFragment {
        SqlFragment {
            sql: self.dialect.renumber_placeholders(&fragment.sql),
            args: fragment.args,
        }
    }
}

impl QueryBuilder for SelectStatement {
    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn select(&mut self, projection: SqlFragment) {
        self.columns = Some(projection);
    }

    fn and_where(&mut self, condition: SqlFragment) {
        if !condition.is_empty() {
            self.conditions.push(condition);
        }
    }

    fn group_by(&mut self, columns: SqlFragment) {
        self.group_by = Some(columns);
    }

    fn having(&mut self, condition: SqlFragment) {
        if !condition.is_empty() {
            self.having.push(condition);
        }
    }

    fn order_by(&mut self, ordering: SqlFragment) {
        if !ordering.is_empty() {
            self.order_by.push(ordering);
        }
    }

    fn limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    fn offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql().sql)
    }
}

/// 把查询选项应用到构建器
///
/// 顺序：投影（或聚合列）→ WHERE（`$apply` 前置过滤、`$filter`、`$search`）→
/// GROUP BY / HAVING → ORDER BY → LIMIT / OFFSET
pub fn apply_query_options<B: QueryBuilder + ?Sized>(
    builder: &mut B,
    options: &QueryOptions,
    metadata: &EntityMetadata,
    search: &SearchConfig,
) -> ODataResult<()> {
    let dialect = builder.dialect();
    let filters = FilterSqlBuilder::new(dialect);

    let mut computed = options.compute.clone();
    match &options.apply {
        Some(plan) if plan.is_grouped() => {
            let clauses = apply_to_sql(plan, dialect)?;
            builder.select(clauses.select);
            if let Some(where_clause) = clauses.where_clause {
                builder.and_where(where_clause);
            }
            if let Some(group_by) = clauses.group_by {
                builder.group_by(group_by);
            }
            if let Some(having) = clauses.having {
                builder.having(having);
            }
        }
        Some(plan) => {
            // 只有 filter/compute 的变换序列不改变行的形状
            for filter in &plan.pre_filters {
                builder.and_where(filters.build(filter)?);
            }
            computed.extend(plan.columns.iter().cloned());
        }
        None => {}
    }

    if !options.apply.as_ref().is_some_and(|p| p.is_grouped()) {
        let projection = build_projection(
            metadata,
            &options.select,
            options.select_specified,
            &options.expand,
            &computed,
            dialect,
            None,
        )?;
        builder.select(projection.fragment);
    }

    if let Some(filter) = &options.filter {
        builder.and_where(filters.build(filter)?);
    }

    if let Some(tree) = &options.search_tree {
        match search_clause(tree, metadata, search, dialect)? {
            Some(clause) => builder.and_where(clause),
            None => debug!("$search 未下推到数据库，需要在内存中匹配"),
        }
    }

    if !options.order_by.is_empty() {
        builder.order_by(orderby_to_sql(&options.order_by, dialect)?);
    }
    if let Some(top) = options.top {
        builder.limit(top);
    }
    if let Some(skip) = options.skip {
        builder.offset(skip);
    }
    Ok(())
}

/// 由查询选项生成完整的 SELECT 语句
pub fn build_select(
    options: &QueryOptions,
    metadata: &EntityMetadata,
    dialect: SqlDialect,
    search: &SearchConfig,
) -> ODataResult<SelectStatement> {
    let mut statement = SelectStatement::for_entity(metadata, dialect);
    apply_query_options(&mut statement, options, metadata, search)?;
    debug!("生成语句: {}", statement);
    Ok(statement)
}
