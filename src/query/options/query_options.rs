//! 查询选项总入口
//!
//! 选项按依赖顺序处理：`$compute` 与 `$apply` 先定义别名，随后是
//! `$filter`、`$select`、`$orderby`、`$expand`，最后是分页、计数、搜索等标量选项。

use std::collections::HashMap;

use log::debug;

use super::apply::{parse_apply, resolve_apply, ApplyPlan};
use super::compute::{parse_compute, resolve_compute};
use super::expand::{parse_expand, ExpandOption};
use super::select::{is_select_all, parse_select};
use super::orderby::parse_orderby;
use crate::auth::{authorize_query_options, AuthContext, Authorizer};
use crate::config::QueryConfig;
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::EntityMetadata;
use crate::query::arena::QueryArena;
use crate::query::parser::parse_filter;
use crate::query::resolver::{ConversionContext, FilterExpression, Operand};
use crate::query::sql::{plan_expand, resolve_orderby, SortKey};
use crate::search::{parse_search, SearchExprNode};

const KNOWN_OPTIONS: &[&str] = &[
    "$filter",
    "$select",
    "$orderby",
    "$top",
    "$skip",
    "$count",
    "$expand",
    "$search",
    "$compute",
    "$apply",
    "$deltatoken",
];

/// 解析并校验后的查询选项
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOptions {
    pub filter: Option<FilterExpression>,
    pub select: Vec<String>,
    /// 请求中出现了 `$select`（即使为空）
    pub select_specified: bool,
    pub order_by: Vec<SortKey>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: bool,
    pub expand: Vec<ExpandOption>,
    pub search: Option<String>,
    pub search_tree: Option<SearchExprNode>,
    /// `$compute` 列：别名 → 表达式
    pub compute: Vec<(String, Operand)>,
    pub apply: Option<ApplyPlan>,
    pub delta_token: Option<String>,
    /// `$compute` 与 `$apply` 定义的全部别名
    pub aliases: HashMap<String, Operand>,
}

impl QueryOptions {
    pub fn has_search(&self) -> bool {
        self.search_tree.is_some()
    }
}

/// 收集 `$` 选项；非 `$` 参数忽略，未知或重复的 `$` 选项报错
fn collect_options<'p>(params: &'p [(String, String)]) -> ODataResult<HashMap<String, &'p str>> {
    let mut options: HashMap<String, &str> = HashMap::new();
    for (key, value) in params {
        let key = key.trim();
        if !key.starts_with('$') {
            continue;
        }
        let name = key.to_ascii_lowercase();
        if !KNOWN_OPTIONS.contains(&name.as_str()) {
            return Err(ODataError::invalid_option(format!("unknown query option '{}'", key)));
        }
        if options.insert(name, value.as_str()).is_some() {
            return Err(ODataError::invalid_option(format!("duplicate query option '{}'", key)));
        }
    }
    Ok(options)
}

fn parse_non_negative(value: &str, option: &str) -> ODataResult<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        ODataError::invalid_option(format!(
            "{} must be a non-negative integer, found '{}'",
            option, value
        ))
    })
}

/// `$select` 中的每一项必须是属性、别名或 `Nav/Prop`
fn validate_select(
    select: &[String],
    metadata: &EntityMetadata,
    aliases: &HashMap<String, Operand>,
) -> ODataResult<()> {
    for item in select {
        if item == "*" || aliases.contains_key(item) {
            continue;
        }
        let mut segments = item.split('/');
        let head = segments.next().unwrap_or_default();
        let prop = metadata
            .find_property(head)
            .ok_or_else(|| ODataError::property_not_found(head, metadata.entity_name.clone()))?;
        if let Some(rest) = segments.next() {
            if !prop.is_navigation {
                return Err(ODataError::InvalidNavigation(format!(
                    "'{}' is not a navigation property of '{}'",
                    head, metadata.entity_name
                )));
            }
            let target = metadata.resolve_navigation_target(&prop.name)?;
            if target.find_property(rest).is_none() {
                return Err(ODataError::property_not_found(rest, target.entity_name.clone()));
            }
        }
    }
    Ok(())
}

/// 在给定 arena 中解析查询选项
pub fn parse_query_options_in(
    arena: &mut QueryArena,
    params: &[(String, String)],
    metadata: &EntityMetadata,
    config: &QueryConfig,
) -> ODataResult<QueryOptions> {
    let raw = collect_options(params)?;
    let mut options = QueryOptions::default();
    let mut aliases = arena.acquire_aliases();

    if let Some(input) = raw.get("$compute") {
        let items = parse_compute(input)?;
        options.compute = resolve_compute(&items, metadata, &mut aliases)?;
    }

    if let Some(input) = raw.get("$apply") {
        let steps = parse_apply(input)?;
        options.apply = Some(resolve_apply(
            &steps,
            metadata,
            &mut aliases,
            config.max_in_clause_size,
        )?);
    }

    if let Some(input) = raw.get("$filter") {
        if let Some(max) = config.max_filter_length {
            let length = input.chars().count();
            if length > max {
                return Err(ODataError::invalid_option(format!(
                    "$filter is {} characters long, maximum is {}",
                    length, max
                )));
            }
        }
        let expr = parse_filter(input)?;
        let mut ctx = ConversionContext::new(metadata)
            .with_aliases(aliases.clone())
            .with_max_in_clause_size(config.max_in_clause_size)
            .with_cache(arena.acquire_cache());
        let converted = ctx.convert(&expr);
        arena.release_cache(ctx.into_cache());
        let filter = converted?;
        filter.validate_in_clause_size(config.max_in_clause_size)?;
        options.filter = Some(filter);
    }

    if let Some(input) = raw.get("$select") {
        options.select = parse_select(input)?;
        options.select_specified = true;
        validate_select(&options.select, metadata, &aliases)?;
        if is_select_all(&options.select) {
            options.select = vec!["*".to_string()];
        }
    }

    if let Some(input) = raw.get("$orderby") {
        let items = parse_orderby(input)?;
        options.order_by = resolve_orderby(&items, metadata, &aliases)?;
    }

    if let Some(input) = raw.get("$expand") {
        options.expand = parse_expand(input, metadata, config.max_expand_depth)?;
        // 嵌套选项按目标实体解析一次，尽早暴露错误
        plan_expand(&options.expand, metadata, config.max_in_clause_size)?;
    }

    if let Some(input) = raw.get("$top") {
        let top = parse_non_negative(input, "$top")?;
        if let Some(max) = config.max_top {
            if top > max as u64 {
                return Err(ODataError::invalid_option(format!(
                    "$top {} exceeds the maximum of {}",
                    top, max
                )));
            }
        }
        options.top = Some(top);
    }

    if let Some(input) = raw.get("$skip") {
        options.skip = Some(parse_non_negative(input, "$skip")?);
    }

    if let Some(input) = raw.get("$count") {
        options.count = match input.trim() {
            "true" => true,
            "false" => false,
            other => {
                return Err(ODataError::invalid_option(format!(
                    "$count must be true or false, found '{}'",
                    other
                )))
            }
        };
    }

    if let Some(input) = raw.get("$search") {
        options.search = Some(input.to_string());
        options.search_tree = parse_search(input);
    }

    if let Some(input) = raw.get("$deltatoken") {
        options.delta_token = Some(input.to_string());
    }

    options.aliases = aliases.clone();
    arena.release_aliases(aliases);
    debug!(
        "解析 {} 的查询选项: filter={}, expand={}, orderby={}",
        metadata.entity_set_name,
        options.filter.is_some(),
        options.expand.len(),
        options.order_by.len()
    );
    Ok(options)
}

/// 解析查询选项（`(名称, 值)` 列表，值已完成 URL 解码）
///
/// 结果未经授权裁剪。需要按调用方身份隐藏属性时使用
/// [`parse_query_options_authorized`]，或在生成 SQL 前自行调用
/// [`crate::auth::authorize_query_options`]。
pub fn parse_query_options(
    params: &[(String, String)],
    metadata: &EntityMetadata,
    config: &QueryConfig,
) -> ODataResult<QueryOptions> {
    let mut arena = QueryArena::default();
    let result = parse_query_options_in(&mut arena, params, metadata, config);
    arena.reset();
    result
}

/// 解析查询选项并按授权策略裁剪 `$select` 与 `$expand`
///
/// 被拒绝的属性与导航直接去掉，不报错。
pub fn parse_query_options_authorized<A: Authorizer + ?Sized>(
    params: &[(String, String)],
    metadata: &EntityMetadata,
    config: &QueryConfig,
    authorizer: &A,
    ctx: &AuthContext,
) -> ODataResult<QueryOptions> {
    let mut options = parse_query_options(params, metadata, config)?;
    authorize_query_options(authorizer, ctx, metadata, &mut options);
    Ok(options)
}

/// 解析原始查询串 `a=1&b=2`（可带前导 `?`），按 `application/x-www-form-urlencoded` 解码
pub fn parse_query_string(
    query: &str,
    metadata: &EntityMetadata,
    config: &QueryConfig,
) -> ODataResult<QueryOptions> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    parse_query_options(&params, metadata, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;
    use crate::core::metadata::EntityRegistry;

    fn products() -> std::sync::Arc<EntityMetadata> {
        register_catalog();
        EntityRegistry::get("Products").expect("实体集应已注册")
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_full_option_set() {
        let meta = products();
        let options = parse_query_options(
            &params(&[
                ("$compute", "Price sub Cost as Margin"),
                ("$filter", "Margin gt 10 and Active eq true"),
                ("$select", "Name,Margin"),
                ("$orderby", "Margin desc"),
                ("$top", "10"),
                ("$skip", "20"),
                ("$count", "true"),
                ("$search", "laptop OR phone"),
                ("$deltatoken", "abc"),
                ("page", "3"),
            ]),
            &meta,
            &QueryConfig::default(),
        )
        .expect("查询选项应可解析");

        assert!(options.filter.is_some());
        assert_eq!(options.select, vec!["Name", "Margin"]);
        assert!(options.select_specified);
        assert_eq!(options.order_by.len(), 1);
        assert_eq!(options.top, Some(10));
        assert_eq!(options.skip, Some(20));
        assert!(options.count);
        assert!(options.has_search());
        assert_eq!(options.delta_token.as_deref(), Some("abc"));
        assert!(options.aliases.contains_key("Margin"));
    }

    #[test]
    fn test_unknown_and_duplicate_options() {
        let meta = products();
        let config = QueryConfig::default();
        assert!(matches!(
            parse_query_options(&params(&[("$foo", "1")]), &meta, &config),
            Err(ODataError::InvalidQueryOption(_))
        ));
        assert!(matches!(
            parse_query_options(&params(&[("$top", "1"), ("$TOP", "2")]), &meta, &config),
            Err(ODataError::InvalidQueryOption(_))
        ));
        assert!(parse_query_options(&params(&[("foo", "1"), ("foo", "2")]), &meta, &config).is_ok());
    }

    #[test]
    fn test_limits() {
        let meta = products();
        let config = QueryConfig {
            max_top: Some(50),
            max_filter_length: Some(10),
            ..QueryConfig::default()
        };
        assert!(parse_query_options(&params(&[("$top", "51")]), &meta, &config).is_err());
        assert!(parse_query_options(&params(&[("$top", "-1")]), &meta, &QueryConfig::default()).is_err());
        assert!(parse_query_options(&params(&[("$filter", "Name eq 'Laptop'")]), &meta, &config).is_err());
    }

    #[test]
    fn test_empty_select_keeps_keys_only() {
        let meta = products();
        let options = parse_query_options(&params(&[("$select", "")]), &meta, &QueryConfig::default())
            .expect("空选择合法");
        assert!(options.select_specified);
        assert!(options.select.is_empty());
    }

    #[test]
    fn test_select_validation() {
        let meta = products();
        let config = QueryConfig::default();
        assert!(parse_query_options(&params(&[("$select", "Category/Name")]), &meta, &config).is_ok());
        assert!(parse_query_options(&params(&[("$select", "Category/Nope")]), &meta, &config).is_err());
        assert!(parse_query_options(&params(&[("$select", "Name/Length")]), &meta, &config).is_err());
    }

    #[test]
    fn test_parse_query_string_decodes() {
        let meta = products();
        let options = parse_query_string(
            "?$filter=Name%20eq%20'O''Neil'&$top=5&$expand=Reviews($filter=Rating%20ge%204)",
            &meta,
            &QueryConfig::default(),
        )
        .expect("查询串应可解析");
        assert_eq!(options.top, Some(5));
        assert_eq!(options.expand.len(), 1);
        match options.filter {
            Some(FilterExpression::Comparison { right, .. }) => {
                assert_eq!(right, Operand::Literal(crate::core::Value::String("O'Neil".to_string())));
            }
            other => panic!("应为比较表达式: {:?}", other),
        }
    }
}
