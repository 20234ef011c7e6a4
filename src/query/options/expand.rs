//! `$expand` 解析
//!
//! 每一项是 `Nav`、`Nav/Nav2`、`*` 或带嵌套选项的 `Nav($select=..;$filter=..;...)`。
//! `$levels` 在解析阶段展开成嵌套的深拷贝，展开后每一层的 `levels` 都为空。

use std::fmt;

use super::compute::{parse_compute, ComputeItem};
use super::orderby::{parse_orderby, OrderByItem};
use super::select::parse_select;
use crate::core::error::{ODataError, ODataResult};
use crate::core::metadata::EntityMetadata;
use crate::query::parser::ast::Expr;
use crate::query::parser::parse_filter;
use crate::utils::split_top_level;

pub const DEFAULT_MAX_EXPAND_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandLevels {
    Count(usize),
    Max,
}

impl fmt::Display for ExpandLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpandLevels::Count(n) => write!(f, "{}", n),
            ExpandLevels::Max => f.write_str("max"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpandOption {
    pub navigation_property: String,
    pub select: Vec<String>,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub expand: Vec<ExpandOption>,
    pub compute: Vec<ComputeItem>,
    pub count: bool,
    pub levels: Option<ExpandLevels>,
}

impl ExpandOption {
    pub fn new(navigation_property: impl Into<String>) -> Self {
        Self {
            navigation_property: navigation_property.into(),
            ..Default::default()
        }
    }

    /// 是否只是简单预加载（没有任何嵌套选项）
    pub fn is_simple(&self) -> bool {
        self.select.is_empty()
            && self.filter.is_none()
            && self.order_by.is_empty()
            && self.top.is_none()
            && self.skip.is_none()
            && self.compute.is_empty()
            && !self.count
    }

    pub fn is_paginated(&self) -> bool {
        self.top.is_some() || self.skip.is_some()
    }

    /// 嵌套深度（自身算一层）
    pub fn depth(&self) -> usize {
        1 + self.expand.iter().map(ExpandOption::depth).max().unwrap_or(0)
    }

    pub fn find(&self, navigation: &str) -> Option<&ExpandOption> {
        self.expand
            .iter()
            .find(|e| e.navigation_property == navigation)
    }
}

fn parse_count(value: &str, option: &str) -> ODataResult<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        ODataError::invalid_option(format!("{} must be a non-negative integer, found '{}'", option, value))
    })
}

fn parse_bool(value: &str, option: &str) -> ODataResult<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ODataError::invalid_option(format!(
            "{} must be true or false, found '{}'",
            option, other
        ))),
    }
}

/// 一个展开项拆成导航路径与括号内的选项文本
fn split_item(item: &str) -> ODataResult<(&str, Option<&str>)> {
    match item.find('(') {
        Some(open) => {
            if !item.ends_with(')') {
                return Err(ODataError::invalid_option(format!(
                    "unbalanced $expand item '{}'",
                    item
                )));
            }
            Ok((item[..open].trim(), Some(&item[open + 1..item.len() - 1])))
        }
        None => Ok((item.trim(), None)),
    }
}

struct ExpandParser {
    max_depth: usize,
}

impl ExpandParser {
    fn parse_list(&self, input: &str, metadata: &EntityMetadata, depth: usize) -> ODataResult<Vec<ExpandOption>> {
        if depth > self.max_depth {
            return Err(ODataError::ExpandDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        let items = split_top_level(input, ',').map_err(|offset| {
            ODataError::invalid_option(format!("unbalanced $expand at offset {}", offset))
        })?;

        let mut result: Vec<ExpandOption> = Vec::new();
        for item in items {
            if item.is_empty() {
                return Err(ODataError::invalid_option("empty $expand item"));
            }
            let (path, options) = split_item(item)?;

            if path == "*" {
                for nav in metadata.navigation_properties() {
                    if !result.iter().any(|e| e.navigation_property == nav.name) {
                        result.push(ExpandOption::new(nav.name.clone()));
                    }
                }
                continue;
            }

            let option = self.parse_path(path, options, metadata, depth)?;
            if result
                .iter()
                .any(|e| e.navigation_property == option.navigation_property)
            {
                return Err(ODataError::invalid_option(format!(
                    "navigation '{}' is expanded twice",
                    option.navigation_property
                )));
            }
            result.push(option);
        }
        Ok(result)
    }

    /// `A/B(opts)` → A { expand: [B(opts)] }
    fn parse_path(
        &self,
        path: &str,
        options: Option<&str>,
        metadata: &EntityMetadata,
        depth: usize,
    ) -> ODataResult<ExpandOption> {
        let (head, tail) = match path.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (path, None),
        };
        let nav = metadata.find_navigation_property(head).ok_or_else(|| {
            if metadata.find_property(head).is_some() {
                ODataError::InvalidNavigation(format!("'{}' is not a navigation property", head))
            } else {
                ODataError::property_not_found(head, &metadata.entity_name)
            }
        })?;
        let target = metadata.resolve_navigation_target(head)?;
        let mut option = ExpandOption::new(nav.name.clone());

        match tail {
            Some(rest) => {
                if depth + 1 > self.max_depth {
                    return Err(ODataError::ExpandDepthExceeded {
                        depth: depth + 1,
                        max: self.max_depth,
                    });
                }
                option
                    .expand
                    .push(self.parse_path(rest, options, &target, depth + 1)?);
            }
            None => {
                if let Some(text) = options {
                    self.apply_options(&mut option, text, &target, depth)?;
                }
            }
        }

        if let Some(levels) = option.levels {
            let count = match levels {
                ExpandLevels::Max => self.max_depth.saturating_sub(depth - 1).max(1),
                ExpandLevels::Count(n) => n,
            };
            let total = count.saturating_add(depth - 1);
            if total > self.max_depth {
                return Err(ODataError::ExpandDepthExceeded {
                    depth: total,
                    max: self.max_depth,
                });
            }
            if count > 1 && target.find_navigation_property(&option.navigation_property).is_none() {
                return Err(ODataError::InvalidNavigation(format!(
                    "$levels on '{}' requires '{}' to have the same navigation",
                    option.navigation_property, target.entity_name
                )));
            }
            option = unroll_levels(option, count);
        }
        Ok(option)
    }

    fn apply_options(
        &self,
        option: &mut ExpandOption,
        text: &str,
        target: &EntityMetadata,
        depth: usize,
    ) -> ODataResult<()> {
        let parts = split_top_level(text, ';').map_err(|offset| {
            ODataError::invalid_option(format!("unbalanced expand options at offset {}", offset))
        })?;
        let mut seen: Vec<&str> = Vec::new();

        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                ODataError::invalid_option(format!("expected name=value in expand option '{}'", part))
            })?;
            let name = name.trim();
            if seen.contains(&name) {
                return Err(ODataError::invalid_option(format!(
                    "duplicate expand option '{}'",
                    name
                )));
            }
            seen.push(name);

            match name {
                "$select" => option.select = parse_select(value)?,
                "$filter" => option.filter = Some(parse_filter(value)?),
                "$orderby" => option.order_by = parse_orderby(value)?,
                "$top" => option.top = Some(parse_count(value, name)?),
                "$skip" => option.skip = Some(parse_count(value, name)?),
                "$count" => option.count = parse_bool(value, name)?,
                "$compute" => option.compute = parse_compute(value)?,
                "$expand" => option.expand = self.parse_list(value, target, depth + 1)?,
                "$levels" => {
                    option.levels = Some(match value.trim() {
                        "max" => ExpandLevels::Max,
                        n => {
                            let n = usize::try_from(parse_count(n, name)?).unwrap_or(usize::MAX);
                            if n == 0 {
                                return Err(ODataError::invalid_option("$levels must be at least 1"));
                            }
                            ExpandLevels::Count(n)
                        }
                    })
                }
                other => {
                    return Err(ODataError::invalid_option(format!(
                        "unsupported expand option '{}'",
                        other
                    )))
                }
            }
        }
        Ok(())
    }
}

/// `$levels=N` → N 层嵌套，每层都是独立的深拷贝
pub fn unroll_levels(mut option: ExpandOption, levels: usize) -> ExpandOption {
    option.levels = None;
    if levels > 1 {
        let child = unroll_levels(option.clone(), levels - 1);
        option
            .expand
            .retain(|e| e.navigation_property != child.navigation_property);
        option.expand.push(child);
    }
    option
}

/// 解析 `$expand`，校验导航属性并限制嵌套深度
pub fn parse_expand(
    input: &str,
    metadata: &EntityMetadata,
    max_depth: usize,
) -> ODataResult<Vec<ExpandOption>> {
    let parser = ExpandParser { max_depth };
    let options = parser.parse_list(input, metadata, 1)?;
    if let Some(depth) = options.iter().map(ExpandOption::depth).max() {
        if depth > max_depth {
            return Err(ODataError::ExpandDepthExceeded {
                depth,
                max: max_depth,
            });
        }
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;
    use crate::core::metadata::EntityRegistry;

    fn expand(set: &str, input: &str) -> ODataResult<Vec<ExpandOption>> {
        register_catalog();
        let meta = EntityRegistry::get(set).expect("实体集应已注册");
        parse_expand(input, &meta, DEFAULT_MAX_EXPAND_DEPTH)
    }

    #[test]
    fn test_inner_comma_does_not_split() {
        let items = expand("Categories", "Products($filter=contains(Name,'a,b');$top=2),Parent")
            .expect("解析应该成功");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].navigation_property, "Products");
        assert!(items[0].filter.is_some());
        assert_eq!(items[0].top, Some(2));
        assert_eq!(items[1].navigation_property, "Parent");
    }

    #[test]
    fn test_levels_unrolled() {
        let items = expand("Categories", "Children($levels=3;$select=Name)").expect("解析应该成功");
        let mut level = &items[0];
        let mut depth = 1;
        while let Some(child) = level.find("Children") {
            assert!(child.levels.is_none());
            level = child;
            depth += 1;
        }
        assert!(items[0].levels.is_none());
        assert_eq!(depth, 3);
        assert_eq!(level.select, vec!["Name".to_string()]);
    }

    #[test]
    fn test_levels_clones_are_independent() {
        let items = expand("Categories", "Children($levels=2)").expect("解析应该成功");
        let mut outer = items[0].clone();
        outer.expand[0].select.push("Name".to_string());
        assert!(items[0].expand[0].select.is_empty());
    }

    #[test]
    fn test_depth_limits() {
        let err = expand("Categories", "Children($levels=6)").expect_err("超过最大深度应报错");
        assert!(matches!(err, ODataError::ExpandDepthExceeded { .. }));
        let items = expand("Categories", "Children($levels=max)").expect("max 应被限制到最大深度");
        assert_eq!(items[0].depth(), DEFAULT_MAX_EXPAND_DEPTH);
    }

    #[test]
    fn test_huge_levels_is_depth_error() {
        let err = expand(
            "Categories",
            "Products($expand=Category($levels=18446744073709551615))",
        )
        .expect_err("超大层数应报深度错误");
        assert!(matches!(err, ODataError::ExpandDepthExceeded { .. }));
    }

    #[test]
    fn test_multi_segment_and_star() {
        let items = expand("Products", "Category/Parent($select=Name)").expect("解析应该成功");
        assert_eq!(items[0].navigation_property, "Category");
        assert_eq!(items[0].expand[0].navigation_property, "Parent");
        assert_eq!(items[0].expand[0].select, vec!["Name".to_string()]);

        let items = expand("Products", "*").expect("解析应该成功");
        let names: Vec<_> = items.iter().map(|e| e.navigation_property.as_str()).collect();
        assert_eq!(names, vec!["Category", "Reviews"]);
    }

    #[test]
    fn test_invalid_items() {
        assert!(matches!(
            expand("Products", "Supplier"),
            Err(ODataError::PropertyNotFound { .. })
        ));
        assert!(matches!(
            expand("Products", "Name"),
            Err(ODataError::InvalidNavigation(_))
        ));
        assert!(expand("Products", "Reviews($bogus=1)").is_err());
        assert!(expand("Products", "Reviews($top=1;$top=2)").is_err());
    }
}
