//! 按授权结果裁剪 `$select` 与 `$expand`
//!
//! 被拒绝的属性和导航直接从结果中去掉，不报错。计算列别名不受授权约束。

use std::collections::HashMap;

use log::{debug, warn};

use super::policy::{AuthContext, Authorizer, ResourceDescriptor};
use crate::core::metadata::EntityMetadata;
use crate::query::options::{is_select_all, ExpandOption, QueryOptions};
use crate::query::resolver::Operand;

/// 裁剪时的当前位置：根实体集、当前实体、导航前缀
struct Scope<'a> {
    entity_set: &'a str,
    metadata: &'a EntityMetadata,
    prefix: Vec<String>,
}

impl<'a> Scope<'a> {
    fn descriptor(&self, entity_type: &str, tail: &[&str]) -> ResourceDescriptor {
        let mut path = self.prefix.clone();
        path.extend(tail.iter().map(|s| s.to_string()));
        ResourceDescriptor::new(self.entity_set, entity_type, path)
    }
}

fn allowed<A: Authorizer + ?Sized>(
    authorizer: &A,
    ctx: &AuthContext,
    resource: &ResourceDescriptor,
) -> bool {
    let ok = authorizer.authorize(ctx, resource);
    if !ok {
        debug!("裁剪未授权的资源 {}", resource);
    }
    ok
}

fn prune_select<A: Authorizer + ?Sized>(
    authorizer: &A,
    ctx: &AuthContext,
    scope: &Scope<'_>,
    select: &[String],
    computed: &dyn Fn(&str) -> bool,
) -> Vec<String> {
    let mut kept = Vec::with_capacity(select.len());
    for item in select {
        if item == "*" {
            let mut total = 0;
            let mut permitted = Vec::new();
            for prop in scope.metadata.structural_properties() {
                total += 1;
                let resource = scope.descriptor(&scope.metadata.entity_name, &[prop.name.as_str()]);
                if allowed(authorizer, ctx, &resource) {
                    permitted.push(prop.name.clone());
                }
            }
            if permitted.len() == total {
                kept.push(item.clone());
            } else {
                kept.extend(permitted);
            }
            continue;
        }
        if computed(item) {
            kept.push(item.clone());
            continue;
        }

        let segments: Vec<&str> = item.split('/').collect();
        let entity_type = match segments.as_slice() {
            [nav, _] => scope
                .metadata
                .resolve_navigation_target(nav)
                .map(|t| t.entity_name.clone())
                .unwrap_or_else(|_| scope.metadata.entity_name.clone()),
            _ => scope.metadata.entity_name.clone(),
        };
        if allowed(authorizer, ctx, &scope.descriptor(&entity_type, &segments)) {
            kept.push(item.clone());
        }
    }

    // 去重：`*` 展开后可能与显式项重复
    let mut unique: Vec<String> = Vec::with_capacity(kept.len());
    for item in kept {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

fn prune_expand<A: Authorizer + ?Sized>(
    authorizer: &A,
    ctx: &AuthContext,
    scope: &Scope<'_>,
    expand: &[ExpandOption],
) -> Vec<ExpandOption> {
    let mut kept = Vec::with_capacity(expand.len());
    for option in expand {
        let target = match scope
            .metadata
            .resolve_navigation_target(&option.navigation_property)
        {
            Ok(target) => target,
            Err(e) => {
                warn!(
                    "跳过无法解析的展开 {}: {}",
                    option.navigation_property, e
                );
                continue;
            }
        };
        let resource = scope.descriptor(&target.entity_name, &[option.navigation_property.as_str()]);
        if !allowed(authorizer, ctx, &resource) {
            continue;
        }

        let nested = Scope {
            entity_set: scope.entity_set,
            metadata: &target,
            prefix: resource.property_path.clone(),
        };
        let mut pruned = option.clone();
        let is_computed = |name: &str| option.compute.iter().any(|c| c.alias == name);
        // 未指定 $select 等同于 `*`
        let requested = if option.select.is_empty() {
            vec!["*".to_string()]
        } else {
            option.select.clone()
        };
        let select = prune_select(authorizer, ctx, &nested, &requested, &is_computed);
        pruned.select = if select.is_empty() {
            // 全部被拒绝时只保留主键，避免退化成选择全部列
            target
                .key_properties()
                .iter()
                .map(|p| p.name.clone())
                .collect()
        } else if option.select.is_empty() && is_select_all(&select) {
            Vec::new()
        } else {
            select
        };
        pruned.expand = prune_expand(authorizer, ctx, &nested, &option.expand);
        kept.push(pruned);
    }
    kept
}

/// 裁剪顶层选择列表；`aliases` 中的计算列别名原样保留
pub fn filter_selected_properties<A: Authorizer + ?Sized>(
    authorizer: &A,
    ctx: &AuthContext,
    metadata: &EntityMetadata,
    select: &[String],
    aliases: &HashMap<String, Operand>,
) -> Vec<String> {
    let scope = Scope {
        entity_set: &metadata.entity_set_name,
        metadata,
        prefix: Vec::new(),
    };
    prune_select(authorizer, ctx, &scope, select, &|name: &str| aliases.contains_key(name))
}

/// 递归裁剪展开树：被拒绝的导航连同其嵌套选项一起移除
pub fn filter_expand_options<A: Authorizer + ?Sized>(
    authorizer: &A,
    ctx: &AuthContext,
    metadata: &EntityMetadata,
    expand: &[ExpandOption],
) -> Vec<ExpandOption> {
    let scope = Scope {
        entity_set: &metadata.entity_set_name,
        metadata,
        prefix: Vec::new(),
    };
    prune_expand(authorizer, ctx, &scope, expand)
}

/// 对整组查询选项做授权裁剪
///
/// 未指定 `$select` 且存在被拒绝的属性时，改为显式选择允许的属性。
pub fn authorize_query_options<A: Authorizer + ?Sized>(
    authorizer: &A,
    ctx: &AuthContext,
    metadata: &EntityMetadata,
    options: &mut QueryOptions,
) {
    let requested = if options.select_specified {
        options.select.clone()
    } else {
        vec!["*".to_string()]
    };
    let select =
        filter_selected_properties(authorizer, ctx, metadata, &requested, &options.aliases);
    if options.select_specified || !is_select_all(&select) {
        options.select = select;
        options.select_specified = true;
    }
    options.expand = filter_expand_options(authorizer, ctx, metadata, &options.expand);
}
