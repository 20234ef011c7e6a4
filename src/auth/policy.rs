//! 授权策略
//!
//! 授权只做是/否判定：给定调用方上下文和资源描述，返回是否可读。
//! 资源路径形如 `Books/Title`，策略中的模式按段匹配，`*` 匹配任意一段，
//! 模式是路径的前缀时即命中（拒绝 `Books` 同时拒绝 `Books/Title`）。

use std::collections::{HashMap, HashSet};
use std::fmt;

/// 调用方上下文
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub user: Option<String>,
    pub roles: Vec<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user: Some(name.into()),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// 一次授权检查的资源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// 请求的根实体集
    pub entity_set_name: String,
    /// 路径末端属性所属的实体类型
    pub entity_type: String,
    /// 从根实体出发的属性路径，导航前缀在前
    pub property_path: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(
        entity_set_name: impl Into<String>,
        entity_type: impl Into<String>,
        property_path: Vec<String>,
    ) -> Self {
        Self {
            entity_set_name: entity_set_name.into(),
            entity_type: entity_type.into(),
            property_path,
        }
    }

    /// `Nav/Prop`
    pub fn path(&self) -> String {
        self.property_path.join("/")
    }

    /// `EntitySet/Nav/Prop`
    pub fn full_path(&self) -> String {
        if self.property_path.is_empty() {
            self.entity_set_name.clone()
        } else {
            format!("{}/{}", self.entity_set_name, self.path())
        }
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.property_path.iter().map(String::as_str)
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_path(), self.entity_type)
    }
}

/// 授权判定
pub trait Authorizer {
    fn authorize(&self, ctx: &AuthContext, resource: &ResourceDescriptor) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&AuthContext, &ResourceDescriptor) -> bool,
{
    fn authorize(&self, ctx: &AuthContext, resource: &ResourceDescriptor) -> bool {
        self(ctx, resource)
    }
}

/// 全部放行
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _ctx: &AuthContext, _resource: &ResourceDescriptor) -> bool {
        true
    }
}

/// 模式逐段匹配路径前缀
fn pattern_matches<'a>(pattern: &str, path: impl Iterator<Item = &'a str>) -> bool {
    let mut path = path;
    for expected in pattern.split('/').filter(|s| !s.is_empty()) {
        match path.next() {
            Some(segment) if expected == "*" || expected == segment => {}
            _ => return false,
        }
    }
    true
}

/// 模式既可以写成属性路径，也可以带实体集前缀
fn resource_matches(pattern: &str, resource: &ResourceDescriptor) -> bool {
    if pattern_matches(pattern, resource.segments()) && !resource.property_path.is_empty() {
        return true;
    }
    pattern_matches(
        pattern,
        std::iter::once(resource.entity_set_name.as_str()).chain(resource.segments()),
    )
}

/// 拒绝列表：命中任一模式即拒绝
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyList {
    patterns: HashSet<String>,
}

impl DenyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.insert(pattern.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_denied(&self, resource: &ResourceDescriptor) -> bool {
        self.patterns.iter().any(|p| resource_matches(p, resource))
    }
}

impl<S: Into<String>> FromIterator<S> for DenyList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for DenyList {
    fn authorize(&self, _ctx: &AuthContext, resource: &ResourceDescriptor) -> bool {
        !self.is_denied(resource)
    }
}

/// 基于角色的策略
///
/// 每个角色持有允许模式与拒绝模式；拒绝优先。
/// 超级角色放行一切，没有任何允许模式命中时按 `default_allow` 处理。
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    grants: HashMap<String, Vec<String>>,
    denials: HashMap<String, DenyList>,
    superusers: HashSet<String>,
    default_allow: bool,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_by_default(mut self) -> Self {
        self.default_allow = true;
        self
    }

    pub fn superuser(mut self, role: impl Into<String>) -> Self {
        self.superusers.insert(role.into());
        self
    }

    pub fn grant(mut self, role: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.grants.entry(role.into()).or_default().push(pattern.into());
        self
    }

    pub fn deny(mut self, role: impl Into<String>, pattern: impl Into<String>) -> Self {
        let entry = self.denials.entry(role.into()).or_default();
        *entry = std::mem::take(entry).deny(pattern);
        self
    }
}

impl Authorizer for RolePolicy {
    fn authorize(&self, ctx: &AuthContext, resource: &ResourceDescriptor) -> bool {
        if ctx.roles.iter().any(|r| self.superusers.contains(r)) {
            return true;
        }
        let denied = ctx
            .roles
            .iter()
            .filter_map(|r| self.denials.get(r))
            .any(|list| list.is_denied(resource));
        if denied {
            return false;
        }
        let granted = ctx
            .roles
            .iter()
            .filter_map(|r| self.grants.get(r))
            .flatten()
            .any(|p| resource_matches(p, resource));
        granted || self.default_allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title() -> ResourceDescriptor {
        ResourceDescriptor::new("Authors", "Book", vec!["Books".into(), "Title".into()])
    }

    #[test]
    fn test_descriptor_paths() {
        let r = title();
        assert_eq!(r.path(), "Books/Title");
        assert_eq!(r.full_path(), "Authors/Books/Title");
    }

    #[test]
    fn test_deny_list_prefix_and_wildcard() {
        let ctx = AuthContext::anonymous();
        assert!(!DenyList::new().deny("Books/Title").authorize(&ctx, &title()));
        assert!(!DenyList::new().deny("Books").authorize(&ctx, &title()));
        assert!(!DenyList::new().deny("Authors/*/Title").authorize(&ctx, &title()));
        assert!(DenyList::new().deny("Books/Price").authorize(&ctx, &title()));
        assert!(DenyList::new().authorize(&ctx, &title()));
    }

    #[test]
    fn test_closure_authorizer() {
        let deny_titles = |_: &AuthContext, r: &ResourceDescriptor| {
            r.property_path.last().map(String::as_str) != Some("Title")
        };
        assert!(!deny_titles.authorize(&AuthContext::anonymous(), &title()));
    }

    #[test]
    fn test_role_policy() {
        let policy = RolePolicy::new()
            .superuser("admin")
            .grant("reader", "Books")
            .deny("reader", "Books/Title");

        let admin = AuthContext::user("root").with_role("admin");
        let reader = AuthContext::user("alice").with_role("reader");
        let guest = AuthContext::anonymous();

        assert!(policy.authorize(&admin, &title()));
        assert!(!policy.authorize(&reader, &title()));
        let name = ResourceDescriptor::new("Authors", "Book", vec!["Books".into(), "Name".into()]);
        assert!(policy.authorize(&reader, &name));
        assert!(!policy.authorize(&guest, &name));
        assert!(RolePolicy::new().allow_by_default().authorize(&guest, &name));
    }
}
