//! 实体元数据注册表
//!
//! 进程级注册表，按实体集名与实体名两种方式索引。启动时写入，之后只读；
//! 导航目标的解析依赖它，因此必须在解析任何带导航的查询之前完成注册。

use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::entity::{EntityMetadata, PropertyMetadata};
use crate::core::error::{ODataError, ODataResult};

#[derive(Default)]
struct Registry {
    by_set: HashMap<String, Arc<EntityMetadata>>,
    /// 实体名 → 实体集名
    by_name: HashMap<String, String>,
}

static ENTITY_REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

fn get_registry() -> &'static RwLock<Registry> {
    ENTITY_REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

pub struct EntityRegistry;

impl EntityRegistry {
    /// 注册（或替换）一个实体，返回规范化后的共享元数据
    pub fn register(mut metadata: EntityMetadata) -> Arc<EntityMetadata> {
        metadata.normalize();
        let metadata = Arc::new(metadata);
        let mut writer = get_registry().write();
        writer
            .by_name
            .insert(metadata.entity_name.clone(), metadata.entity_set_name.clone());
        if let Some(ns) = &metadata.namespace {
            writer.by_name.insert(
                format!("{}.{}", ns, metadata.entity_name),
                metadata.entity_set_name.clone(),
            );
        }
        writer
            .by_set
            .insert(metadata.entity_set_name.clone(), Arc::clone(&metadata));
        log::debug!(
            "注册实体 {} (实体集 {}, 表 {})",
            metadata.entity_name,
            metadata.entity_set_name,
            metadata.table_name
        );
        metadata
    }

    /// 按实体集名、实体名或限定名查找
    pub fn get(name: &str) -> Option<Arc<EntityMetadata>> {
        let reader = get_registry().read();
        if let Some(meta) = reader.by_set.get(name) {
            return Some(Arc::clone(meta));
        }
        reader
            .by_name
            .get(name)
            .and_then(|set| reader.by_set.get(set))
            .cloned()
    }

    pub fn is_registered(name: &str) -> bool {
        Self::get(name).is_some()
    }

    pub fn unregister(entity_set_name: &str) {
        let mut writer = get_registry().write();
        if let Some(meta) = writer.by_set.remove(entity_set_name) {
            writer.by_name.retain(|_, set| set != &meta.entity_set_name);
        }
    }

    pub fn entity_sets() -> Vec<String> {
        let reader = get_registry().read();
        let mut names: Vec<String> = reader.by_set.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count() -> usize {
        get_registry().read().by_set.len()
    }

    pub fn clear() {
        let mut writer = get_registry().write();
        writer.by_set.clear();
        writer.by_name.clear();
    }

    /// 从 TOML 模式文本注册全部实体（`[[entities]]` 数组）
    pub fn register_toml(content: &str) -> ODataResult<Vec<Arc<EntityMetadata>>> {
        let schema: SchemaFile = toml::from_str(content)
            .map_err(|e| ODataError::Config(format!("invalid schema: {}", e)))?;
        Ok(schema.entities.into_iter().map(Self::register).collect())
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    entities: Vec<EntityMetadata>,
}

/// 一对连接列：源表列 = 目标表列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPair {
    pub source_column: String,
    pub target_column: String,
}

/// 导航路径中的一跳
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationHop {
    pub property: PropertyMetadata,
    pub source_table: String,
    pub target: Arc<EntityMetadata>,
    pub joins: Vec<JoinPair>,
}

impl NavigationHop {
    pub fn is_collection(&self) -> bool {
        self.property.navigation_is_array
    }
}

/// 单值导航路径 `Nav/.../Prop`
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationPath {
    pub hops: Vec<NavigationHop>,
    pub leaf: PropertyMetadata,
}

impl NavigationPath {
    /// 叶子属性所在的实体
    pub fn leaf_entity(&self) -> Option<&Arc<EntityMetadata>> {
        self.hops.last().map(|hop| &hop.target)
    }
}

impl EntityMetadata {
    /// 导航属性的目标实体，未注册时报错
    pub fn resolve_navigation_target(&self, nav_name: &str) -> ODataResult<Arc<EntityMetadata>> {
        let nav = self.find_navigation_property(nav_name).ok_or_else(|| {
            ODataError::InvalidNavigation(format!(
                "'{}' is not a navigation property of '{}'",
                nav_name, self.entity_name
            ))
        })?;
        let target = nav.navigation_target.as_deref().ok_or_else(|| {
            ODataError::InvalidNavigation(format!(
                "navigation property '{}' has no target",
                nav_name
            ))
        })?;
        EntityRegistry::get(target)
            .ok_or_else(|| ODataError::NavigationTargetNotRegistered(target.to_string()))
    }

    /// 导航两端的连接列
    ///
    /// 单值导航：本实体是依赖方，约束的键是本实体属性；
    /// 集合导航：目标实体是依赖方，约束的键是目标实体属性。
    pub fn join_columns(
        &self,
        nav: &PropertyMetadata,
        target: &EntityMetadata,
    ) -> ODataResult<Vec<JoinPair>> {
        let missing = |owner: &EntityMetadata, name: &str| {
            ODataError::InvalidNavigation(format!(
                "referential constraint of '{}' names unknown property '{}' on '{}'",
                nav.name, name, owner.entity_name
            ))
        };

        if !nav.referential_constraints.is_empty() {
            let mut pairs = Vec::with_capacity(nav.referential_constraints.len());
            for (dependent, principal) in &nav.referential_constraints {
                let pair = if nav.navigation_is_array {
                    JoinPair {
                        source_column: self
                            .column_of(principal)
                            .ok_or_else(|| missing(self, principal))?
                            .to_string(),
                        target_column: target
                            .column_of(dependent)
                            .ok_or_else(|| missing(target, dependent))?
                            .to_string(),
                    }
                } else {
                    JoinPair {
                        source_column: self
                            .column_of(dependent)
                            .ok_or_else(|| missing(self, dependent))?
                            .to_string(),
                        target_column: target
                            .column_of(principal)
                            .ok_or_else(|| missing(target, principal))?
                            .to_string(),
                    }
                };
                pairs.push(pair);
            }
            return Ok(pairs);
        }

        // 没有引用约束：外键列 + 主体方的单列主键
        let (principal, dependent) = if nav.navigation_is_array {
            (self, target)
        } else {
            (target, self)
        };
        let keys = principal.key_properties();
        if keys.len() != 1 {
            return Err(ODataError::InvalidNavigation(format!(
                "navigation '{}' needs referential constraints: '{}' has {} key properties",
                nav.name,
                principal.entity_name,
                keys.len()
            )));
        }
        let key_column = keys[0].column_name.clone();

        let fk_column = match &nav.foreign_key_column {
            Some(fk) => fk.clone(),
            None => {
                let conventional = format!("{}{}", principal.entity_name, keys[0].name);
                dependent
                    .column_of(&conventional)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ODataError::InvalidNavigation(format!(
                            "cannot determine the foreign key of navigation '{}'",
                            nav.name
                        ))
                    })?
            }
        };

        let pair = if nav.navigation_is_array {
            JoinPair {
                source_column: key_column,
                target_column: fk_column,
            }
        } else {
            JoinPair {
                source_column: fk_column,
                target_column: key_column,
            }
        };
        Ok(vec![pair])
    }

    /// 解析导航链，返回每一跳（包括最后一个导航段）
    pub fn resolve_navigation_chain(&self, segments: &[&str]) -> ODataResult<Vec<NavigationHop>> {
        let mut hops = Vec::with_capacity(segments.len());
        let mut current: Option<Arc<EntityMetadata>> = None;

        for segment in segments {
            let source: &EntityMetadata = current.as_deref().unwrap_or(self);
            let nav = source.find_navigation_property(segment).ok_or_else(|| {
                ODataError::property_not_found(segment.to_string(), source.entity_name.clone())
            })?;
            let target = source.resolve_navigation_target(segment)?;
            let joins = source.join_columns(nav, &target)?;
            hops.push(NavigationHop {
                property: nav.clone(),
                source_table: source.table_name.clone(),
                target: Arc::clone(&target),
                joins,
            });
            current = Some(target);
        }
        Ok(hops)
    }

    /// 解析 `Nav/Prop`、`Nav/Nav2/Prop`：除最后一段外都必须是单值导航
    pub fn resolve_single_entity_navigation_path(&self, path: &str) -> ODataResult<NavigationPath> {
        let segments: Vec<&str> = path.split('/').collect();
        let Some((leaf_name, navs)) = segments.split_last() else {
            return Err(ODataError::InvalidNavigation(path.to_string()));
        };
        if navs.is_empty() {
            return Err(ODataError::InvalidNavigation(format!(
                "'{}' is not a navigation path",
                path
            )));
        }

        let hops = self.resolve_navigation_chain(navs)?;
        if let Some(hop) = hops.iter().find(|hop| hop.is_collection()) {
            return Err(ODataError::InvalidNavigation(format!(
                "'{}' is a collection; use any/all or $count on '{}'",
                hop.property.name, path
            )));
        }

        let leaf_entity = match hops.last() {
            Some(hop) => &hop.target,
            None => return Err(ODataError::InvalidNavigation(path.to_string())),
        };
        let leaf = leaf_entity
            .resolve_property_path(leaf_name)
            .cloned()
            .ok_or_else(|| {
                ODataError::property_not_found(leaf_name.to_string(), leaf_entity.entity_name.clone())
            })?;

        Ok(NavigationPath { hops, leaf })
    }

    pub fn is_single_entity_navigation_path(&self, path: &str) -> bool {
        path.contains('/') && self.resolve_single_entity_navigation_path(path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;

    #[test]
    fn test_register_and_lookup() {
        register_catalog();
        let by_set = EntityRegistry::get("Products").expect("实体集应已注册");
        let by_name = EntityRegistry::get("Product").expect("实体名应可查");
        assert!(Arc::ptr_eq(&by_set, &by_name));
        assert!(EntityRegistry::get("Nope").is_none());
    }

    #[test]
    fn test_register_toml_normalizes_names() {
        let registered = EntityRegistry::register_toml(
            r#"
            [[entities]]
            entity_name = "Warehouse"
            entity_set_name = "Warehouses"

            [[entities.properties]]
            name = "ID"
            type = "Int64"
            is_key = true

            [[entities.properties]]
            name = "PostalCode"
            type = "String"
            "#,
        )
        .expect("模式应可解析");
        assert_eq!(registered.len(), 1);
        let meta = EntityRegistry::get("Warehouse").expect("实体名应可查");
        assert_eq!(meta.table_name, "warehouses");
        assert_eq!(meta.column_of("PostalCode"), Some("postal_code"));
        assert!(EntityRegistry::register_toml("entities = 3").is_err());
    }

    #[test]
    fn test_single_navigation_join() {
        register_catalog();
        let product = EntityRegistry::get("Products").expect("实体集应已注册");
        let path = product
            .resolve_single_entity_navigation_path("Category/Name")
            .expect("单值导航路径应可解析");
        assert_eq!(path.leaf.column_name, "name");
        assert_eq!(
            path.hops[0].joins,
            vec![JoinPair {
                source_column: "category_id".to_string(),
                target_column: "id".to_string()
            }]
        );
        assert!(product.is_single_entity_navigation_path("Category/Name"));
        assert!(!product.is_single_entity_navigation_path("Name"));
    }

    #[test]
    fn test_collection_navigation_join() {
        register_catalog();
        let category = EntityRegistry::get("Categories").expect("实体集应已注册");
        let hops = category
            .resolve_navigation_chain(&["Products"])
            .expect("集合导航应可解析");
        assert!(hops[0].is_collection());
        assert_eq!(hops[0].joins[0].source_column, "id");
        assert_eq!(hops[0].joins[0].target_column, "category_id");

        let err = category
            .resolve_single_entity_navigation_path("Products/Name")
            .expect_err("集合导航不能作为单值路径");
        assert!(matches!(err, ODataError::InvalidNavigation(_)));
    }

    #[test]
    fn test_composite_constraint_join() {
        register_catalog();
        let line = EntityRegistry::get("OrderLines").expect("实体集应已注册");
        let hops = line
            .resolve_navigation_chain(&["Shipment"])
            .expect("复合外键导航应可解析");
        assert_eq!(hops[0].joins.len(), 2);
    }

    #[test]
    fn test_unknown_navigation_segment() {
        register_catalog();
        let product = EntityRegistry::get("Products").expect("实体集应已注册");
        let err = product
            .resolve_single_entity_navigation_path("Supplier/Name")
            .expect_err("未知导航应报错");
        assert!(matches!(err, ODataError::PropertyNotFound { .. }));
    }
}
