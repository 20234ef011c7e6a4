//! 解析缓存
//!
//! 单次查询内缓存 (实体, 路径) → 属性/导航路径 的解析结果。
//! 同一个属性在过滤、排序、投影中往往出现多次，元数据查找与导航目标解析只做一次。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::error::ODataResult;
use crate::core::metadata::{EntityMetadata, NavigationPath, PropertyMetadata};
use crate::utils::Reset;

/// 缓存命中统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    properties: RwLock<HashMap<String, PropertyMetadata>>,
    navigations: RwLock<HashMap<String, NavigationPath>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn cache_key(entity: &EntityMetadata, path: &str) -> String {
    format!("{}|{}", entity.entity_name, path)
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单段结构属性；不存在时返回 None（不缓存否定结果）
    pub fn resolve_property(&self, entity: &EntityMetadata, name: &str) -> Option<PropertyMetadata> {
        let key = cache_key(entity, name);
        if let Some(prop) = self.properties.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("属性解析缓存命中: {}", key);
            return Some(prop.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let prop = entity.resolve_property_path(name)?.clone();
        self.properties.write().insert(key, prop.clone());
        Some(prop)
    }

    /// 单值导航路径 `Nav/.../Prop`
    pub fn resolve_navigation(
        &self,
        entity: &EntityMetadata,
        path: &str,
    ) -> ODataResult<NavigationPath> {
        let key = cache_key(entity, path);
        if let Some(nav) = self.navigations.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("导航解析缓存命中: {}", key);
            return Ok(nav.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let nav = entity.resolve_single_entity_navigation_path(path)?;
        self.navigations.write().insert(key, nav.clone());
        Ok(nav)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.properties.read().len() + self.navigations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.properties.write().clear();
        self.navigations.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Reset for ResolutionCache {
    fn reset(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_fixtures::register_catalog;
    use crate::core::metadata::EntityRegistry;

    #[test]
    fn test_property_hits_and_misses() {
        register_catalog();
        let product = EntityRegistry::get("Products").expect("实体集应已注册");
        let cache = ResolutionCache::new();

        assert!(cache.resolve_property(&product, "Price").is_some());
        assert!(cache.resolve_property(&product, "Price").is_some());
        assert!(cache.resolve_property(&product, "Nope").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_navigation_cached_and_reset() {
        register_catalog();
        let product = EntityRegistry::get("Products").expect("实体集应已注册");
        let mut cache = ResolutionCache::new();

        let first = cache
            .resolve_navigation(&product, "Category/Name")
            .expect("导航应可解析");
        let second = cache
            .resolve_navigation(&product, "Category/Name")
            .expect("导航应可解析");
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits, 1);

        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
