//! 请求级对象 arena
//!
//! 一个请求内反复使用的临时对象（解析缓存、别名表、字符串列表）从这里取出，
//! 用完归还；请求结束时 `reset` 清空全部池。arena 不跨线程共享。

use std::collections::HashMap;

use log::debug;

use crate::query::resolver::{CacheStats, Operand, ResolutionCache};
use crate::utils::ObjectPool;

const DEFAULT_POOL_SIZE: usize = 16;

/// arena 使用统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub acquired: usize,
    pub reused: usize,
    /// 已归还缓存中累计的命中/未命中次数
    pub cache: CacheStats,
}

#[derive(Debug)]
pub struct QueryArena {
    caches: ObjectPool<ResolutionCache>,
    alias_maps: ObjectPool<HashMap<String, Operand>>,
    string_lists: ObjectPool<Vec<String>>,
    cache_stats: CacheStats,
}

impl Default for QueryArena {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl QueryArena {
    pub fn new(pool_size: usize) -> Self {
        Self {
            caches: ObjectPool::new(pool_size),
            alias_maps: ObjectPool::new(pool_size),
            string_lists: ObjectPool::new(pool_size),
            cache_stats: CacheStats::default(),
        }
    }

    pub fn acquire_cache(&mut self) -> ResolutionCache {
        self.caches.acquire()
    }

    pub fn release_cache(&mut self, cache: ResolutionCache) {
        let stats = cache.stats();
        self.cache_stats.hits += stats.hits;
        self.cache_stats.misses += stats.misses;
        self.caches.release(cache);
    }

    pub fn acquire_aliases(&mut self) -> HashMap<String, Operand> {
        self.alias_maps.acquire()
    }

    pub fn release_aliases(&mut self, aliases: HashMap<String, Operand>) {
        self.alias_maps.release(aliases);
    }

    pub fn acquire_strings(&mut self) -> Vec<String> {
        self.string_lists.acquire()
    }

    pub fn release_strings(&mut self, list: Vec<String>) {
        self.string_lists.release(list);
    }

    pub fn stats(&self) -> ArenaStats {
        let (a1, r1) = self.caches.stats();
        let (a2, r2) = self.alias_maps.stats();
        let (a3, r3) = self.string_lists.stats();
        ArenaStats {
            acquired: a1 + a2 + a3,
            reused: r1 + r2 + r3,
            cache: self.cache_stats,
        }
    }

    /// 请求结束：清空全部池与统计
    pub fn reset(&mut self) {
        let stats = self.stats();
        debug!(
            "重置查询 arena: 取出 {} 次, 复用 {} 次, 缓存命中率 {:.2}",
            stats.acquired,
            stats.reused,
            stats.cache.hit_rate()
        );
        self.caches.clear();
        self.alias_maps.clear();
        self.string_lists.clear();
        self.cache_stats = CacheStats::default();
    }
}
