//! 对象池模块
//!
//! 请求级 arena 使用的轻量对象池：对象归还时先被重置，下次取出时保留已分配的容量。
//! 池本身不是线程共享的，每个请求持有自己的一组池。

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// 归还到池中之前的清理动作
pub trait Reset {
    fn reset(&mut self);
}

impl<T> Reset for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Reset for String {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K: Eq + Hash, V> Reset for HashMap<K, V> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K: Eq + Hash> Reset for HashSet<K> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// 统一的轻量级对象池
///
/// 要求对象实现 Default 与 Reset，使用 VecDeque 实现高效的 push/pop
#[derive(Debug, Clone)]
pub struct ObjectPool<T: Default + Reset> {
    pool: VecDeque<T>,
    max_size: usize,
    acquired: usize,
    reused: usize,
}

impl<T: Default + Reset> ObjectPool<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            pool: VecDeque::new(),
            max_size,
            acquired: 0,
            reused: 0,
        }
    }

    pub fn with_capacity(capacity: usize, max_size: usize) -> Self {
        Self {
            pool: VecDeque::with_capacity(capacity),
            max_size,
            acquired: 0,
            reused: 0,
        }
    }

    pub fn acquire(&mut self) -> T {
        self.acquired += 1;
        match self.pool.pop_front() {
            Some(obj) => {
                self.reused += 1;
                obj
            }
            None => T::default(),
        }
    }

    pub fn release(&mut self, mut obj: T) {
        if self.pool.len() < self.max_size {
            obj.reset();
            self.pool.push_back(obj);
        }
    }

    pub fn size(&self) -> usize {
        self.pool.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// (取出次数, 其中复用的次数)
    pub fn stats(&self) -> (usize, usize) {
        (self.acquired, self.reused)
    }

    pub fn clear(&mut self) {
        self.pool.clear();
        self.acquired = 0;
        self.reused = 0;
    }
}

impl<T: Default + Reset> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new(64)
    }
}
