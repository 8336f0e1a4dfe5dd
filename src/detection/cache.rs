//! Bounded LRU cache for detection results.
//!
//! Detection over identical text is deterministic, so re-analysis of repeated
//! page content (cover sheets, boilerplate) is wasted work. The cache is
//! keyed by the exact input string and shared across requests via `Arc`;
//! concurrent recomputation of the same key is tolerated, last write wins.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use super::types::Entity;

/// Default capacity, matching the eviction point of the original service.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

pub struct DetectionCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<String, Vec<Entity>>,
    // Recency order, oldest at the front.
    order: VecDeque<String>,
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl DetectionCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, text: &str) -> Option<Vec<Entity>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = inner.entries.get(text).cloned()?;
        touch(&mut inner.order, text);
        Some(hit)
    }

    pub fn insert(&self, text: &str, entities: Vec<Entity>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.entries.insert(text.to_string(), entities).is_none() {
            inner.order.push_back(text.to_string());
        } else {
            touch(&mut inner.order, text);
        }
        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn touch(order: &mut VecDeque<String>, text: &str) {
    if let Some(pos) = order.iter().position(|k| k == text) {
        if let Some(key) = order.remove(pos) {
            order.push_back(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(n: usize) -> Vec<Entity> {
        (0..n)
            .map(|i| Entity::new("SSN", "123-45-6789", i * 12, i * 12 + 11, 1.0))
            .collect()
    }

    #[test]
    fn miss_then_hit() {
        let cache = DetectionCache::default();
        assert!(cache.get("page one").is_none());
        cache.insert("page one", entities(2));
        assert_eq!(cache.get("page one").unwrap().len(), 2);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let cache = DetectionCache::with_capacity(2);
        cache.insert("a", entities(1));
        cache.insert("b", entities(1));
        cache.insert("c", entities(1));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none(), "oldest entry should be evicted");
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = DetectionCache::with_capacity(2);
        cache.insert("a", entities(1));
        cache.insert("b", entities(1));
        cache.get("a");
        cache.insert("c", entities(1));

        assert!(cache.get("a").is_some(), "recently read entry survives");
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn reinsert_updates_value_without_growth() {
        let cache = DetectionCache::with_capacity(5);
        cache.insert("a", entities(1));
        cache.insert("a", entities(3));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().len(), 3);
    }

    #[test]
    fn shared_across_threads() {
        use std::sync::Arc;

        let cache = Arc::new(DetectionCache::with_capacity(100));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let key = format!("page {}", i % 4);
                    cache.insert(&key, entities(1));
                    cache.get(&key);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 4);
    }
}
