//! Bounded cache from raw query string to query embedding.
//!
//! Keys are compared by raw string equality: "Foo" and "foo" are distinct
//! cache keys even though tool matching is case-insensitive. That
//! asymmetry is inherited behavior and kept on purpose.

use std::collections::{HashMap, VecDeque};

/// Insertion-order-evicting query cache.
///
/// When a `put` would exceed capacity, the oldest-inserted key is evicted.
/// This is not LRU: `get` never refreshes recency and never evicts, so a
/// hit is free and a hot key can still age out.
#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    map: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl QueryCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Look up a cached query embedding. A hit must never reach the encoder.
    #[must_use]
    pub fn get(&self, query: &str) -> Option<&[f32]> {
        self.map.get(query).map(Vec::as_slice)
    }

    /// Insert a query embedding, evicting the oldest-inserted entry first
    /// when at capacity. Re-inserting an existing key replaces its value
    /// without granting it a fresh queue slot.
    pub fn put(&mut self, query: String, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }

        if self.map.contains_key(&query) {
            self.map.insert(query, vector);
            return;
        }

        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }

        self.order.push_back(query.clone());
        self.map.insert(query, vector);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(value: f32) -> Vec<f32> {
        vec![value; 4]
    }

    #[test]
    fn get_hits_after_put() {
        let mut cache = QueryCache::new(4);
        cache.put("undo commit".to_string(), vec_of(1.0));

        assert_eq!(cache.get("undo commit"), Some(vec_of(1.0).as_slice()));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn evicts_oldest_inserted_beyond_capacity() {
        let mut cache = QueryCache::new(3);
        cache.put("a".to_string(), vec_of(1.0));
        cache.put("b".to_string(), vec_of(2.0));
        cache.put("c".to_string(), vec_of(3.0));
        cache.put("d".to_string(), vec_of(4.0));

        // First-inserted key is gone, the rest survive.
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn get_does_not_refresh_recency() {
        let mut cache = QueryCache::new(2);
        cache.put("a".to_string(), vec_of(1.0));
        cache.put("b".to_string(), vec_of(2.0));

        // Repeated reads of "a" must not save it from eviction.
        for _ in 0..10 {
            assert!(cache.get("a").is_some());
        }
        cache.put("c".to_string(), vec_of(3.0));

        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn reinserting_key_replaces_value_without_new_slot() {
        let mut cache = QueryCache::new(2);
        cache.put("a".to_string(), vec_of(1.0));
        cache.put("b".to_string(), vec_of(2.0));
        cache.put("a".to_string(), vec_of(9.0));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(vec_of(9.0).as_slice()));

        // "a" kept its original queue position, so it still evicts first.
        cache.put("c".to_string(), vec_of(3.0));
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn keys_are_case_sensitive() {
        let mut cache = QueryCache::new(4);
        cache.put("Foo".to_string(), vec_of(1.0));

        assert!(cache.get("Foo").is_some());
        assert_eq!(cache.get("foo"), None);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = QueryCache::new(0);
        cache.put("a".to_string(), vec_of(1.0));
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
