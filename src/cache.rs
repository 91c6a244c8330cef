use crate::error::WeftError;
use crate::filter::Filter;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct CacheState {
    filters: HashMap<String, Arc<Filter>>,
    // Most recently used at the back.
    order: VecDeque<String>,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(key) = self.order.remove(pos) {
                self.order.push_back(key);
            }
        }
    }
}

/// Built filters keyed by configuration name, bounded by capacity with
/// least-recently-used eviction. Owned by whoever creates it.
#[derive(Debug)]
pub struct FilterCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl FilterCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.filters.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Arc<Filter>> {
        let mut state = self.state.lock().ok()?;
        let filter = state.filters.get(key).cloned()?;
        state.touch(key);
        Some(filter)
    }

    /// Returns the cached filter for `key`, building and caching it first if
    /// needed. The lock is not held while `build` runs.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> Result<Arc<Filter>, WeftError>
    where
        F: FnOnce() -> Result<Filter, WeftError>,
    {
        if let Some(filter) = self.get(key) {
            return Ok(filter);
        }
        let filter = Arc::new(build()?);
        self.insert(key, filter.clone());
        Ok(filter)
    }

    pub fn insert(&self, key: &str, filter: Arc<Filter>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.filters.insert(key.to_string(), filter).is_some() {
            state.touch(key);
            return;
        }
        state.order.push_back(key.to_string());
        while state.order.len() > self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                log::debug!("Evicting filter '{}' from cache", evicted);
                state.filters.remove(&evicted);
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.filters.clear();
            state.order.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterBuilder;

    fn filter() -> Result<Filter, WeftError> {
        FilterBuilder::new().build()
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = FilterCache::new(2);
        cache.get_or_build("a", filter).unwrap();
        cache.get_or_build("b", filter).unwrap();
        assert!(cache.get("a").is_some());
        cache.get_or_build("c", filter).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn builds_once_per_key() {
        let cache = FilterCache::new(4);
        let first = cache.get_or_build("a", filter).unwrap();
        let second = cache
            .get_or_build("a", || panic!("should have been cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn build_errors_are_not_cached() {
        let cache = FilterCache::new(1);
        let result = cache.get_or_build("bad", || {
            FilterBuilder::new().bind("a/following::b", weft_delivery::FnVisitor::new("v"))?.build()
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
