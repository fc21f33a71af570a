//! Band-list cache for dataset probes

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

struct Entry {
    bands: Arc<Vec<String>>,
    last_used: AtomicU64,
}

/// Bounded cache of dataset id -> band names, shared across requests
///
/// Each entry carries the tick of its last use; a full cache evicts the
/// entry with the oldest tick.
pub struct BandCache {
    entries: DashMap<String, Entry>,
    clock: AtomicU64,
    max_entries: usize,
}

impl BandCache {
    /// Creates a new band cache
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of datasets to remember
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
            max_entries: max_entries.max(1),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Gets the cached band list of a dataset
    pub fn get(&self, dataset: &str) -> Option<Arc<Vec<String>>> {
        let entry = self.entries.get(dataset)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.bands))
    }

    /// Remembers a non-empty band list; empty lists are never cached
    pub fn put(&self, dataset: &str, bands: Vec<String>) -> Arc<Vec<String>> {
        let bands = Arc::new(bands);
        if bands.is_empty() {
            return bands;
        }

        while self.entries.len() >= self.max_entries && !self.entries.contains_key(dataset) {
            // Shard guards from the scan must be released before removing
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }

        self.entries.insert(
            dataset.to_string(),
            Entry {
                bands: Arc::clone(&bands),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        bands
    }

    /// Forgets a dataset after its layers stopped answering
    pub fn invalidate(&self, dataset: &str) {
        self.entries.remove(dataset);
    }

    /// Returns the current number of cached datasets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cache_basic() {
        let cache = BandCache::new(2);

        cache.put("c9", bands(&["classification_2023"]));

        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.get("c9").unwrap(), bands(&["classification_2023"]));
        assert!(cache.get("c8").is_none());
    }

    #[test]
    fn test_empty_lists_not_cached() {
        let cache = BandCache::new(2);
        cache.put("c9", Vec::new());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_lru_eviction() {
        let cache = BandCache::new(2);

        cache.put("a", bands(&["x"]));
        cache.put("b", bands(&["x"]));
        cache.get("a");
        cache.put("c", bands(&["x"]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_repeated_hits_keep_cache_bounded() {
        let cache = BandCache::new(2);
        cache.put("hot", bands(&["x"]));
        cache.put("cold", bands(&["y"]));

        for _ in 0..10_000 {
            assert!(cache.get("hot").is_some());
        }
        assert_eq!(cache.len(), 2);

        // Re-putting a cached dataset never evicts another one
        cache.put("hot", bands(&["x", "z"]));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("cold").is_some());

        cache.put("new", bands(&["w"]));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("hot").is_none());
        assert!(cache.get("cold").is_some());
    }

    #[test]
    fn test_cache_concurrent_access() {
        use std::thread;

        let cache = Arc::new(BandCache::new(50));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..50 {
                        let key = format!("{}-{}", i, j);
                        cache.put(&key, vec![key.clone()]);
                        let _ = cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // each writer may overshoot the bound by one racing insert
        assert!(cache.len() <= 50 + 8);
    }

    #[test]
    fn test_invalidate() {
        let cache = BandCache::new(10);

        cache.put("a", bands(&["x"]));
        cache.put("b", bands(&["y"]));
        cache.invalidate("a");
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());

        cache.invalidate("missing");
        assert_eq!(cache.len(), 1);
    }
}
