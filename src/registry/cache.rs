// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Two-tier generational lookup cache
//!
//! New entries land in a bounded *hot* tier. When the hot tier is full the
//! whole tier is demoted into an unbounded *cold* tier and the hot tier starts
//! over. A cold hit promotes the entry back into the hot tier. The cold tier
//! is only reclaimed by an explicit [`GenerationalCache::sweep`].
//!
//! Hot-tier lookups and inserts go through a [`DashMap`]; the demotion step
//! runs under the write half of an [`RwLock`] that every other operation holds
//! for reading, so readers see the hot tier either before or after a
//! demotion, never in between.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxBuildHasher;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by the hot tier
    pub hot_hits: u64,
    /// Lookups answered by the cold tier
    pub cold_hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Number of hot to cold demotions
    pub migrations: u64,
    /// Entries currently in the hot tier
    pub hot_entries: usize,
    /// Entries currently in the cold tier
    pub cold_entries: usize,
}

impl CacheStats {
    /// Total number of hits in either tier
    pub fn hits(&self) -> u64 {
        self.hot_hits + self.cold_hits
    }

    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits() as f64) / (total as f64) * 100.0
        }
    }
}

/// Thread-safe two-tier cache
#[derive(Debug)]
pub struct GenerationalCache<K, V>
where
    K: Eq + Hash,
{
    capacity: usize,
    hot: DashMap<K, V, FxBuildHasher>,
    cold: Mutex<HashMap<K, V, FxBuildHasher>>,
    migration: RwLock<()>,
    hot_hits: AtomicU64,
    cold_hits: AtomicU64,
    misses: AtomicU64,
    migrations: AtomicU64,
}

impl<K, V> GenerationalCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache whose hot tier holds `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hot: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
            cold: Mutex::new(HashMap::default()),
            migration: RwLock::new(()),
            hot_hits: AtomicU64::new(0),
            cold_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            migrations: AtomicU64::new(0),
        }
    }

    /// Look up a key, promoting cold hits into the hot tier
    pub fn get(&self, key: &K) -> Option<V> {
        let _guard = self.migration.read();
        if let Some(value) = self.hot.get(key) {
            self.hot_hits.fetch_add(1, Ordering::Relaxed);
            return Some(value.clone());
        }
        let promoted = self.cold.lock().get(key).cloned();
        match promoted {
            Some(value) => {
                self.cold_hits.fetch_add(1, Ordering::Relaxed);
                self.hot.insert(key.clone(), value.clone());
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an entry, demoting the hot tier first when it is full
    ///
    /// The capacity is a soft bound. Writers that pass the fullness check at
    /// the same time each insert one entry, and cold hits are promoted by
    /// [`get`](Self::get) without a check, so the hot tier may briefly hold
    /// more than `capacity` entries until the next demotion. With a single
    /// writer and no promotions it never exceeds `capacity`.
    pub fn put(&self, key: K, value: V) {
        if self.hot.len() >= self.capacity {
            self.migrate();
        }
        let _guard = self.migration.read();
        self.hot.insert(key, value);
    }

    fn migrate(&self) {
        let _guard = self.migration.write();
        // Another writer may have demoted the tier while we waited
        if self.hot.len() < self.capacity {
            return;
        }
        let mut cold = self.cold.lock();
        let demoted = self.hot.len();
        for entry in self.hot.iter() {
            cold.insert(entry.key().clone(), entry.value().clone());
        }
        self.hot.clear();
        self.migrations.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Demoted {} entries to cold tier ({} cold entries total)",
            demoted,
            cold.len()
        );
    }

    /// Drop every entry of the cold tier
    pub fn sweep(&self) -> usize {
        let _guard = self.migration.write();
        let mut cold = self.cold.lock();
        let dropped = cold.len();
        cold.clear();
        if dropped > 0 {
            log::debug!("Swept {dropped} entries from cold tier");
        }
        dropped
    }

    /// Remove every entry from both tiers
    pub fn clear(&self) {
        let _guard = self.migration.write();
        self.hot.clear();
        self.cold.lock().clear();
    }

    /// Maximum number of hot entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries in the hot tier
    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    /// Entries in the cold tier
    pub fn cold_len(&self) -> usize {
        self.cold.lock().len()
    }

    /// Distinct keys across both tiers
    pub fn len(&self) -> usize {
        let _guard = self.migration.read();
        let cold = self.cold.lock();
        let promoted = self
            .hot
            .iter()
            .filter(|entry| cold.contains_key(entry.key()))
            .count();
        self.hot.len() + cold.len() - promoted
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.hot.is_empty() && self.cold.lock().is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hot_hits: self.hot_hits.load(Ordering::Relaxed),
            cold_hits: self.cold_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            migrations: self.migrations.load(Ordering::Relaxed),
            hot_entries: self.hot_len(),
            cold_entries: self.cold_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_then_get_hits_hot_tier() {
        let cache = GenerationalCache::new(4);
        cache.put("a".to_string(), 1);

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.hot_len(), 1);
        assert_eq!(cache.stats().hot_hits, 1);
    }

    #[test]
    fn test_overflow_demotes_hot_tier() {
        let cache = GenerationalCache::new(3);
        for i in 0..4 {
            cache.put(i, i * 10);
        }

        assert_eq!(cache.hot_len(), 1);
        assert_eq!(cache.cold_len(), 3);
        for i in 0..4 {
            assert_eq!(cache.get(&i), Some(i * 10));
        }
        assert_eq!(cache.get(&99), None);

        let stats = cache.stats();
        assert_eq!(stats.migrations, 1);
        assert_eq!(stats.cold_hits, 3);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_sequential_puts_respect_capacity() {
        let cache = GenerationalCache::new(4);
        for i in 0..50 {
            cache.put(i, i);
            assert!(cache.hot_len() <= 4, "hot tier grew to {}", cache.hot_len());
        }
        assert_eq!(cache.stats().migrations, 12);
    }

    #[test]
    fn test_concurrent_puts_overshoot_by_at_most_one_per_writer() {
        const WRITERS: usize = 8;
        let cache = Arc::new(GenerationalCache::new(4));
        let handles: Vec<_> = (0..WRITERS)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        cache.put(t * 1000 + i, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.hot_len() <= 4 + WRITERS);
        assert_eq!(cache.len(), WRITERS * 100);
    }

    #[test]
    fn test_cold_hit_is_promoted() {
        let cache = GenerationalCache::new(1);
        cache.put("x", 1);
        cache.put("y", 2);
        assert_eq!(cache.cold_len(), 1);

        assert_eq!(cache.get(&"x"), Some(1));
        assert_eq!(cache.hot_len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_sweep_drops_cold_tier() {
        let cache = GenerationalCache::new(2);
        for i in 0..3 {
            cache.put(i, i);
        }
        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.get(&0), None);
        assert_eq!(cache.get(&2), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(GenerationalCache::new(16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = t * 1000 + i;
                        cache.put(key, key * 2);
                        assert_eq!(cache.get(&key), Some(key * 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for t in 0..8 {
            for i in 0..200 {
                let key = t * 1000 + i;
                assert_eq!(cache.get(&key), Some(key * 2));
            }
        }
    }
}
