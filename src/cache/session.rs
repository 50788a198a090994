//! Single-entry memo for a session's last training run
//!
//! Re-running training with the same selection on the same data is pure
//! waste, so the session keeps the last result keyed by everything it
//! depends on. Only one run is kept; a different key replaces it.

use std::collections::BTreeSet;
use std::time::Instant;

/// Everything a training run's result depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    /// Predictors as a set, so order does not matter
    pub features: BTreeSet<String>,
    pub target: String,
    /// `f64::to_bits` of the split ratio
    pub split_bits: u64,
    /// Fingerprint of the conditioned table
    pub fingerprint: u64,
}

impl RunKey {
    pub fn new(features: &[String], target: &str, test_size: f64, fingerprint: u64) -> Self {
        Self {
            features: features.iter().cloned().collect(),
            target: target.to_string(),
            split_bits: test_size.to_bits(),
            fingerprint,
        }
    }
}

/// Hit / miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct CachedRun<V> {
    key: RunKey,
    value: V,
    stored_at: Instant,
}

/// Holds at most one run, owned by a single session
#[derive(Debug, Clone)]
pub struct SessionCache<V> {
    entry: Option<CachedRun<V>>,
    stats: CacheStats,
}

impl<V> Default for SessionCache<V> {
    fn default() -> Self {
        Self {
            entry: None,
            stats: CacheStats::default(),
        }
    }
}

impl<V> SessionCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value if it was stored under `key`
    pub fn get(&mut self, key: &RunKey) -> Option<&V> {
        match &self.entry {
            Some(run) if &run.key == key => {
                self.stats.hits += 1;
                Some(&run.value)
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Like [`SessionCache::get`] without touching the counters
    pub fn peek(&self, key: &RunKey) -> Option<&V> {
        self.entry
            .as_ref()
            .filter(|run| &run.key == key)
            .map(|run| &run.value)
    }

    /// Store `value`, replacing any previous run
    pub fn insert(&mut self, key: RunKey, value: V) -> &V {
        let run = self.entry.insert(CachedRun {
            key,
            value,
            stored_at: Instant::now(),
        });
        &run.value
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn key(&self) -> Option<&RunKey> {
        self.entry.as_ref().map(|run| &run.key)
    }

    /// Seconds since the current entry was stored
    pub fn age_secs(&self) -> Option<f64> {
        self.entry
            .as_ref()
            .map(|run| run.stored_at.elapsed().as_secs_f64())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(features: &[&str], test_size: f64) -> RunKey {
        let features: Vec<String> = features.iter().map(|s| s.to_string()).collect();
        RunKey::new(&features, "price", test_size, 7)
    }

    #[test]
    fn test_hit_ignores_feature_order() {
        let mut cache = SessionCache::new();
        cache.insert(key(&["rate", "sale"], 0.2), 1);
        assert_eq!(cache.get(&key(&["sale", "rate"], 0.2)), Some(&1));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 0 });
    }

    #[test]
    fn test_miss_on_changed_key() {
        let mut cache = SessionCache::new();
        cache.insert(key(&["rate"], 0.2), 1);
        assert!(cache.get(&key(&["rate"], 0.3)).is_none());
        assert!(cache.get(&key(&["rate", "sale"], 0.2)).is_none());
        assert!(cache
            .get(&RunKey::new(&["rate".to_string()], "price", 0.2, 8))
            .is_none());
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn test_single_entry_replaced_and_invalidated() {
        let mut cache = SessionCache::new();
        cache.insert(key(&["rate"], 0.2), 1);
        cache.insert(key(&["sale"], 0.2), 2);
        assert!(cache.get(&key(&["rate"], 0.2)).is_none());
        assert_eq!(cache.get(&key(&["sale"], 0.2)), Some(&2));

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.age_secs().is_none());
    }
}
