//! TTL cache abstraction
//!
//! Explicit key → (value, inserted_at) map with TTL-based eviction checked
//! on read. Injected through AppState rather than held in module-level
//! state so it can be swapped for a distributed cache without touching call
//! sites.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Shared in-process cache with per-instance TTL
#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<RwLock<HashMap<K, (V, Instant)>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Read a value; expired entries are evicted on the way out
    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, inserted_at)) if inserted_at.elapsed() < self.ttl => {
                    return Some(value.clone());
                }
                Some(_) => {} // expired, fall through to evict
                None => return None,
            }
        }

        self.entries.write().await.remove(key);
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        self.entries.write().await.insert(key, (value, Instant::now()));
    }

    pub async fn remove(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_entries_are_returned() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        cache.insert(1, "one".to_string()).await;
        assert_eq!(cache.get(&1).await, Some("one".to_string()));
        assert_eq!(cache.get(&2).await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_read() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_millis(10));
        cache.insert(1, "one".to_string()).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(&1).await, None);
        // Gone from the map, not just filtered
        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert(1, 10).await;
        cache.remove(&1).await;
        assert_eq!(cache.get(&1).await, None);
    }
}
