use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::CacheConn;
use crate::domain::models::CounterKind;
use crate::metrics::COUNTER_CACHE_EVENTS;
use crate::store::StoreGateway;

/// Read-through counter cache for fast engagement reads.
///
/// Keys: `post:{id}:likes`, `post:{id}:commentcount`, with a sliding expiry
/// refreshed on every read or write touch.
///
/// The durable store is authoritative; the cached value is a best-effort
/// mirror with staleness bounded by the TTL. Increments land in the cache
/// only — the reconciliation worker writes them back to the store out of
/// band.
#[derive(Clone)]
pub struct CounterCache {
    cache: Arc<dyn CacheConn>,
    store: Arc<dyn StoreGateway>,
    ttl: Duration,
}

impl CounterCache {
    pub fn new(cache: Arc<dyn CacheConn>, store: Arc<dyn StoreGateway>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    fn key(kind: CounterKind, node_id: Uuid) -> String {
        format!("post:{}:{}", node_id, kind.as_str())
    }

    /// Current count. A hit refreshes the sliding TTL; a miss reads the
    /// store (absent rows count as zero) and warms the cache. Cache errors
    /// degrade to a store round-trip, store errors on a cold key degrade to
    /// zero — this never fails the caller.
    pub async fn get(&self, kind: CounterKind, node_id: Uuid) -> i64 {
        let key = Self::key(kind, node_id);
        match self.cache.get_i64(&key).await {
            Ok(Some(value)) => {
                COUNTER_CACHE_EVENTS.with_label_values(&["hit"]).inc();
                if let Err(err) = self.cache.expire(&key, self.ttl.as_secs() as i64).await {
                    debug!(error = %err, key = %key, "failed to refresh counter TTL");
                }
                value
            }
            Ok(None) => {
                COUNTER_CACHE_EVENTS.with_label_values(&["miss"]).inc();
                let value = self.store_value(kind, node_id).await;
                if let Err(err) = self.cache.set_ex(&key, value, self.ttl.as_secs()).await {
                    warn!(error = %err, key = %key, "failed to warm counter cache");
                }
                value
            }
            Err(err) => {
                COUNTER_CACHE_EVENTS.with_label_values(&["degraded"]).inc();
                warn!(error = %err, key = %key, "cache unavailable, serving store value");
                self.store_value(kind, node_id).await
            }
        }
    }

    /// Warms the key, then applies a single atomic increment. The returned
    /// value is what callers report; it is not written through to the store
    /// here — the reconciliation worker owns durable counter writes.
    pub async fn bump(&self, kind: CounterKind, node_id: Uuid, delta: i64) -> i64 {
        let key = Self::key(kind, node_id);
        let current = self.get(kind, node_id).await;
        if delta < 0 && current == 0 {
            // counters never go negative
            return 0;
        }
        match self.cache.incr_by(&key, delta).await {
            Ok(value) if value < 0 => {
                warn!(key = %key, value, "counter underflow, resetting to zero");
                if let Err(err) = self.cache.set_ex(&key, 0, self.ttl.as_secs()).await {
                    warn!(error = %err, key = %key, "failed to reset underflowed counter");
                }
                0
            }
            Ok(value) => {
                if let Err(err) = self.cache.expire(&key, self.ttl.as_secs() as i64).await {
                    debug!(error = %err, key = %key, "failed to refresh counter TTL");
                }
                value
            }
            Err(err) => {
                COUNTER_CACHE_EVENTS.with_label_values(&["degraded"]).inc();
                warn!(
                    error = %err,
                    key = %key,
                    "cache unavailable during increment, returning unpersisted value"
                );
                (current + delta).max(0)
            }
        }
    }

    /// Drops the cached key; the next read re-derives from the store.
    pub async fn remove(&self, kind: CounterKind, node_id: Uuid) {
        let key = Self::key(kind, node_id);
        if let Err(err) = self.cache.del(&[key.clone()]).await {
            warn!(error = %err, key = %key, "failed to drop counter key");
        }
    }

    /// Cache liveness probe for readiness checks.
    pub async fn ping(&self) -> Result<()> {
        self.cache.ping().await
    }

    async fn store_value(&self, kind: CounterKind, node_id: Uuid) -> i64 {
        match self.store.read_counter(kind, node_id).await {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    error = %err,
                    node_id = %node_id,
                    kind = kind.as_str(),
                    "store read failed, counter defaults to zero"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domain::models::ContentNode;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn counters(store: &Arc<MemoryStore>, cache: &Arc<MemoryCache>) -> CounterCache {
        CounterCache::new(
            cache.clone(),
            store.clone(),
            Duration::from_secs(3600),
        )
    }

    fn node() -> ContentNode {
        ContentNode {
            id: Uuid::new_v4(),
            parent_id: None,
            author_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn decrement_never_goes_negative() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let counters = counters(&store, &cache);

        let id = Uuid::new_v4();
        assert_eq!(counters.bump(CounterKind::Likes, id, -1).await, 0);
        assert_eq!(counters.get(CounterKind::Likes, id).await, 0);
    }

    #[tokio::test]
    async fn degraded_cache_serves_store_value() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let counters = counters(&store, &cache);

        let n = node();
        let id = n.id;
        store.insert_node(n).await;
        store.seed_counter(id, 41, 0).await;

        cache.set_unavailable(true);
        assert_eq!(counters.get(CounterKind::Likes, id).await, 41);

        // recovery: the next read warms the cache again
        cache.set_unavailable(false);
        assert_eq!(counters.get(CounterKind::Likes, id).await, 41);
        assert_eq!(counters.get(CounterKind::Likes, id).await, 41);
    }

    #[tokio::test]
    async fn cold_store_failure_defaults_to_zero() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let counters = counters(&store, &cache);

        store.set_unavailable(true);
        assert_eq!(counters.get(CounterKind::Likes, Uuid::new_v4()).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_key_rederives_from_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let counters = counters(&store, &cache);

        let n = node();
        let id = n.id;
        store.insert_node(n).await;
        store.seed_counter(id, 5, 0).await;

        assert_eq!(counters.get(CounterKind::Likes, id).await, 5);
        assert_eq!(counters.bump(CounterKind::Likes, id, 1).await, 6);

        // past the TTL the cached bump is gone and the store wins again
        tokio::time::advance(Duration::from_secs(3601)).await;
        assert_eq!(counters.get(CounterKind::Likes, id).await, 5);
    }
}
