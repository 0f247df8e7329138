//! Periodic cache/store reconciliation.
//!
//! Two structures drift by design: cached counters advance without durable
//! writes, and the ranking index is advanced by the same callers but does
//! not self-correct from the store. Each pass writes cached counters back
//! to the durable store, drops cache keys whose node is gone, and rewrites
//! every ranking member whose score no longer matches the authoritative
//! counters.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::CacheConn;
use crate::domain::models::CounterKind;
use crate::metrics::{RANKING_DRIFT_CORRECTED, RECONCILE_RUNS};
use crate::store::StoreGateway;

/// Counts of what a reconciliation pass touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub counters_synced: usize,
    pub stale_keys_dropped: usize,
    pub ranking_corrected: usize,
}

pub struct Reconciler {
    cache: Arc<dyn CacheConn>,
    store: Arc<dyn StoreGateway>,
}

impl Reconciler {
    pub fn new(cache: Arc<dyn CacheConn>, store: Arc<dyn StoreGateway>) -> Self {
        Self { cache, store }
    }

    /// Runs passes forever, `interval` apart, until the shutdown channel
    /// fires.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<()>) {
        info!(interval_secs = interval.as_secs(), "reconciliation worker started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("reconciliation worker shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    match self.reconcile_once().await {
                        Ok(stats) => {
                            RECONCILE_RUNS.with_label_values(&["ok"]).inc();
                            info!(
                                counters = stats.counters_synced,
                                stale = stats.stale_keys_dropped,
                                corrected = stats.ranking_corrected,
                                "reconciliation pass complete"
                            );
                        }
                        Err(err) => {
                            RECONCILE_RUNS.with_label_values(&["error"]).inc();
                            warn!(error = %err, "reconciliation pass failed");
                        }
                    }
                }
            }
        }
    }

    /// One full pass. Counters sync first so the ranking step reads fresh
    /// durable values.
    pub async fn reconcile_once(&self) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();
        for kind in [CounterKind::Likes, CounterKind::Comments] {
            self.sync_counters(kind, &mut stats).await?;
        }
        self.sync_rankings(&mut stats).await?;
        Ok(stats)
    }

    async fn sync_counters(&self, kind: CounterKind, stats: &mut ReconcileStats) -> Result<()> {
        let pattern = format!("post:*:{}", kind.as_str());
        for key in self.cache.scan_match(&pattern).await? {
            let Some(node_id) = node_id_from_key(&key) else {
                warn!(key = %key, "skipping malformed counter key");
                continue;
            };
            let Some(value) = self.cache.get_i64(&key).await? else {
                // expired between scan and read
                continue;
            };
            if self.store.upsert_counter(kind, node_id, value).await? {
                stats.counters_synced += 1;
            } else {
                // the node is gone; drop the orphaned key instead of
                // resurrecting its counter
                self.cache.del(&[key]).await?;
                stats.stale_keys_dropped += 1;
            }
        }
        Ok(())
    }

    async fn sync_rankings(&self, stats: &mut ReconcileStats) -> Result<()> {
        for key in self.cache.scan_match("post:*:comments").await? {
            let Some(parent_id) = node_id_from_key(&key) else {
                warn!(key = %key, "skipping malformed ranking key");
                continue;
            };
            if self.store.fetch_node(parent_id).await?.is_none() {
                self.cache.del(&[key]).await?;
                stats.stale_keys_dropped += 1;
                continue;
            }
            for (member, score) in self.cache.zrevrange_withscores(&key, 0, -1).await? {
                let Ok(child_id) = Uuid::parse_str(&member) else {
                    self.cache.zrem(&key, &member).await?;
                    continue;
                };
                let likes = self.store.read_counter(CounterKind::Likes, child_id).await?;
                let comments = self
                    .store
                    .read_counter(CounterKind::Comments, child_id)
                    .await?;
                // a child's score converges to its total interaction count
                let target = likes + comments;
                if score as i64 != target {
                    self.cache.zadd(&key, &member, target as f64).await?;
                    RANKING_DRIFT_CORRECTED.inc();
                    stats.ranking_corrected += 1;
                }
            }
        }
        Ok(())
    }
}

fn node_id_from_key(key: &str) -> Option<Uuid> {
    let mut parts = key.split(':');
    parts.next()?;
    Uuid::parse_str(parts.next()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(node_id_from_key(&format!("post:{}:likes", id)), Some(id));
        assert_eq!(node_id_from_key("post:not-a-uuid:likes"), None);
        assert_eq!(node_id_from_key("garbage"), None);
    }
}
