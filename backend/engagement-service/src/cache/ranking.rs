use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::CacheConn;
use crate::domain::models::RankedChild;
use crate::metrics::RANKING_EVENTS;

/// Per-parent ranking of child comments by interaction count.
///
/// Stored as a sorted set under `post:{parent}:comments` with the same
/// sliding expiry as the counters; enumeration is always descending by
/// score. Update failures are absorbed and logged — the index may diverge
/// from the counters until the next reconciliation pass, but a ranking
/// problem never fails the interaction that triggered it.
#[derive(Clone)]
pub struct RankingIndex {
    cache: Arc<dyn CacheConn>,
    ttl: Duration,
}

impl RankingIndex {
    pub fn new(cache: Arc<dyn CacheConn>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(parent_id: Uuid) -> String {
        format!("post:{}:comments", parent_id)
    }

    /// Sets a child's score outright. Used by reconciliation; interactive
    /// paths go through [`RankingIndex::adjust`].
    pub async fn upsert(&self, parent_id: Uuid, child_id: Uuid, score: i64) {
        let key = Self::key(parent_id);
        let member = child_id.to_string();
        let result: anyhow::Result<()> = async {
            self.cache.zadd(&key, &member, score as f64).await?;
            self.cache.expire(&key, self.ttl.as_secs() as i64).await?;
            Ok(())
        }
        .await;
        self.record(result, parent_id, child_id);
    }

    /// Moves a child's score by `delta`. A child not yet in the index is
    /// seeded at `anchor` — the counter value the caller just derived — so
    /// the first touch pins the ranking to the real count rather than the
    /// delta.
    pub async fn adjust(&self, parent_id: Uuid, child_id: Uuid, delta: i64, anchor: i64) {
        let key = Self::key(parent_id);
        let member = child_id.to_string();
        let result: anyhow::Result<()> = async {
            match self.cache.zscore(&key, &member).await? {
                Some(_) => {
                    self.cache.zincr_by(&key, &member, delta as f64).await?;
                }
                None => {
                    self.cache.zadd(&key, &member, anchor as f64).await?;
                }
            }
            self.cache.expire(&key, self.ttl.as_secs() as i64).await?;
            Ok(())
        }
        .await;
        self.record(result, parent_id, child_id);
    }

    /// The `n` highest-scored children, descending. Reads refresh the
    /// sliding TTL; a cache failure returns an empty ranking.
    pub async fn top_n(&self, parent_id: Uuid, n: usize) -> Vec<RankedChild> {
        if n == 0 {
            return Vec::new();
        }
        let key = Self::key(parent_id);
        let entries = match self
            .cache
            .zrevrange_withscores(&key, 0, n as isize - 1)
            .await
        {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, parent_id = %parent_id, "ranking read failed, returning empty");
                return Vec::new();
            }
        };
        if let Err(err) = self.cache.expire(&key, self.ttl.as_secs() as i64).await {
            debug!(error = %err, parent_id = %parent_id, "failed to refresh ranking TTL");
        }
        entries
            .into_iter()
            .filter_map(|(member, score)| match Uuid::parse_str(&member) {
                Ok(child_id) => Some(RankedChild {
                    child_id,
                    score: score as i64,
                }),
                Err(_) => {
                    warn!(member = %member, "dropping unparseable ranking member");
                    None
                }
            })
            .collect()
    }

    /// Removes one child's entry from its parent's ranking.
    pub async fn remove(&self, parent_id: Uuid, child_id: Uuid) {
        let key = Self::key(parent_id);
        if let Err(err) = self.cache.zrem(&key, &child_id.to_string()).await {
            warn!(error = %err, parent_id = %parent_id, child_id = %child_id, "failed to remove ranking entry");
        }
    }

    /// Drops the whole per-parent ranking, used during cascading delete.
    pub async fn remove_all(&self, parent_id: Uuid) {
        let key = Self::key(parent_id);
        if let Err(err) = self.cache.del(&[key.clone()]).await {
            warn!(error = %err, key = %key, "failed to drop ranking set");
        }
    }

    fn record(&self, result: anyhow::Result<()>, parent_id: Uuid, child_id: Uuid) {
        match result {
            Ok(()) => RANKING_EVENTS.with_label_values(&["applied"]).inc(),
            Err(err) => {
                RANKING_EVENTS.with_label_values(&["lost"]).inc();
                warn!(
                    error = %err,
                    parent_id = %parent_id,
                    child_id = %child_id,
                    "ranking update lost, index diverges until the next reconciliation pass"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn index(cache: &Arc<MemoryCache>) -> RankingIndex {
        RankingIndex::new(cache.clone(), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn first_touch_anchors_then_increments() {
        let cache = Arc::new(MemoryCache::new());
        let ranking = index(&cache);
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();

        // absent member is seeded at the anchor, not the delta
        ranking.adjust(parent, child, 1, 7).await;
        let top = ranking.top_n(parent, 1).await;
        assert_eq!(top[0].score, 7);

        ranking.adjust(parent, child, 1, 99).await;
        let top = ranking.top_n(parent, 1).await;
        assert_eq!(top[0].score, 8);
    }

    #[tokio::test]
    async fn top_n_is_descending_and_bounded() {
        let cache = Arc::new(MemoryCache::new());
        let ranking = index(&cache);
        let parent = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        ranking.upsert(parent, a, 1).await;
        ranking.upsert(parent, b, 5).await;
        ranking.upsert(parent, c, 3).await;

        let top = ranking.top_n(parent, 2).await;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].child_id, b);
        assert_eq!(top[1].child_id, c);
        assert!(ranking.top_n(parent, 0).await.is_empty());
    }

    #[tokio::test]
    async fn removal_clears_entries() {
        let cache = Arc::new(MemoryCache::new());
        let ranking = index(&cache);
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();

        ranking.upsert(parent, child, 2).await;
        ranking.remove(parent, child).await;
        assert!(ranking.top_n(parent, 10).await.is_empty());

        ranking.upsert(parent, child, 2).await;
        ranking.remove_all(parent).await;
        assert!(ranking.top_n(parent, 10).await.is_empty());
    }

    #[tokio::test]
    async fn failed_update_is_absorbed() {
        let cache = Arc::new(MemoryCache::new());
        let ranking = index(&cache);
        let parent = Uuid::new_v4();

        cache.set_unavailable(true);
        ranking.adjust(parent, Uuid::new_v4(), 1, 1).await;
        assert!(ranking.top_n(parent, 10).await.is_empty());
    }
}
