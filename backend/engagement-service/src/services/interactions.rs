use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CounterCache, RankingIndex};
use crate::domain::models::{CounterKind, RankedChild};
use crate::error::{ServiceError, ServiceResult};
use crate::store::StoreGateway;

/// Orchestrates a single like/unlike/comment/uncomment mutation across the
/// durable store, the counter cache and the ranking index.
///
/// Ordering invariant for likes: the conditional membership write in the
/// store runs first and IS the duplicate decision. The counter bump and the
/// ranking adjust follow only after it succeeds, so a rejected or failed
/// request never moves a counter. A crash between the membership write and
/// the bump under-counts until reconciliation catches up; it never
/// over-counts.
#[derive(Clone)]
pub struct InteractionService {
    store: Arc<dyn StoreGateway>,
    counters: CounterCache,
    ranking: RankingIndex,
    deadline: Duration,
}

impl InteractionService {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        counters: CounterCache,
        ranking: RankingIndex,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            counters,
            ranking,
            deadline,
        }
    }

    /// Runs `fut` under the per-request deadline; expiry cancels the
    /// in-flight call and fails the request.
    async fn bounded<T>(&self, fut: impl Future<Output = ServiceResult<T>>) -> ServiceResult<T> {
        match timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::DeadlineExceeded),
        }
    }

    pub async fn get_count(&self, kind: CounterKind, node_id: Uuid) -> ServiceResult<i64> {
        self.bounded(async { Ok(self.counters.get(kind, node_id).await) })
            .await
    }

    /// Records a like by `user_id` on `node_id` and returns the new like
    /// count. `parent_id` is set when the target is a comment, keying the
    /// ranking update under that parent.
    pub async fn like(
        &self,
        user_id: Uuid,
        node_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<i64> {
        self.bounded(async {
            let created = self.store.insert_like_record(user_id, node_id).await?;
            if !created {
                return Err(ServiceError::AlreadyLiked);
            }
            let count = self.counters.bump(CounterKind::Likes, node_id, 1).await;
            if let Some(parent_id) = parent_id {
                self.ranking.adjust(parent_id, node_id, 1, count).await;
            }
            debug!(user_id = %user_id, node_id = %node_id, count, "like recorded");
            Ok(count)
        })
        .await
    }

    pub async fn unlike(
        &self,
        user_id: Uuid,
        node_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<i64> {
        self.bounded(async {
            let existed = self.store.delete_like_record(user_id, node_id).await?;
            if !existed {
                return Err(ServiceError::NotLiked);
            }
            let count = self.counters.bump(CounterKind::Likes, node_id, -1).await;
            if let Some(parent_id) = parent_id {
                self.ranking.adjust(parent_id, node_id, -1, count).await;
            }
            debug!(user_id = %user_id, node_id = %node_id, count, "like removed");
            Ok(count)
        })
        .await
    }

    /// A new comment (`child_id`) landed under `parent_id`. Bumps the
    /// parent's comment counter and, when the parent is itself a comment,
    /// its score in the grandparent's ranking.
    pub async fn comment_added(&self, parent_id: Uuid, child_id: Uuid) -> ServiceResult<i64> {
        self.bounded(async {
            let count = self.counters.bump(CounterKind::Comments, parent_id, 1).await;
            self.adjust_parent_ranking(parent_id, 1, count).await;
            debug!(parent_id = %parent_id, child_id = %child_id, count, "comment counted");
            Ok(count)
        })
        .await
    }

    pub async fn comment_removed(&self, parent_id: Uuid, child_id: Uuid) -> ServiceResult<i64> {
        self.bounded(async {
            let count = self
                .counters
                .bump(CounterKind::Comments, parent_id, -1)
                .await;
            self.adjust_parent_ranking(parent_id, -1, count).await;
            debug!(parent_id = %parent_id, child_id = %child_id, count, "comment removal counted");
            Ok(count)
        })
        .await
    }

    pub async fn has_liked(&self, user_id: Uuid, node_id: Uuid) -> ServiceResult<bool> {
        self.bounded(async { Ok(self.store.has_like_record(user_id, node_id).await?) })
            .await
    }

    pub async fn top_ranked(&self, parent_id: Uuid, n: usize) -> ServiceResult<Vec<RankedChild>> {
        self.bounded(async { Ok(self.ranking.top_n(parent_id, n).await) })
            .await
    }

    /// Cache liveness probe for readiness checks.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.counters.ping().await
    }

    async fn adjust_parent_ranking(&self, node_id: Uuid, delta: i64, anchor: i64) {
        match self.store.parent_of(node_id).await {
            Ok(Some(grandparent)) => {
                self.ranking.adjust(grandparent, node_id, delta, anchor).await;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    error = %err,
                    node_id = %node_id,
                    "could not resolve parent for ranking update"
                );
            }
        }
    }
}
