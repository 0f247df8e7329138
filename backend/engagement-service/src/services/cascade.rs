use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CounterCache, RankingIndex};
use crate::domain::models::{ContentNode, CounterKind};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::CASCADE_NODES_DELETED;
use crate::services::SubtreeResolver;
use crate::store::{DeleteBatch, DeleteStatement, StoreGateway};

/// Outcome of a cascading delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Root plus every discovered descendant covered by the batch.
    pub nodes_planned: usize,
}

/// Tears down a content subtree: one atomic, idempotent batch of durable
/// deletes covering the root and every descendant, followed by best-effort
/// cache and ranking cleanup.
pub struct CascadeDeleteExecutor {
    store: Arc<dyn StoreGateway>,
    resolver: SubtreeResolver,
    counters: CounterCache,
    ranking: RankingIndex,
    deadline: Duration,
}

impl CascadeDeleteExecutor {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        resolver: SubtreeResolver,
        counters: CounterCache,
        ranking: RankingIndex,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            resolver,
            counters,
            ranking,
            deadline,
        }
    }

    /// Deletes `root` and its whole subtree. A batch failure surfaces as
    /// [`ServiceError::PartialCascade`]; the batch is idempotent, so the
    /// caller retries the whole operation rather than resuming it.
    pub async fn delete_subtree(&self, root: Uuid) -> ServiceResult<CascadeOutcome> {
        match timeout(self.deadline, self.run(root)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::DeadlineExceeded),
        }
    }

    async fn run(&self, root: Uuid) -> ServiceResult<CascadeOutcome> {
        let root_node = self.store.fetch_node(root).await?;
        let descendants = self.resolver.descendants(root).await?;
        let ids: Vec<Uuid> = std::iter::once(root)
            .chain(descendants.iter().map(|node| node.id))
            .collect();

        let mut statements = Vec::with_capacity(ids.len() * 3);
        for id in &ids {
            statements.push(DeleteStatement::LikeRecords(*id));
            statements.push(DeleteStatement::Counters(*id));
            statements.push(DeleteStatement::ContentNode(*id));
        }
        let batch = DeleteBatch {
            statements,
            idempotent: true,
        };
        if let Err(source) = self.store.execute_batch(batch).await {
            return Err(ServiceError::PartialCascade {
                planned: ids.len(),
                source,
            });
        }
        CASCADE_NODES_DELETED.inc_by(ids.len() as u64);
        info!(root = %root, nodes = ids.len(), "subtree deleted");

        // The committed store state is final. Cleanup failures only extend
        // staleness until the cache TTL or a reconciliation pass catches up.
        self.clear_cached_state(root, root_node.as_ref(), &ids).await;

        Ok(CascadeOutcome {
            nodes_planned: ids.len(),
        })
    }

    async fn clear_cached_state(&self, root: Uuid, root_node: Option<&ContentNode>, ids: &[Uuid]) {
        for id in ids {
            self.counters.remove(CounterKind::Likes, *id).await;
            self.counters.remove(CounterKind::Comments, *id).await;
            self.ranking.remove_all(*id).await;
        }
        // the root may itself be ranked under its parent
        if let Some(parent_id) = root_node.and_then(|node| node.parent_id) {
            self.ranking.remove(parent_id, root).await;
        }
    }
}
