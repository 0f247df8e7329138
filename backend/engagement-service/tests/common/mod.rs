#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use engagement_service::cache::{CacheConn, CounterCache, MemoryCache, RankingIndex};
use engagement_service::domain::models::ContentNode;
use engagement_service::services::{CascadeDeleteExecutor, InteractionService, SubtreeResolver};
use engagement_service::store::{MemoryStore, StoreGateway};

/// Everything the suites need, wired against the in-memory backends the
/// same way `main` wires the production ones.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub interactions: InteractionService,
    pub cascade: CascadeDeleteExecutor,
}

pub fn harness() -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let store_dyn: Arc<dyn StoreGateway> = store.clone();
    let cache_dyn: Arc<dyn CacheConn> = cache.clone();

    let ttl = Duration::from_secs(3600);
    let deadline = Duration::from_secs(10);

    let counters = CounterCache::new(cache_dyn.clone(), store_dyn.clone(), ttl);
    let ranking = RankingIndex::new(cache_dyn.clone(), ttl);
    let interactions = InteractionService::new(
        store_dyn.clone(),
        counters.clone(),
        ranking.clone(),
        deadline,
    );
    let resolver = SubtreeResolver::new(store_dyn.clone(), 1024, 100_000);
    let cascade = CascadeDeleteExecutor::new(store_dyn, resolver, counters, ranking, deadline);

    TestHarness {
        store,
        cache,
        interactions,
        cascade,
    }
}

pub fn node(parent_id: Option<Uuid>) -> ContentNode {
    ContentNode {
        id: Uuid::new_v4(),
        parent_id,
        author_id: Uuid::new_v4(),
        created_at: Utc::now(),
    }
}

/// Seeds a node into the store and returns its id.
pub async fn seed_node(store: &MemoryStore, parent_id: Option<Uuid>) -> Uuid {
    let n = node(parent_id);
    let id = n.id;
    store.insert_node(n).await;
    id
}
