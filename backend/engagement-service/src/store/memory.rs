use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DeleteBatch, DeleteStatement, StoreGateway};
use crate::domain::models::{ContentNode, CounterKind};

#[derive(Default, Clone, Copy)]
struct CounterRow {
    likes: i64,
    comments: i64,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<Uuid, ContentNode>,
    counters: HashMap<Uuid, CounterRow>,
    likes: HashSet<(Uuid, Uuid)>,
}

/// In-memory [`StoreGateway`] with the same conditional-write and batch
/// semantics as the PostgreSQL gateway. Backs the integration tests and
/// local development; outages can be simulated for failure-path coverage.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    fail_batches: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            unavailable: AtomicBool::new(false),
            fail_batches: AtomicBool::new(false),
        }
    }

    /// Simulate a store outage: every operation fails until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail only `execute_batch`, leaving reads up; lets callers exercise
    /// the partial-cascade path.
    pub fn set_fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_node(&self, node: ContentNode) {
        let mut inner = self.inner.lock().await;
        inner.nodes.insert(node.id, node);
    }

    pub async fn seed_counter(&self, node_id: Uuid, likes: i64, comments: i64) {
        let mut inner = self.inner.lock().await;
        inner.counters.insert(node_id, CounterRow { likes, comments });
    }

    pub async fn counter_row(&self, node_id: Uuid) -> Option<(i64, i64)> {
        let inner = self.inner.lock().await;
        inner
            .counters
            .get(&node_id)
            .map(|row| (row.likes, row.comments))
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("store unavailable (simulated outage)");
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StoreGateway for MemoryStore {
    async fn read_counter(&self, kind: CounterKind, node_id: Uuid) -> Result<i64> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .counters
            .get(&node_id)
            .map(|row| match kind {
                CounterKind::Likes => row.likes,
                CounterKind::Comments => row.comments,
            })
            .unwrap_or(0))
    }

    async fn upsert_counter(&self, kind: CounterKind, node_id: Uuid, value: i64) -> Result<bool> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        if !inner.nodes.contains_key(&node_id) {
            return Ok(false);
        }
        let row = inner.counters.entry(node_id).or_default();
        match kind {
            CounterKind::Likes => row.likes = value,
            CounterKind::Comments => row.comments = value,
        }
        Ok(true)
    }

    async fn fetch_node(&self, node_id: Uuid) -> Result<Option<ContentNode>> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner.nodes.get(&node_id).cloned())
    }

    async fn parent_of(&self, node_id: Uuid) -> Result<Option<Uuid>> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner.nodes.get(&node_id).and_then(|node| node.parent_id))
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<ContentNode>> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        let mut children: Vec<ContentNode> = inner
            .nodes
            .values()
            .filter(|node| node.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|node| node.created_at);
        Ok(children)
    }

    async fn insert_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        Ok(inner.likes.insert((user_id, node_id)))
    }

    async fn delete_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        Ok(inner.likes.remove(&(user_id, node_id)))
    }

    async fn has_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner.likes.contains(&(user_id, node_id)))
    }

    async fn count_like_records(&self, node_id: Uuid) -> Result<i64> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner.likes.iter().filter(|(_, n)| *n == node_id).count() as i64)
    }

    async fn execute_batch(&self, batch: DeleteBatch) -> Result<()> {
        self.check_available()?;
        if self.fail_batches.load(Ordering::SeqCst) {
            bail!("batch rejected (simulated failure)");
        }
        // applied under one lock, so the whole batch is atomic
        let mut inner = self.inner.lock().await;
        for statement in &batch.statements {
            match statement {
                DeleteStatement::ContentNode(id) => {
                    inner.nodes.remove(id);
                }
                DeleteStatement::Counters(id) => {
                    inner.counters.remove(id);
                }
                DeleteStatement::LikeRecords(id) => {
                    inner.likes.retain(|(_, node)| node != id);
                }
            }
        }
        Ok(())
    }
}
