pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStoreGateway;

use anyhow::Result;
use uuid::Uuid;

use crate::domain::models::{ContentNode, CounterKind};

/// One statement in a cascading-delete batch. Statements are unordered and
/// individually idempotent.
#[derive(Debug, Clone)]
pub enum DeleteStatement {
    ContentNode(Uuid),
    Counters(Uuid),
    LikeRecords(Uuid),
}

/// A batch of delete statements executed atomically. With `idempotent` set
/// the gateway may retry the whole batch on transient failure, since
/// re-running deletes has no further effect.
#[derive(Debug, Clone)]
pub struct DeleteBatch {
    pub statements: Vec<DeleteStatement>,
    pub idempotent: bool,
}

/// Contract over the durable column store. Implemented by
/// [`PgStoreGateway`] in production and [`MemoryStore`] for tests and local
/// development.
#[async_trait::async_trait]
pub trait StoreGateway: Send + Sync {
    /// Authoritative counter value; absent rows read as zero.
    async fn read_counter(&self, kind: CounterKind, node_id: Uuid) -> Result<i64>;

    /// Reconciliation write-back. Returns false (and writes nothing) when
    /// the node no longer exists, so deleted nodes are not resurrected.
    async fn upsert_counter(&self, kind: CounterKind, node_id: Uuid, value: i64) -> Result<bool>;

    async fn fetch_node(&self, node_id: Uuid) -> Result<Option<ContentNode>>;

    async fn parent_of(&self, node_id: Uuid) -> Result<Option<Uuid>>;

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<ContentNode>>;

    /// Conditional insert; returns true when the record was created. The
    /// result doubles as the duplicate-like decision, so callers never need
    /// a separate existence check.
    async fn insert_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool>;

    /// Returns true when a record existed and was deleted.
    async fn delete_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool>;

    async fn has_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool>;

    async fn count_like_records(&self, node_id: Uuid) -> Result<i64>;

    /// Executes every statement in one atomic transaction.
    async fn execute_batch(&self, batch: DeleteBatch) -> Result<()>;
}
