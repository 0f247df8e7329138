use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::{DeleteBatch, DeleteStatement, StoreGateway};
use crate::domain::models::{ContentNode, CounterKind};

/// Durable store gateway backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStoreGateway {
    pool: PgPool,
}

impl PgStoreGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn counter_column(kind: CounterKind) -> &'static str {
        match kind {
            CounterKind::Likes => "like_count",
            CounterKind::Comments => "comment_count",
        }
    }

    async fn run_batch(&self, batch: &DeleteBatch) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin delete transaction")?;
        for statement in &batch.statements {
            match statement {
                DeleteStatement::ContentNode(id) => {
                    sqlx::query("DELETE FROM content_nodes WHERE id = $1")
                        .bind(*id)
                        .execute(&mut *tx)
                        .await
                        .context("failed to delete content node")?;
                }
                DeleteStatement::Counters(id) => {
                    sqlx::query("DELETE FROM interaction_counters WHERE node_id = $1")
                        .bind(*id)
                        .execute(&mut *tx)
                        .await
                        .context("failed to delete counter row")?;
                }
                DeleteStatement::LikeRecords(id) => {
                    sqlx::query("DELETE FROM like_records WHERE node_id = $1")
                        .bind(*id)
                        .execute(&mut *tx)
                        .await
                        .context("failed to delete like records")?;
                }
            }
        }
        tx.commit()
            .await
            .context("failed to commit delete transaction")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StoreGateway for PgStoreGateway {
    async fn read_counter(&self, kind: CounterKind, node_id: Uuid) -> Result<i64> {
        let query = format!(
            "SELECT {} FROM interaction_counters WHERE node_id = $1",
            Self::counter_column(kind)
        );
        let count: Option<i64> = sqlx::query_scalar(&query)
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to read counter")?;
        Ok(count.unwrap_or(0))
    }

    async fn upsert_counter(&self, kind: CounterKind, node_id: Uuid, value: i64) -> Result<bool> {
        let column = Self::counter_column(kind);
        let query = format!(
            "INSERT INTO interaction_counters (node_id, {column}) \
             SELECT $1, $2 WHERE EXISTS (SELECT 1 FROM content_nodes WHERE id = $1) \
             ON CONFLICT (node_id) DO UPDATE SET {column} = EXCLUDED.{column}"
        );
        let result = sqlx::query(&query)
            .bind(node_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .context("failed to upsert counter")?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_node(&self, node_id: Uuid) -> Result<Option<ContentNode>> {
        let node = sqlx::query_as::<_, ContentNode>(
            "SELECT id, parent_id, author_id, created_at FROM content_nodes WHERE id = $1",
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch content node")?;
        Ok(node)
    }

    async fn parent_of(&self, node_id: Uuid) -> Result<Option<Uuid>> {
        let parent: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT parent_id FROM content_nodes WHERE id = $1")
                .bind(node_id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to resolve parent")?;
        Ok(parent.flatten())
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<ContentNode>> {
        let children = sqlx::query_as::<_, ContentNode>(
            "SELECT id, parent_id, author_id, created_at \
             FROM content_nodes WHERE parent_id = $1 ORDER BY created_at",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list children")?;
        Ok(children)
    }

    async fn insert_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO like_records (user_id, node_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, node_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(node_id)
        .execute(&self.pool)
        .await
        .context("failed to insert like record")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM like_records WHERE user_id = $1 AND node_id = $2")
            .bind(user_id)
            .bind(node_id)
            .execute(&self.pool)
            .await
            .context("failed to delete like record")?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_like_record(&self, user_id: Uuid, node_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM like_records WHERE user_id = $1 AND node_id = $2)",
        )
        .bind(user_id)
        .bind(node_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to check like record")?;
        Ok(exists)
    }

    async fn count_like_records(&self, node_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM like_records WHERE node_id = $1")
            .bind(node_id)
            .fetch_one(&self.pool)
            .await
            .context("failed to count like records")?;
        Ok(count)
    }

    async fn execute_batch(&self, batch: DeleteBatch) -> Result<()> {
        match self.run_batch(&batch).await {
            Ok(()) => Ok(()),
            Err(err) if batch.idempotent => {
                warn!(
                    error = %err,
                    statements = batch.statements.len(),
                    "delete batch failed, retrying once"
                );
                self.run_batch(&batch).await
            }
            Err(err) => Err(err),
        }
    }
}
