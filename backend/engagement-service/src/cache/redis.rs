use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::CacheConn;

/// Cache connection backed by a shared Redis [`ConnectionManager`].
///
/// The manager is cheap to clone and reconnects internally; each operation
/// clones it instead of holding a lock across awaits.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("failed to construct Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl CacheConn for RedisCache {
    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(key).await.context("redis GET failed")?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: i64, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .context("redis SETEX failed")?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await.context("redis INCRBY failed")?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .expire(key, ttl_secs)
            .await
            .context("redis EXPIRE failed")?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys.to_vec()).await.context("redis DEL failed")?;
        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn
            .zscore(key, member)
            .await
            .context("redis ZSCORE failed")?;
        Ok(score)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(key, member, score)
            .await
            .context("redis ZADD failed")?;
        Ok(())
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut conn = self.conn.clone();
        let score: f64 = conn
            .zincr(key, member, delta)
            .await
            .context("redis ZINCRBY failed")?;
        Ok(score)
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let entries: Vec<(String, f64)> = conn
            .zrevrange_withscores(key, start, stop)
            .await
            .context("redis ZREVRANGE failed")?;
        Ok(entries)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zrem(key, member).await.context("redis ZREM failed")?;
        Ok(())
    }

    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .context("redis SCAN failed")?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis PING failed")?;
        Ok(())
    }
}
