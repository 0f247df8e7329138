pub mod counters;
pub mod memory;
pub mod ranking;
pub mod redis;

pub use counters::CounterCache;
pub use memory::MemoryCache;
pub use ranking::RankingIndex;
pub use self::redis::RedisCache;

use anyhow::Result;

/// Narrow async contract over the cache server, covering exactly the
/// operations the counter cache and the ranking index use. Implemented by
/// [`RedisCache`] in production and [`MemoryCache`] for tests and local
/// development.
#[async_trait::async_trait]
pub trait CacheConn: Send + Sync {
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// SET with an expiry in seconds.
    async fn set_ex(&self, key: &str, value: i64, ttl_secs: u64) -> Result<()>;

    /// Atomic single-key increment; creates the key at `delta` when absent.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()>;

    async fn del(&self, keys: &[String]) -> Result<()>;

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// Members ordered by descending score. `stop = -1` means "to the end".
    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>>;

    async fn zrem(&self, key: &str, member: &str) -> Result<()>;

    /// All keys matching a glob pattern (`*` wildcard only).
    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<()>;
}
