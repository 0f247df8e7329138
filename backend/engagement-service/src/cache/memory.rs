use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use super::CacheConn;

struct StringEntry {
    value: i64,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    // Tracks first-insertion order; equal scores enumerate in this order.
    insertion: Vec<String>,
}

struct ZSetEntry {
    set: SortedSet,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    zsets: HashMap<String, ZSetEntry>,
}

/// In-memory [`CacheConn`] with the same expiry and ordering semantics as
/// the Redis implementation. Backs tests and local development. Ties in
/// ranked enumeration break by insertion order, which is deterministic and
/// stable for unchanged scores.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate a cache outage: every operation fails until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("cache unavailable (simulated outage)");
        }
        Ok(())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn purge_string(inner: &mut Inner, key: &str, now: Instant) {
    if let Some(entry) = inner.strings.get(key) {
        if entry.expires_at.is_some_and(|at| now >= at) {
            inner.strings.remove(key);
        }
    }
}

fn purge_zset(inner: &mut Inner, key: &str, now: Instant) {
    if let Some(entry) = inner.zsets.get(key) {
        if entry.expires_at.is_some_and(|at| now >= at) {
            inner.zsets.remove(key);
        }
    }
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }
    let mut rest = candidate;
    if !rest.starts_with(parts[0]) {
        return false;
    }
    rest = &rest[parts[0].len()..];
    let last = parts[parts.len() - 1];
    if !rest.ends_with(last) {
        return false;
    }
    let mut rest = &rest[..rest.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    true
}

#[async_trait::async_trait]
impl CacheConn for MemoryCache {
    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        purge_string(&mut inner, key, Instant::now());
        Ok(inner.strings.get(key).map(|entry| entry.value))
    }

    async fn set_ex(&self, key: &str, value: i64, ttl_secs: u64) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value,
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        purge_string(&mut inner, key, Instant::now());
        let entry = inner.strings.entry(key.to_string()).or_insert(StringEntry {
            value: 0,
            expires_at: None,
        });
        entry.value += delta;
        Ok(entry.value)
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let deadline = Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64);
        if let Some(entry) = inner.strings.get_mut(key) {
            entry.expires_at = Some(deadline);
        } else if let Some(entry) = inner.zsets.get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        for key in keys {
            inner.strings.remove(key);
            inner.zsets.remove(key);
        }
        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        purge_zset(&mut inner, key, Instant::now());
        Ok(inner
            .zsets
            .get(key)
            .and_then(|entry| entry.set.scores.get(member).copied()))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        purge_zset(&mut inner, key, Instant::now());
        let entry = inner.zsets.entry(key.to_string()).or_insert_with(|| ZSetEntry {
            set: SortedSet::default(),
            expires_at: None,
        });
        if !entry.set.scores.contains_key(member) {
            entry.set.insertion.push(member.to_string());
        }
        entry.set.scores.insert(member.to_string(), score);
        Ok(())
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        purge_zset(&mut inner, key, Instant::now());
        let entry = inner.zsets.entry(key.to_string()).or_insert_with(|| ZSetEntry {
            set: SortedSet::default(),
            expires_at: None,
        });
        if !entry.set.scores.contains_key(member) {
            entry.set.insertion.push(member.to_string());
        }
        let score = entry.set.scores.entry(member.to_string()).or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        purge_zset(&mut inner, key, Instant::now());
        let Some(entry) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<(usize, &String, f64)> = entry
            .set
            .insertion
            .iter()
            .enumerate()
            .filter_map(|(idx, member)| {
                entry.set.scores.get(member).map(|score| (idx, member, *score))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let len = ranked.len() as isize;
        let stop = if stop < 0 { len + stop } else { stop };
        let start = start.max(0);
        if len == 0 || stop < start {
            return Ok(Vec::new());
        }
        let stop = stop.min(len - 1);
        Ok(ranked[start as usize..=stop as usize]
            .iter()
            .map(|(_, member, score)| ((*member).clone(), *score))
            .collect())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.zsets.get_mut(key) {
            entry.set.scores.remove(member);
            entry.set.insertion.retain(|m| m != member);
        }
        Ok(())
    }

    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        inner
            .strings
            .retain(|_, entry| entry.expires_at.map_or(true, |at| now < at));
        inner
            .zsets
            .retain(|_, entry| entry.expires_at.map_or(true, |at| now < at));
        let mut keys: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.zsets.keys())
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expired_entries_read_as_absent() {
        let cache = MemoryCache::new();
        cache.set_ex("k", 7, 10).await.unwrap();
        assert_eq!(cache.get_i64("k").await.unwrap(), Some(7));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get_i64("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_extends_a_live_key() {
        let cache = MemoryCache::new();
        cache.set_ex("k", 1, 10).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.expire("k", 10).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get_i64("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn zrevrange_orders_by_score_then_insertion() {
        let cache = MemoryCache::new();
        cache.zadd("z", "a", 1.0).await.unwrap();
        cache.zadd("z", "b", 3.0).await.unwrap();
        cache.zadd("z", "c", 1.0).await.unwrap();

        let all = cache.zrevrange_withscores("z", 0, -1).await.unwrap();
        assert_eq!(all[0].0, "b");
        // a and c share a score; the earlier insertion stays first and the
        // order is stable across reads
        assert_eq!(all[1].0, "a");
        assert_eq!(all[2].0, "c");
        let again = cache.zrevrange_withscores("z", 0, -1).await.unwrap();
        assert_eq!(all, again);
    }

    #[tokio::test]
    async fn zincr_creates_missing_members() {
        let cache = MemoryCache::new();
        let score = cache.zincr_by("z", "m", 2.0).await.unwrap();
        assert_eq!(score, 2.0);
        assert_eq!(cache.zscore("z", "m").await.unwrap(), Some(2.0));
    }

    #[test]
    fn glob_patterns() {
        assert!(glob_match("post:*:likes", "post:abc:likes"));
        assert!(!glob_match("post:*:likes", "post:abc:commentcount"));
        assert!(!glob_match("post:*:comments", "post:abc:commentcount"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }
}
