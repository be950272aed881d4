//! Decision cache implementation
//!
//! Process-local memoization of per-user verification and whitelist lookups so
//! the message gate does not hit the store on every message. Only positive
//! results are cached: a negative entry could keep blocking a user who just
//! completed verification. Expiry is a coarse wholesale flush once the cache
//! age exceeds the TTL.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct CacheInner {
    verified: HashSet<(i64, i64)>,
    whitelisted: HashSet<i64>,
    last_flush: Instant,
}

/// Process-local cache of positive gate decisions
#[derive(Debug)]
pub struct DecisionCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
}

impl DecisionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                verified: HashSet::new(),
                whitelisted: HashSet::new(),
                last_flush: Instant::now(),
            }),
            ttl,
        }
    }

    /// Whether a positive verified result is cached for (user, group)
    pub fn is_verified(&self, user_id: i64, group_id: i64) -> bool {
        let mut inner = self.inner.lock().expect("decision cache poisoned");
        Self::flush_if_stale(&mut inner, self.ttl);
        inner.verified.contains(&(user_id, group_id))
    }

    /// Record a positive verified result
    pub fn mark_verified(&self, user_id: i64, group_id: i64) {
        let mut inner = self.inner.lock().expect("decision cache poisoned");
        Self::flush_if_stale(&mut inner, self.ttl);
        inner.verified.insert((user_id, group_id));
        debug!(user_id = user_id, group_id = group_id, "Cached verified status");
    }

    /// Drop the verified entry for (user, group)
    pub fn invalidate_verified(&self, user_id: i64, group_id: i64) {
        let mut inner = self.inner.lock().expect("decision cache poisoned");
        inner.verified.remove(&(user_id, group_id));
        debug!(user_id = user_id, group_id = group_id, "Invalidated verified cache entry");
    }

    /// Whether a positive whitelist result is cached for a user
    pub fn is_whitelisted(&self, user_id: i64) -> bool {
        let mut inner = self.inner.lock().expect("decision cache poisoned");
        Self::flush_if_stale(&mut inner, self.ttl);
        inner.whitelisted.contains(&user_id)
    }

    /// Record a positive whitelist result
    pub fn mark_whitelisted(&self, user_id: i64) {
        let mut inner = self.inner.lock().expect("decision cache poisoned");
        Self::flush_if_stale(&mut inner, self.ttl);
        inner.whitelisted.insert(user_id);
        debug!(user_id = user_id, "Cached whitelist status");
    }

    /// Drop the whitelist entry for a user
    pub fn invalidate_whitelisted(&self, user_id: i64) {
        let mut inner = self.inner.lock().expect("decision cache poisoned");
        inner.whitelisted.remove(&user_id);
        debug!(user_id = user_id, "Invalidated whitelist cache entry");
    }

    fn flush_if_stale(inner: &mut CacheInner, ttl: Duration) {
        if inner.last_flush.elapsed() > ttl {
            inner.verified.clear();
            inner.whitelisted.clear();
            inner.last_flush = Instant::now();
            debug!("Decision cache flushed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_results_are_cached() {
        let cache = DecisionCache::new(Duration::from_secs(300));
        assert!(!cache.is_verified(1, -100));

        cache.mark_verified(1, -100);
        assert!(cache.is_verified(1, -100));
        assert!(!cache.is_verified(1, -200));

        cache.mark_whitelisted(2);
        assert!(cache.is_whitelisted(2));
        assert!(!cache.is_whitelisted(3));
    }

    #[test]
    fn test_invalidation_is_per_key() {
        let cache = DecisionCache::new(Duration::from_secs(300));
        cache.mark_verified(1, -100);
        cache.mark_verified(1, -200);

        cache.invalidate_verified(1, -100);
        assert!(!cache.is_verified(1, -100));
        assert!(cache.is_verified(1, -200));
    }

    #[test]
    fn test_wholesale_flush_after_ttl() {
        let cache = DecisionCache::new(Duration::from_millis(10));
        cache.mark_verified(1, -100);
        cache.mark_whitelisted(2);

        std::thread::sleep(Duration::from_millis(25));

        assert!(!cache.is_verified(1, -100));
        assert!(!cache.is_whitelisted(2));
    }
}
