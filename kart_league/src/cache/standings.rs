//! Standings cache.
//!
//! Standings are expensive to recompute (every completed match of a mode)
//! and read far more often than they change, so they are cached as JSON per
//! tournament and mode. Any score write invalidates the entry.

use super::store::CacheStore;
use crate::modes::GameMode;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// Default time to live of a cached standings table
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Hit and miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Standings cache over any [`CacheStore`]
#[derive(Clone)]
pub struct StandingsCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl StandingsCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn key(tournament_id: i64, mode: GameMode) -> String {
        format!("standings:{}:{}", tournament_id, mode.code())
    }

    fn tournament_prefix(tournament_id: i64) -> String {
        format!("standings:{}:", tournament_id)
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// A cached value that no longer deserializes counts as a miss.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        tournament_id: i64,
        mode: GameMode,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = Self::key(tournament_id, mode);
        if let Some(raw) = self.store.get(&key).await
            && let Ok(value) = serde_json::from_str(&raw)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute().await?;
        match serde_json::to_string(&value) {
            Ok(raw) => self.store.set(&key, raw, self.ttl).await,
            Err(e) => log::warn!("Could not cache standings {}: {}", key, e),
        }
        Ok(value)
    }

    pub async fn invalidate(&self, tournament_id: i64, mode: GameMode) {
        self.store.delete(&Self::key(tournament_id, mode)).await;
    }

    /// Drop every cached mode of a tournament
    pub async fn invalidate_tournament(&self, tournament_id: i64) -> usize {
        self.store
            .delete_prefix(&Self::tournament_prefix(tournament_id))
            .await
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn cache() -> StandingsCache {
        StandingsCache::new(Arc::new(MemoryStore::new()), DEFAULT_TTL)
    }

    #[tokio::test]
    async fn test_get_or_compute_caches() {
        let cache = cache();
        let first: Result<Vec<i64>, ()> = cache
            .get_or_compute(1, GameMode::Bm, || async { Ok::<_, ()>(vec![3, 1, 2]) })
            .await;
        assert_eq!(first, Ok(vec![3, 1, 2]));

        let second: Result<Vec<i64>, ()> = cache
            .get_or_compute(1, GameMode::Bm, || async { Err::<Vec<i64>, ()>(()) })
            .await;
        assert_eq!(second, Ok(vec![3, 1, 2]));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache();
        let failed: Result<Vec<i64>, &str> = cache
            .get_or_compute(1, GameMode::Mr, || async { Err::<Vec<i64>, _>("db down") })
            .await;
        assert_eq!(failed, Err("db down"));

        let ok: Result<Vec<i64>, &str> = cache
            .get_or_compute(1, GameMode::Mr, || async { Ok::<_, &str>(vec![1]) })
            .await;
        assert_eq!(ok, Ok(vec![1]));
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = cache();
        let _: Result<i32, ()> = cache.get_or_compute(7, GameMode::Gp, || async { Ok::<_, ()>(1) }).await;
        let _: Result<i32, ()> = cache.get_or_compute(7, GameMode::Bm, || async { Ok::<_, ()>(1) }).await;
        cache.invalidate(7, GameMode::Gp).await;

        let recomputed: Result<i32, ()> =
            cache.get_or_compute(7, GameMode::Gp, || async { Ok::<_, ()>(2) }).await;
        assert_eq!(recomputed, Ok(2));

        assert_eq!(cache.invalidate_tournament(7).await, 2);
    }

    #[test]
    fn test_key_format() {
        assert_eq!(StandingsCache::key(12, GameMode::Ta), "standings:12:ta");
    }
}
