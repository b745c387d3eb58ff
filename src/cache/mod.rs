//! Staleness-windowed cache in front of the catalog.
//!
//! Show metadata is expensive to fetch and changes rarely; this cache
//! memoizes it per key with a freshness window. Concurrent readers of the
//! same key share a single in-flight fetch instead of issuing duplicates,
//! and a failed re-fetch falls back to the last-known-good value when one
//! exists (stale-while-error).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clients::catalog::{CatalogError, CatalogSource};
use crate::domain::ShowId;
use crate::models::catalog::{EpisodeMetadata, ShowMetadata};

/// Error surfaced when no metadata can be produced at all: the fetch failed
/// and there is no cached value to fall back to. Callers degrade to showing
/// raw watched counts without percentages.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata unavailable for show {show}: {source}")]
    Unavailable {
        show: ShowId,
        source: CatalogError,
    },
}

struct Cached<T> {
    value: T,
    /// `None` after explicit invalidation: the value is still usable as a
    /// stale fallback but no longer counts as fresh.
    fetched_at: Option<Instant>,
}

struct Slot<T> {
    cached: Option<Cached<T>>,
    /// Per-key gate: whoever holds it performs the fetch, everyone else
    /// waits and re-reads.
    gate: Arc<Mutex<()>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            cached: None,
            gate: Arc::new(Mutex::new(())),
        }
    }
}

struct CacheTable<K, T> {
    staleness: Duration,
    slots: Mutex<HashMap<K, Slot<T>>>,
}

impl<K: Eq + Hash + Copy, T: Clone> CacheTable<K, T> {
    fn new(staleness: Duration) -> Self {
        Self {
            staleness,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, cached: &Cached<T>) -> bool {
        cached
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.staleness)
    }

    async fn fresh_value(&self, key: K) -> Option<T> {
        let slots = self.slots.lock().await;
        let cached = slots.get(&key)?.cached.as_ref()?;
        self.is_fresh(cached).then(|| cached.value.clone())
    }

    /// Last-known value regardless of freshness. Never fetches.
    async fn peek(&self, key: K) -> Option<T> {
        let slots = self.slots.lock().await;
        Some(slots.get(&key)?.cached.as_ref()?.value.clone())
    }

    async fn mark_stale(&self, key: K) {
        let mut slots = self.slots.lock().await;
        if let Some(cached) = slots.get_mut(&key).and_then(|s| s.cached.as_mut()) {
            cached.fetched_at = None;
        }
    }

    async fn get_or_fetch<F>(&self, key: K, fetch: F) -> Result<T, CatalogError>
    where
        F: Future<Output = Result<T, CatalogError>>,
    {
        let gate = {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(key).or_default();
            if let Some(cached) = &slot.cached
                && self.is_fresh(cached)
            {
                return Ok(cached.value.clone());
            }
            Arc::clone(&slot.gate)
        };

        let _fetching = gate.lock().await;

        // A concurrent holder of the gate may have refreshed the slot while
        // we waited for it.
        if let Some(value) = self.fresh_value(key).await {
            return Ok(value);
        }

        match fetch.await {
            Ok(value) => {
                let mut slots = self.slots.lock().await;
                slots.entry(key).or_default().cached = Some(Cached {
                    value: value.clone(),
                    fetched_at: Some(Instant::now()),
                });
                Ok(value)
            }
            Err(err) => match self.peek(key).await {
                Some(stale) => {
                    warn!(error = %err, "catalog fetch failed, serving stale metadata");
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }
}

/// Memoizing front for a [`CatalogSource`].
///
/// Keys are shows (for show-level metadata) and (show, season) pairs (for
/// episode lists); both tables share the same staleness window.
pub struct MetadataCache {
    source: Arc<dyn CatalogSource>,
    shows: CacheTable<ShowId, ShowMetadata>,
    seasons: CacheTable<(ShowId, i32), Vec<EpisodeMetadata>>,
}

impl MetadataCache {
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, staleness: Duration) -> Self {
        Self {
            source,
            shows: CacheTable::new(staleness),
            seasons: CacheTable::new(staleness),
        }
    }

    /// Returns show metadata, fetching from the catalog when the cached
    /// entry is missing or stale.
    pub async fn get_or_fetch(&self, show: ShowId) -> Result<ShowMetadata, MetadataError> {
        self.shows
            .get_or_fetch(show, self.source.show(show))
            .await
            .map_err(|source| MetadataError::Unavailable { show, source })
    }

    /// Returns one season's episode list, fetching when missing or stale.
    pub async fn get_or_fetch_season(
        &self,
        show: ShowId,
        season: i32,
    ) -> Result<Vec<EpisodeMetadata>, MetadataError> {
        self.seasons
            .get_or_fetch((show, season), self.source.season_episodes(show, season))
            .await
            .map_err(|source| MetadataError::Unavailable { show, source })
    }

    /// Last-known show metadata without fetching, fresh or not.
    pub async fn peek(&self, show: ShowId) -> Option<ShowMetadata> {
        self.shows.peek(show).await
    }

    /// Last-known episode list without fetching, fresh or not.
    pub async fn peek_season(&self, show: ShowId, season: i32) -> Option<Vec<EpisodeMetadata>> {
        self.seasons.peek((show, season)).await
    }

    /// Marks every entry for `show` stale so the next read re-fetches.
    ///
    /// Called on tracking-document writes: cached values derived from
    /// watched state must not outlive the state they were computed from.
    pub async fn invalidate(&self, show: ShowId) {
        debug!(%show, "invalidating cached metadata");
        self.shows.mark_stale(show).await;
        let keys: Vec<(ShowId, i32)> = {
            let slots = self.seasons.slots.lock().await;
            slots.keys().filter(|(s, _)| *s == show).copied().collect()
        };
        for key in keys {
            self.seasons.mark_stale(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted catalog: counts fetches, optionally delays, and fails when
    /// told to.
    struct ScriptedCatalog {
        show_calls: AtomicUsize,
        season_calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
        delay: Duration,
    }

    impl ScriptedCatalog {
        fn new() -> Self {
            Self {
                show_calls: AtomicUsize::new(0),
                season_calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn metadata(total: u32) -> ShowMetadata {
            ShowMetadata {
                total_episodes: Some(total),
                avg_runtime: Some(42),
                seasons: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for ScriptedCatalog {
        async fn show(&self, id: ShowId) -> Result<ShowMetadata, CatalogError> {
            let call = self.show_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(CatalogError::NotFound(id));
            }
            Ok(Self::metadata(10 + u32::try_from(call).unwrap()))
        }

        async fn season_episodes(
            &self,
            id: ShowId,
            _season: i32,
        ) -> Result<Vec<EpisodeMetadata>, CatalogError> {
            self.season_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CatalogError::NotFound(id));
            }
            Ok(Vec::new())
        }
    }

    fn cache_over(source: &Arc<ScriptedCatalog>, staleness: Duration) -> MetadataCache {
        MetadataCache::new(Arc::clone(source) as Arc<dyn CatalogSource>, staleness)
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_refetching() {
        let source = Arc::new(ScriptedCatalog::new());
        let cache = cache_over(&source, Duration::from_secs(600));

        let first = cache.get_or_fetch(ShowId::new(1)).await.unwrap();
        let second = cache.get_or_fetch(ShowId::new(1)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.show_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_fetch() {
        let source = Arc::new(ScriptedCatalog::with_delay(Duration::from_millis(50)));
        let cache = Arc::new(cache_over(&source, Duration::from_secs(600)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.get_or_fetch(ShowId::new(1)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(source.show_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entries_trigger_refetch() {
        let source = Arc::new(ScriptedCatalog::new());
        let cache = cache_over(&source, Duration::ZERO);

        cache.get_or_fetch(ShowId::new(1)).await.unwrap();
        cache.get_or_fetch(ShowId::new(1)).await.unwrap();

        assert_eq!(source.show_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refetch_serves_last_known_good() {
        let source = Arc::new(ScriptedCatalog::new());
        let cache = cache_over(&source, Duration::ZERO);

        let first = cache.get_or_fetch(ShowId::new(1)).await.unwrap();
        source.set_fail(true);
        let fallback = cache.get_or_fetch(ShowId::new(1)).await.unwrap();

        assert_eq!(first, fallback);
    }

    #[tokio::test]
    async fn fetch_failure_without_fallback_is_unavailable() {
        let source = Arc::new(ScriptedCatalog::new());
        source.set_fail(true);
        let cache = cache_over(&source, Duration::from_secs(600));

        let result = cache.get_or_fetch(ShowId::new(1)).await;
        assert!(matches!(
            result,
            Err(MetadataError::Unavailable { show, .. }) if show == ShowId::new(1)
        ));
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let source = Arc::new(ScriptedCatalog::new());
        let cache = cache_over(&source, Duration::from_secs(600));

        cache.get_or_fetch(ShowId::new(1)).await.unwrap();
        cache.get_or_fetch_season(ShowId::new(1), 1).await.unwrap();
        cache.invalidate(ShowId::new(1)).await;
        cache.get_or_fetch(ShowId::new(1)).await.unwrap();
        cache.get_or_fetch_season(ShowId::new(1), 1).await.unwrap();

        assert_eq!(source.show_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.season_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn peek_never_fetches() {
        let source = Arc::new(ScriptedCatalog::new());
        let cache = cache_over(&source, Duration::from_secs(600));

        assert!(cache.peek(ShowId::new(1)).await.is_none());
        cache.get_or_fetch(ShowId::new(1)).await.unwrap();
        assert!(cache.peek(ShowId::new(1)).await.is_some());
        assert_eq!(source.show_calls.load(Ordering::SeqCst), 1);
    }
}
