//! Optimistic write path for watch events.
//!
//! Every mutation follows the same three-state lifecycle: the local state
//! is updated first (pending), then the store write runs; success commits,
//! failure restores the exact prior in-memory value (rolled back) so the UI
//! never keeps showing progress that was never durably recorded.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::MetadataCache;
use crate::domain::{EpisodeKey, ShowId};
use crate::models::tracking::{
    NextEpisodeState, TrackingMetadata, TvShowTracking, WatchedEpisode,
};
use crate::store::StoreError;
use crate::sync::SyncShared;

/// Identity of the show a write targets, used to seed the document's
/// denormalized metadata on first track.
#[derive(Debug, Clone)]
pub struct ShowRef {
    pub id: ShowId,
    pub name: String,
    pub poster_path: Option<String>,
}

/// Terminal state of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// The operation would not have changed anything (e.g. un-marking an
    /// episode that was never marked); no store call was made.
    Noop,
}

/// Terminal state of a failed write.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("no authenticated user, write rejected")]
    NotAuthenticated,

    /// The store write failed and the optimistic in-memory change was
    /// reverted to the prior value. Safe to retry.
    #[error("write rolled back: {source}")]
    RolledBack {
        #[source]
        source: StoreError,
    },
}

/// Write handle bound to a [`crate::sync::LibrarySync`]'s state.
pub struct TrackingWriter {
    shared: Arc<SyncShared>,
    cache: Option<Arc<MetadataCache>>,
}

impl TrackingWriter {
    pub(crate) const fn new(shared: Arc<SyncShared>) -> Self {
        Self {
            shared,
            cache: None,
        }
    }

    /// Attaches the metadata cache so writes can invalidate values derived
    /// from watched state.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Marks one episode watched.
    ///
    /// Idempotent from the caller's perspective: re-marking an already
    /// watched episode replaces its `watched_at` but leaves the map size,
    /// and therefore every watched count, unchanged.
    pub async fn mark_watched(
        &self,
        show: &ShowRef,
        episode: WatchedEpisode,
    ) -> Result<WriteOutcome, WriteError> {
        let user = self
            .shared
            .user
            .clone()
            .ok_or(WriteError::NotAuthenticated)?;

        let (prior, metadata) = {
            let mut state = self.shared.state.write().await;
            let prior = state.shows.get(&show.id).cloned();

            let tracking = state.shows.entry(show.id).or_insert_with(|| {
                TvShowTracking::new(TrackingMetadata::new(show.name.clone(), episode.watched_at))
            });
            tracking.metadata.show_name.clone_from(&show.name);
            tracking.metadata.poster_path.clone_from(&show.poster_path);
            tracking.metadata.last_updated = episode.watched_at;
            tracking.metadata.next_episode = NextEpisodeState::Unknown;
            tracking.episodes.insert(episode.key, episode.clone());

            (prior, tracking.metadata.clone())
        };
        self.shared.bump();

        let result = self
            .commit_upsert(&user, show.id, episode, metadata)
            .await;
        self.finish(show.id, prior, result).await
    }

    /// Removes one watch event. Un-marking an episode that is not marked
    /// is a no-op and never reaches the store.
    pub async fn unmark_watched(
        &self,
        show: ShowId,
        key: EpisodeKey,
    ) -> Result<WriteOutcome, WriteError> {
        let user = self
            .shared
            .user
            .clone()
            .ok_or(WriteError::NotAuthenticated)?;

        let (prior, metadata) = {
            let mut state = self.shared.state.write().await;
            let Some(tracking) = state.shows.get_mut(&show) else {
                return Ok(WriteOutcome::Noop);
            };
            if !tracking.episodes.contains_key(&key) {
                return Ok(WriteOutcome::Noop);
            }

            let prior = Some(tracking.clone());
            tracking.episodes.remove(&key);
            tracking.metadata.last_updated = Utc::now();
            tracking.metadata.next_episode = NextEpisodeState::Unknown;
            (prior, tracking.metadata.clone())
        };
        self.shared.bump();

        let result = async {
            self.shared.store.delete_episode(&user, show, key).await?;
            self.shared.store.upsert_metadata(&user, show, metadata).await
        }
        .await;
        self.finish(show, prior, result).await
    }

    /// Stops tracking a show entirely, deleting its document.
    pub async fn stop_tracking(&self, show: ShowId) -> Result<WriteOutcome, WriteError> {
        let user = self
            .shared
            .user
            .clone()
            .ok_or(WriteError::NotAuthenticated)?;

        let prior = {
            let mut state = self.shared.state.write().await;
            match state.shows.remove(&show) {
                Some(doc) => Some(doc),
                None => return Ok(WriteOutcome::Noop),
            }
        };
        self.shared.bump();

        let result = self.shared.store.delete_all_for_show(&user, show).await;
        self.finish(show, prior, result).await
    }

    async fn commit_upsert(
        &self,
        user: &crate::domain::UserId,
        show: ShowId,
        episode: WatchedEpisode,
        metadata: TrackingMetadata,
    ) -> Result<(), StoreError> {
        self.shared.store.upsert_episode(user, show, episode).await?;
        self.shared.store.upsert_metadata(user, show, metadata).await
    }

    /// Commits or rolls back the optimistic change based on the store
    /// result.
    async fn finish(
        &self,
        show: ShowId,
        prior: Option<TvShowTracking>,
        result: Result<(), StoreError>,
    ) -> Result<WriteOutcome, WriteError> {
        match result {
            Ok(()) => {
                if let Some(cache) = &self.cache {
                    cache.invalidate(show).await;
                }
                debug!(%show, "tracking write committed");
                Ok(WriteOutcome::Committed)
            }
            Err(source) => {
                warn!(%show, error = %source, "tracking write failed, rolling back");
                let mut state = self.shared.state.write().await;
                match prior {
                    Some(doc) => {
                        state.shows.insert(show, doc);
                    }
                    None => {
                        state.shows.remove(&show);
                    }
                }
                drop(state);
                self.shared.bump();
                Err(WriteError::RolledBack { source })
            }
        }
    }
}
