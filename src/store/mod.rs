//! Access to the remote tracking-document store.
//!
//! The hosted store is abstracted behind [`TrackingStore`]: fetches, writes
//! keyed by the composite episode key, and push subscriptions delivering
//! full-replacement snapshots. Implementers may back the subscription with
//! any push or long-poll mechanism; [`memory::InMemoryTrackingStore`] is the
//! channel-backed reference implementation used by the test suite.

pub mod document;
pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::domain::{EpisodeKey, ShowId, UserId};
use crate::models::tracking::{TrackingMetadata, TvShowTracking, WatchedEpisode};

pub use memory::InMemoryTrackingStore;

/// Full state of one user's tracked shows.
pub type LibrarySnapshot = HashMap<ShowId, TvShowTracking>;

/// Full state of one tracked show; `None` once the document is deleted.
pub type ShowSnapshot = Option<TvShowTracking>;

/// Errors from the store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// One delivery on a subscription: either a complete replacement snapshot
/// for the subscribed scope, or a backend error. Errors do not end the
/// subscription; the last-known data stays valid, just possibly stale.
#[derive(Debug, Clone)]
pub enum SnapshotEvent<T> {
    Snapshot(T),
    Error(String),
}

/// Live subscription to a store scope.
///
/// Snapshots arrive in the order the store emitted them. Dropping the
/// subscription unsubscribes deterministically — no dangling listeners.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<SnapshotEvent<T>>,
    _guard: SubscriptionGuard,
}

impl<T> Subscription<T> {
    #[must_use]
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<SnapshotEvent<T>>, guard: SubscriptionGuard) -> Self {
        Self { rx, _guard: guard }
    }

    /// Waits for the next delivery; `None` once the store side shuts down.
    pub async fn next(&mut self) -> Option<SnapshotEvent<T>> {
        self.rx.recv().await
    }
}

/// RAII unsubscribe: runs its teardown exactly once, when dropped.
pub struct SubscriptionGuard {
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    #[must_use]
    pub(crate) fn new(on_drop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_drop: Some(Box::new(on_drop)),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(teardown) = self.on_drop.take() {
            teardown();
        }
    }
}

/// The per-user, per-show tracking document store.
///
/// Writes are last-writer-wins at the store; the engine adds no locking or
/// versioning on top. All episode-level operations address the single
/// composite key carried by the episode value.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn fetch_one(
        &self,
        user: &UserId,
        show: ShowId,
    ) -> Result<Option<TvShowTracking>, StoreError>;

    async fn fetch_all(&self, user: &UserId) -> Result<LibrarySnapshot, StoreError>;

    /// Subscribes to every tracking document of `user`.
    async fn subscribe_all(
        &self,
        user: &UserId,
    ) -> Result<Subscription<LibrarySnapshot>, StoreError>;

    /// Subscribes to a single show's tracking document.
    async fn subscribe_one(
        &self,
        user: &UserId,
        show: ShowId,
    ) -> Result<Subscription<ShowSnapshot>, StoreError>;

    /// Inserts or replaces one watch event, keyed by `episode.key`.
    async fn upsert_episode(
        &self,
        user: &UserId,
        show: ShowId,
        episode: WatchedEpisode,
    ) -> Result<(), StoreError>;

    /// Replaces the denormalized metadata block of a show's document.
    async fn upsert_metadata(
        &self,
        user: &UserId,
        show: ShowId,
        metadata: TrackingMetadata,
    ) -> Result<(), StoreError>;

    /// Removes one watch event. Removing an absent key is a no-op.
    async fn delete_episode(
        &self,
        user: &UserId,
        show: ShowId,
        key: EpisodeKey,
    ) -> Result<(), StoreError>;

    /// Drops the whole tracking document for a show.
    async fn delete_all_for_show(&self, user: &UserId, show: ShowId) -> Result<(), StoreError>;
}
