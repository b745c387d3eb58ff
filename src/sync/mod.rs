//! Live synchronization of tracking documents.
//!
//! A sync instance owns exactly one store subscription for its scope and
//! folds the delivered full-replacement snapshots into an in-memory state
//! that consumers read. There is no merging: the latest snapshot wins.
//! Teardown is deterministic — stopping (or dropping) the sync aborts its
//! task, which drops the subscription and thereby the store-side listener.

pub mod writer;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{ShowId, UserId};
use crate::models::tracking::TvShowTracking;
use crate::store::{LibrarySnapshot, SnapshotEvent, StoreError, TrackingStore};

pub use writer::{ShowRef, TrackingWriter, WriteError, WriteOutcome};

/// Who the engine is synchronizing for.
///
/// Always passed in explicitly; the engine has no ambient notion of a
/// signed-in user. Guest contexts produce empty, non-subscribed state
/// without any store traffic.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    user: Option<UserId>,
}

impl AuthContext {
    #[must_use]
    pub const fn authenticated(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    #[must_use]
    pub const fn guest() -> Self {
        Self { user: None }
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }
}

/// Health of a sync instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncStatus {
    /// No live subscription (guest session, or sync stopped).
    #[default]
    NotSubscribed,
    Live,
    /// The subscription reported an error; the held data is the last-known
    /// state and may be stale.
    Degraded { message: String },
}

/// Consumer-visible state of a library-wide sync.
#[derive(Debug, Clone, Default)]
pub struct LibraryState {
    pub shows: LibrarySnapshot,
    pub status: SyncStatus,
}

/// Consumer-visible state of a single-show sync.
#[derive(Debug, Clone, Default)]
pub struct ShowState {
    pub tracking: Option<TvShowTracking>,
    pub status: SyncStatus,
}

pub(crate) struct SyncShared {
    pub(crate) store: Arc<dyn TrackingStore>,
    pub(crate) user: Option<UserId>,
    pub(crate) state: RwLock<LibraryState>,
    revision: watch::Sender<u64>,
}

impl SyncShared {
    pub(crate) fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

/// Sync over *all* of a user's show-tracking documents — the dashboard
/// scope. For a detail view over one show, use [`ShowSync`].
pub struct LibrarySync {
    shared: Arc<SyncShared>,
    task: Option<JoinHandle<()>>,
}

impl LibrarySync {
    /// Starts syncing for the given context.
    ///
    /// Authenticated contexts open one `subscribe_all` subscription; guests
    /// get an immediate empty state and no subscription at all.
    pub async fn start(
        store: Arc<dyn TrackingStore>,
        auth: &AuthContext,
    ) -> Result<Self, StoreError> {
        let (revision, _) = watch::channel(0);
        let shared = Arc::new(SyncShared {
            store: Arc::clone(&store),
            user: auth.user().cloned(),
            state: RwLock::new(LibraryState::default()),
            revision,
        });

        let Some(user) = auth.user() else {
            debug!("guest session, tracking sync stays empty");
            return Ok(Self { shared, task: None });
        };

        let mut subscription = store.subscribe_all(user).await?;
        shared.state.write().await.status = SyncStatus::Live;

        let task_shared = Arc::clone(&shared);
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                match event {
                    SnapshotEvent::Snapshot(shows) => {
                        let mut state = task_shared.state.write().await;
                        // Full replacement: in-flight partial state is
                        // discarded, never merged field by field.
                        state.shows = shows;
                        state.status = SyncStatus::Live;
                    }
                    SnapshotEvent::Error(message) => {
                        warn!(%message, "tracking subscription error");
                        task_shared.state.write().await.status =
                            SyncStatus::Degraded { message };
                    }
                }
                task_shared.bump();
            }
            debug!("tracking subscription closed");
        });

        Ok(Self {
            shared,
            task: Some(task),
        })
    }

    /// Current state, cloned out.
    pub async fn state(&self) -> LibraryState {
        self.shared.state.read().await.clone()
    }

    /// Watch channel ticking on every state change; lets consumers await
    /// updates instead of polling.
    #[must_use]
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Write handle sharing this sync's optimistic state.
    #[must_use]
    pub fn writer(&self) -> TrackingWriter {
        TrackingWriter::new(Arc::clone(&self.shared))
    }

    /// Tears the subscription down and marks the state unsubscribed.
    ///
    /// Awaits the sync task's cancellation, so the store-side listener is
    /// guaranteed gone when this returns.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.shared.state.write().await.status = SyncStatus::NotSubscribed;
        self.shared.bump();
    }
}

impl Drop for LibrarySync {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Sync scoped to a single show's tracking document.
pub struct ShowSync {
    state: Arc<RwLock<ShowState>>,
    revision: watch::Sender<u64>,
    task: Option<JoinHandle<()>>,
}

impl ShowSync {
    pub async fn start(
        store: Arc<dyn TrackingStore>,
        auth: &AuthContext,
        show: ShowId,
    ) -> Result<Self, StoreError> {
        let (revision, _) = watch::channel(0);
        let state = Arc::new(RwLock::new(ShowState::default()));

        let Some(user) = auth.user() else {
            debug!(%show, "guest session, show sync stays empty");
            return Ok(Self {
                state,
                revision,
                task: None,
            });
        };

        let mut subscription = store.subscribe_one(user, show).await?;
        state.write().await.status = SyncStatus::Live;

        let task_state = Arc::clone(&state);
        let task_revision = revision.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                match event {
                    SnapshotEvent::Snapshot(tracking) => {
                        let mut state = task_state.write().await;
                        state.tracking = tracking;
                        state.status = SyncStatus::Live;
                    }
                    SnapshotEvent::Error(message) => {
                        warn!(%message, "show subscription error");
                        task_state.write().await.status = SyncStatus::Degraded { message };
                    }
                }
                task_revision.send_modify(|rev| *rev += 1);
            }
        });

        Ok(Self {
            state,
            revision,
            task: Some(task),
        })
    }

    pub async fn state(&self) -> ShowState {
        self.state.read().await.clone()
    }

    #[must_use]
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.state.write().await.status = SyncStatus::NotSubscribed;
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl Drop for ShowSync {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
