//! Channel-backed reference implementation of [`TrackingStore`].
//!
//! Documents are held as raw JSON values and run through the wire codec on
//! every read, so this store exercises exactly the shape-check and
//! full-snapshot semantics a hosted backend would. Subscriptions get an
//! initial snapshot on registration and a fresh full snapshot after every
//! mutation of their scope.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::domain::{EpisodeKey, ShowId, UserId};
use crate::models::tracking::{TrackingMetadata, TvShowTracking, WatchedEpisode};
use crate::store::{
    LibrarySnapshot, ShowSnapshot, SnapshotEvent, StoreError, Subscription, SubscriptionGuard,
    TrackingStore, document,
};

struct AllListener {
    id: Uuid,
    user: UserId,
    tx: mpsc::UnboundedSender<SnapshotEvent<LibrarySnapshot>>,
}

struct OneListener {
    id: Uuid,
    user: UserId,
    show: ShowId,
    tx: mpsc::UnboundedSender<SnapshotEvent<ShowSnapshot>>,
}

#[derive(Default)]
struct ListenerTable {
    all: Vec<AllListener>,
    one: Vec<OneListener>,
}

type Documents = HashMap<UserId, HashMap<ShowId, Value>>;

/// In-memory tracking store with push subscriptions.
#[derive(Default)]
pub struct InMemoryTrackingStore {
    docs: RwLock<Documents>,
    listeners: Arc<StdMutex<ListenerTable>>,
    fail_writes: AtomicBool,
}

impl InMemoryTrackingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a backend error. Exists so
    /// tests can exercise optimistic-write rollback.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of live subscriptions across all scopes. Drops of
    /// [`Subscription`] handles are reflected here immediately.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let table = self.listeners.lock().expect("listener table poisoned");
        table.all.len() + table.one.len()
    }

    /// Stores a raw document without going through the codec, then notifies
    /// subscribers. Lets tests plant legacy-shaped or partially-written
    /// records.
    pub async fn insert_raw_document(&self, user: &UserId, show: ShowId, value: Value) {
        let mut docs = self.docs.write().await;
        docs.entry(user.clone()).or_default().insert(show, value);
        self.notify(&docs, user, show);
    }

    /// Delivers a backend error event to every subscription of `user`.
    pub fn emit_error(&self, user: &UserId, message: &str) {
        let table = self.listeners.lock().expect("listener table poisoned");
        for listener in table.all.iter().filter(|l| &l.user == user) {
            let _ = listener.tx.send(SnapshotEvent::Error(message.to_string()));
        }
        for listener in table.one.iter().filter(|l| &l.user == user) {
            let _ = listener.tx.send(SnapshotEvent::Error(message.to_string()));
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }

    fn library_snapshot(docs: &Documents, user: &UserId) -> LibrarySnapshot {
        docs.get(user).map_or_else(HashMap::new, |shows| {
            shows
                .iter()
                .filter_map(|(id, value)| Some((*id, document::decode(value)?)))
                .collect()
        })
    }

    fn show_snapshot(docs: &Documents, user: &UserId, show: ShowId) -> ShowSnapshot {
        docs.get(user)
            .and_then(|shows| shows.get(&show))
            .and_then(document::decode)
    }

    /// Pushes fresh snapshots to every listener whose scope covers `show`.
    ///
    /// Called with the document write guard held, so deliveries observe
    /// mutations in the order they were applied.
    fn notify(&self, docs: &Documents, user: &UserId, show: ShowId) {
        let table = self.listeners.lock().expect("listener table poisoned");

        if table.all.iter().any(|l| &l.user == user) {
            let snapshot = Self::library_snapshot(docs, user);
            for listener in table.all.iter().filter(|l| &l.user == user) {
                let _ = listener.tx.send(SnapshotEvent::Snapshot(snapshot.clone()));
            }
        }

        for listener in table
            .one
            .iter()
            .filter(|l| &l.user == user && l.show == show)
        {
            let snapshot = Self::show_snapshot(docs, user, show);
            let _ = listener.tx.send(SnapshotEvent::Snapshot(snapshot));
        }
    }

    fn guard_for(&self, id: Uuid) -> SubscriptionGuard {
        let listeners = Arc::clone(&self.listeners);
        SubscriptionGuard::new(move || {
            let mut table = listeners.lock().expect("listener table poisoned");
            table.all.retain(|l| l.id != id);
            table.one.retain(|l| l.id != id);
        })
    }

    /// Decodes an existing document, or starts a fresh one when the show
    /// was never tracked (or its record fails the shape check).
    fn decode_or_new(
        docs: &mut Documents,
        user: &UserId,
        show: ShowId,
        seed: &TrackingMetadata,
    ) -> TvShowTracking {
        docs.entry(user.clone())
            .or_default()
            .get(&show)
            .and_then(document::decode)
            .unwrap_or_else(|| TvShowTracking::new(seed.clone()))
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn fetch_one(
        &self,
        user: &UserId,
        show: ShowId,
    ) -> Result<Option<TvShowTracking>, StoreError> {
        let docs = self.docs.read().await;
        Ok(Self::show_snapshot(&docs, user, show))
    }

    async fn fetch_all(&self, user: &UserId) -> Result<LibrarySnapshot, StoreError> {
        let docs = self.docs.read().await;
        Ok(Self::library_snapshot(&docs, user))
    }

    async fn subscribe_all(
        &self,
        user: &UserId,
    ) -> Result<Subscription<LibrarySnapshot>, StoreError> {
        // Registration and the initial snapshot happen under the write
        // lock, so no mutation can slip between them.
        let docs = self.docs.write().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let _ = tx.send(SnapshotEvent::Snapshot(Self::library_snapshot(&docs, user)));
        self.listeners
            .lock()
            .expect("listener table poisoned")
            .all
            .push(AllListener {
                id,
                user: user.clone(),
                tx,
            });

        Ok(Subscription::new(rx, self.guard_for(id)))
    }

    async fn subscribe_one(
        &self,
        user: &UserId,
        show: ShowId,
    ) -> Result<Subscription<ShowSnapshot>, StoreError> {
        let docs = self.docs.write().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let _ = tx.send(SnapshotEvent::Snapshot(Self::show_snapshot(
            &docs, user, show,
        )));
        self.listeners
            .lock()
            .expect("listener table poisoned")
            .one
            .push(OneListener {
                id,
                user: user.clone(),
                show,
                tx,
            });

        Ok(Subscription::new(rx, self.guard_for(id)))
    }

    async fn upsert_episode(
        &self,
        user: &UserId,
        show: ShowId,
        episode: WatchedEpisode,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut docs = self.docs.write().await;

        let seed = TrackingMetadata::new(String::new(), episode.watched_at);
        let mut tracking = Self::decode_or_new(&mut docs, user, show, &seed);
        tracking.episodes.insert(episode.key, episode);

        docs.entry(user.clone())
            .or_default()
            .insert(show, document::encode(&tracking));
        self.notify(&docs, user, show);
        Ok(())
    }

    async fn upsert_metadata(
        &self,
        user: &UserId,
        show: ShowId,
        metadata: TrackingMetadata,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut docs = self.docs.write().await;

        let mut tracking = Self::decode_or_new(&mut docs, user, show, &metadata);
        tracking.metadata = metadata;

        docs.entry(user.clone())
            .or_default()
            .insert(show, document::encode(&tracking));
        self.notify(&docs, user, show);
        Ok(())
    }

    async fn delete_episode(
        &self,
        user: &UserId,
        show: ShowId,
        key: EpisodeKey,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut docs = self.docs.write().await;

        let Some(mut tracking) = docs
            .get(user)
            .and_then(|shows| shows.get(&show))
            .and_then(document::decode)
        else {
            return Ok(());
        };

        if tracking.episodes.remove(&key).is_none() {
            return Ok(());
        }

        docs.entry(user.clone())
            .or_default()
            .insert(show, document::encode(&tracking));
        self.notify(&docs, user, show);
        Ok(())
    }

    async fn delete_all_for_show(&self, user: &UserId, show: ShowId) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut docs = self.docs.write().await;

        let removed = docs
            .get_mut(user)
            .is_some_and(|shows| shows.remove(&show).is_some());
        if removed {
            self.notify(&docs, user, show);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn watched(show: ShowId, season: i32, episode: i32) -> WatchedEpisode {
        let key = EpisodeKey::new(season, episode);
        WatchedEpisode {
            episode_id: i64::from(season) * 100 + i64::from(episode),
            show_id: show,
            key,
            watched_at: Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
            name: None,
            air_date: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_fetch_round_trips() {
        let store = InMemoryTrackingStore::new();
        let user = UserId::from("u1");
        let show = ShowId::new(7);

        store
            .upsert_episode(&user, show, watched(show, 1, 1))
            .await
            .unwrap();

        let doc = store.fetch_one(&user, show).await.unwrap().unwrap();
        assert_eq!(doc.episodes.len(), 1);
        assert!(doc.episodes.contains_key(&EpisodeKey::new(1, 1)));
    }

    #[tokio::test]
    async fn delete_episode_removes_only_its_key() {
        let store = InMemoryTrackingStore::new();
        let user = UserId::from("u1");
        let show = ShowId::new(7);

        store
            .upsert_episode(&user, show, watched(show, 1, 1))
            .await
            .unwrap();
        store
            .upsert_episode(&user, show, watched(show, 1, 2))
            .await
            .unwrap();
        store
            .delete_episode(&user, show, EpisodeKey::new(1, 1))
            .await
            .unwrap();

        let doc = store.fetch_one(&user, show).await.unwrap().unwrap();
        assert_eq!(doc.episodes.len(), 1);
        assert!(doc.episodes.contains_key(&EpisodeKey::new(1, 2)));
    }

    #[tokio::test]
    async fn malformed_documents_read_as_absent() {
        let store = InMemoryTrackingStore::new();
        let user = UserId::from("u1");
        let show = ShowId::new(7);

        store
            .insert_raw_document(&user, show, serde_json::json!({ "legacy": true }))
            .await;

        assert!(store.fetch_one(&user, show).await.unwrap().is_none());
        assert!(store.fetch_all(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropping_a_subscription_removes_the_listener() {
        let store = InMemoryTrackingStore::new();
        let user = UserId::from("u1");

        let subscription = store.subscribe_all(&user).await.unwrap();
        assert_eq!(store.listener_count(), 1);
        drop(subscription);
        assert_eq!(store.listener_count(), 0);
    }
}
