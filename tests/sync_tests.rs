//! Subscription and synchronization semantics against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use trackarr::domain::{EpisodeKey, ShowId, UserId};
use trackarr::models::tracking::WatchedEpisode;
use trackarr::store::{InMemoryTrackingStore, TrackingStore};
use trackarr::sync::{AuthContext, LibraryState, LibrarySync, ShowSync, SyncStatus};

fn watched(show: ShowId, season: i32, episode: i32, hour: u32) -> WatchedEpisode {
    let key = EpisodeKey::new(season, episode);
    WatchedEpisode {
        episode_id: i64::from(season) * 100 + i64::from(episode),
        show_id: show,
        key,
        watched_at: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
        name: Some(format!("S{season}E{episode}")),
        air_date: None,
    }
}

/// Awaits sync state satisfying `pred`, driven by the revision channel.
async fn wait_for(sync: &LibrarySync, pred: impl Fn(&LibraryState) -> bool) -> LibraryState {
    let mut revision = sync.revision();
    loop {
        let state = sync.state().await;
        if pred(&state) {
            return state;
        }
        tokio::time::timeout(Duration::from_secs(2), revision.changed())
            .await
            .expect("timed out waiting for sync state")
            .expect("revision channel closed");
    }
}

#[tokio::test]
async fn initial_snapshot_is_delivered_on_subscribe() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");
    let show = ShowId::new(7);
    store
        .upsert_episode(&user, show, watched(show, 1, 1, 20))
        .await
        .unwrap();

    let sync = LibrarySync::start(store, &AuthContext::authenticated(user))
        .await
        .unwrap();

    let state = wait_for(&sync, |s| s.shows.contains_key(&show)).await;
    assert_eq!(state.status, SyncStatus::Live);
    assert_eq!(state.shows[&show].episodes.len(), 1);
}

#[tokio::test]
async fn remote_writes_flow_back_through_the_subscription() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");
    let show = ShowId::new(7);

    let sync = LibrarySync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::authenticated(user.clone()),
    )
    .await
    .unwrap();

    // Simulates another device marking an episode watched.
    store
        .upsert_episode(&user, show, watched(show, 2, 4, 21))
        .await
        .unwrap();

    let state = wait_for(&sync, |s| s.shows.contains_key(&show)).await;
    assert!(state.shows[&show].episodes.contains_key(&EpisodeKey::new(2, 4)));
}

#[tokio::test]
async fn snapshots_replace_state_wholesale() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");
    let show = ShowId::new(7);

    let sync = LibrarySync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::authenticated(user.clone()),
    )
    .await
    .unwrap();

    // Snapshot A: two episodes watched.
    let doc_a = json!({
        "episodes": {
            "1_1": { "episodeId": 101, "tvShowId": 7, "seasonNumber": 1,
                     "episodeNumber": 1, "watchedAt": "2026-03-01T20:00:00Z",
                     "episodeName": null, "episodeAirDate": null },
            "1_2": { "episodeId": 102, "tvShowId": 7, "seasonNumber": 1,
                     "episodeNumber": 2, "watchedAt": "2026-03-01T21:00:00Z",
                     "episodeName": null, "episodeAirDate": null }
        },
        "metadata": { "tvShowName": "Show", "posterPath": null,
                      "lastUpdated": "2026-03-01T21:00:00Z" }
    });
    // Snapshot B: disjoint content, fewer episodes.
    let doc_b = json!({
        "episodes": {
            "3_9": { "episodeId": 309, "tvShowId": 7, "seasonNumber": 3,
                     "episodeNumber": 9, "watchedAt": "2026-03-02T20:00:00Z",
                     "episodeName": null, "episodeAirDate": null }
        },
        "metadata": { "tvShowName": "Show", "posterPath": null,
                      "lastUpdated": "2026-03-02T20:00:00Z" }
    });

    store.insert_raw_document(&user, show, doc_a).await;
    store.insert_raw_document(&user, show, doc_b).await;

    // Whatever arrived first, the final state equals snapshot B alone.
    let state = wait_for(&sync, |s| {
        s.shows
            .get(&show)
            .is_some_and(|t| t.episodes.contains_key(&EpisodeKey::new(3, 9)))
    })
    .await;
    let tracking = &state.shows[&show];
    assert_eq!(tracking.episodes.len(), 1);
    assert!(!tracking.episodes.contains_key(&EpisodeKey::new(1, 1)));
}

#[tokio::test]
async fn subscription_errors_degrade_but_keep_data() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");
    let show = ShowId::new(7);
    store
        .upsert_episode(&user, show, watched(show, 1, 1, 20))
        .await
        .unwrap();

    let sync = LibrarySync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::authenticated(user.clone()),
    )
    .await
    .unwrap();
    wait_for(&sync, |s| s.shows.contains_key(&show)).await;

    store.emit_error(&user, "backend unavailable");

    let state = wait_for(&sync, |s| {
        matches!(s.status, SyncStatus::Degraded { .. })
    })
    .await;
    // Last-known data survives alongside the error state.
    assert!(state.shows.contains_key(&show));
}

#[tokio::test]
async fn guest_sessions_get_empty_state_and_no_subscription() {
    let store = Arc::new(InMemoryTrackingStore::new());

    let sync = LibrarySync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::guest(),
    )
    .await
    .unwrap();

    let state = sync.state().await;
    assert_eq!(state.status, SyncStatus::NotSubscribed);
    assert!(state.shows.is_empty());
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn stopping_the_sync_releases_the_store_listener() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");

    let mut sync = LibrarySync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::authenticated(user),
    )
    .await
    .unwrap();
    assert_eq!(store.listener_count(), 1);

    sync.stop().await;
    assert_eq!(store.listener_count(), 0);
    assert_eq!(sync.state().await.status, SyncStatus::NotSubscribed);
}

#[tokio::test]
async fn malformed_documents_are_invisible_to_consumers() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");
    let good = ShowId::new(7);
    let bad = ShowId::new(8);

    store
        .upsert_episode(&user, good, watched(good, 1, 1, 20))
        .await
        .unwrap();
    store
        .insert_raw_document(&user, bad, json!({ "v1Schema": { "watched": [1, 2, 3] } }))
        .await;

    let sync = LibrarySync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::authenticated(user),
    )
    .await
    .unwrap();

    let state = wait_for(&sync, |s| s.shows.contains_key(&good)).await;
    assert!(!state.shows.contains_key(&bad));
}

#[tokio::test]
async fn show_sync_only_sees_its_own_show() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");
    let mine = ShowId::new(7);
    let other = ShowId::new(8);

    let sync = ShowSync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::authenticated(user.clone()),
        mine,
    )
    .await
    .unwrap();

    store
        .upsert_episode(&user, other, watched(other, 1, 1, 20))
        .await
        .unwrap();
    store
        .upsert_episode(&user, mine, watched(mine, 1, 1, 21))
        .await
        .unwrap();

    let mut revision = sync.revision();
    let state = loop {
        let state = sync.state().await;
        if state.tracking.is_some() {
            break state;
        }
        tokio::time::timeout(Duration::from_secs(2), revision.changed())
            .await
            .expect("timed out waiting for show sync")
            .expect("revision channel closed");
    };

    let tracking = state.tracking.unwrap();
    assert_eq!(tracking.episodes.len(), 1);
    assert_eq!(
        tracking.episodes[&EpisodeKey::new(1, 1)].show_id,
        mine
    );
}

#[tokio::test]
async fn show_sync_sees_deletion_as_absent_document() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let user = UserId::from("u1");
    let show = ShowId::new(7);
    store
        .upsert_episode(&user, show, watched(show, 1, 1, 20))
        .await
        .unwrap();

    let sync = ShowSync::start(
        Arc::clone(&store) as Arc<dyn TrackingStore>,
        &AuthContext::authenticated(user.clone()),
        show,
    )
    .await
    .unwrap();

    store.delete_all_for_show(&user, show).await.unwrap();

    let mut revision = sync.revision();
    loop {
        let state = sync.state().await;
        if state.tracking.is_none() && state.status == SyncStatus::Live {
            break;
        }
        tokio::time::timeout(Duration::from_secs(2), revision.changed())
            .await
            .expect("timed out waiting for deletion")
            .expect("revision channel closed");
    }
}
