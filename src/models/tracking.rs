//! Per-user, per-show tracking records.
//!
//! A [`TvShowTracking`] document holds every watch event for one show plus a
//! denormalized [`TrackingMetadata`] block of expensive-to-recompute values.
//! Documents are owned by the user account; the engine never writes metadata
//! owned by the external catalog.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

use crate::domain::{EpisodeKey, ShowId};

/// One watch event: a user marked an episode as watched.
///
/// Never mutated in place. Re-marking an episode replaces the entry (and its
/// `watched_at`); un-marking deletes it.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedEpisode {
    /// Catalog-assigned episode id.
    pub episode_id: i64,
    pub show_id: ShowId,
    pub key: EpisodeKey,
    pub watched_at: DateTime<Utc>,
    pub name: Option<String>,
    pub air_date: Option<NaiveDate>,
}

/// How trustworthy a next-episode suggestion is.
///
/// Season-rollover placeholders are built before the next season's episode
/// list is loaded, so their air date is the *season's* air date, not the
/// episode's. Consumers should treat `Approximate` dates as provisional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextEpisodeConfidence {
    Exact,
    Approximate,
}

/// The next episode a user should watch.
#[derive(Debug, Clone, PartialEq)]
pub struct NextEpisodeInfo {
    pub season: i32,
    pub episode: i32,
    pub title: String,
    pub air_date: Option<NaiveDate>,
    pub confidence: NextEpisodeConfidence,
}

impl NextEpisodeInfo {
    #[must_use]
    pub const fn key(&self) -> EpisodeKey {
        EpisodeKey::new(self.season, self.episode)
    }
}

/// Cached next-episode value on a tracking document.
///
/// Three-valued on the wire: the field is absent when never computed, `null`
/// when the user is caught up, and an object otherwise. Any write to the
/// document resets this to [`NextEpisodeState::Unknown`], since the
/// resolver's output depends on watched state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NextEpisodeState {
    /// Not yet computed for the current watched state.
    #[default]
    Unknown,
    /// Computed: there is nothing aired left to watch.
    CaughtUp,
    Upcoming(NextEpisodeInfo),
}

impl NextEpisodeState {
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Denormalized per-show values attached to a tracking document.
///
/// This block is a cache: it may be reset or recomputed at any time without
/// affecting watched-episode history.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingMetadata {
    pub show_name: String,
    pub poster_path: Option<String>,
    /// Timestamp of the most recent write to this document; drives the
    /// dashboard's most-recently-watched-first ordering.
    pub last_updated: DateTime<Utc>,
    pub total_episodes: Option<u32>,
    /// Average episode runtime in minutes.
    pub avg_runtime: Option<u32>,
    pub next_episode: NextEpisodeState,
}

impl TrackingMetadata {
    #[must_use]
    pub fn new(show_name: impl Into<String>, last_updated: DateTime<Utc>) -> Self {
        Self {
            show_name: show_name.into(),
            poster_path: None,
            last_updated,
            total_episodes: None,
            avg_runtime: None,
            next_episode: NextEpisodeState::Unknown,
        }
    }
}

/// Everything the engine tracks for one (user, show) pair.
///
/// The episode map is keyed by [`EpisodeKey`]; the key is the sole unique
/// identifier for a watched episode within a show.
#[derive(Debug, Clone, PartialEq)]
pub struct TvShowTracking {
    pub episodes: HashMap<EpisodeKey, WatchedEpisode>,
    pub metadata: TrackingMetadata,
}

impl TvShowTracking {
    #[must_use]
    pub fn new(metadata: TrackingMetadata) -> Self {
        Self {
            episodes: HashMap::new(),
            metadata,
        }
    }

    /// Count of watched episodes outside season 0.
    ///
    /// This is the raw figure shown when catalog metadata is unavailable and
    /// percentages cannot be computed.
    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.episodes.keys().filter(|k| !k.is_special()).count()
    }

    /// The most recently watched episode, by `watched_at`.
    #[must_use]
    pub fn last_watched(&self) -> Option<&WatchedEpisode> {
        self.episodes.values().max_by_key(|e| e.watched_at)
    }
}
