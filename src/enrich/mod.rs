//! Dashboard enrichment: tracking state + catalog metadata → display
//! records.
//!
//! The pipeline is read-only and recomputes everything per call. It offers
//! two modes: [`EnrichmentPipeline::snapshot`] builds records from whatever
//! the cache already holds (never blocks on the network), while
//! [`EnrichmentPipeline::enrich`] fetches metadata lazily for exactly the
//! shows in the given state. Presentation layers typically render the
//! snapshot immediately and refine it once `enrich` resolves.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::warn;

use crate::cache::MetadataCache;
use crate::domain::ShowId;
use crate::models::catalog::EpisodeMetadata;
use crate::models::progress::InProgressShow;
use crate::models::tracking::{NextEpisodeState, TvShowTracking};
use crate::progress::{SeasonInventory, compute_next_episode, compute_show_progress};
use crate::sync::LibraryState;

/// Display-ready view over the in-progress shows of one sync state.
#[derive(Debug, Clone)]
pub struct Dashboard {
    /// Sorted by `last_updated` descending: most recently watched first.
    pub shows: Vec<InProgressShow>,
    /// True while tracking data is loaded but metadata is still missing
    /// for at least one show; consumers may render now and refine later.
    pub is_enriching: bool,
}

pub struct EnrichmentPipeline {
    cache: Arc<MetadataCache>,
}

impl EnrichmentPipeline {
    #[must_use]
    pub const fn new(cache: Arc<MetadataCache>) -> Self {
        Self { cache }
    }

    /// Builds the dashboard without touching the network.
    pub async fn snapshot(&self, state: &LibraryState) -> Dashboard {
        self.build_dashboard(state, false).await
    }

    /// Builds the dashboard, fetching metadata for every show in `state`.
    ///
    /// Fetch failures degrade the affected record to counts-only; they
    /// never fail the dashboard.
    pub async fn enrich(&self, state: &LibraryState) -> Dashboard {
        self.build_dashboard(state, true).await
    }

    async fn build_dashboard(&self, state: &LibraryState, fetch: bool) -> Dashboard {
        let today = Utc::now().date_naive();

        let records = join_all(
            state
                .shows
                .iter()
                .map(|(&id, tracking)| self.build_record(id, tracking, fetch, today)),
        )
        .await;

        let missing = records.iter().filter(|(_, enriched)| !enriched).count();
        let mut shows: Vec<InProgressShow> =
            records.into_iter().map(|(record, _)| record).collect();
        shows.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

        Dashboard {
            shows,
            is_enriching: !fetch && missing > 0,
        }
    }

    async fn build_record(
        &self,
        id: ShowId,
        tracking: &TvShowTracking,
        fetch: bool,
        today: chrono::NaiveDate,
    ) -> (InProgressShow, bool) {
        let metadata = if fetch {
            match self.cache.get_or_fetch(id).await {
                Ok(metadata) => Some(metadata),
                Err(err) => {
                    warn!(%id, error = %err, "metadata unavailable, degrading to counts-only");
                    None
                }
            }
        } else {
            self.cache.peek(id).await
        };

        let last_watched = tracking.last_watched().cloned();

        // The active season's episode list feeds both the aired count and
        // the next-episode resolver; other seasons are used only if their
        // list happens to be cached already.
        let active_episodes: Option<Vec<EpisodeMetadata>> =
            match (&metadata, &last_watched) {
                (Some(_), Some(last)) if fetch => self
                    .cache
                    .get_or_fetch_season(id, last.key.season)
                    .await
                    .ok(),
                (Some(_), Some(last)) => self.cache.peek_season(id, last.key.season).await,
                _ => None,
            };

        let mut inventories = Vec::new();
        if let Some(show_metadata) = &metadata {
            for season in &show_metadata.seasons {
                let active = last_watched
                    .as_ref()
                    .is_some_and(|last| last.key.season == season.number);
                let episodes = if active {
                    active_episodes.clone()
                } else {
                    self.cache.peek_season(id, season.number).await
                };
                inventories.push(SeasonInventory::from_metadata(season, episodes));
            }
        }

        let progress = metadata
            .as_ref()
            .map(|_| compute_show_progress(tracking, &inventories, today));

        let next_episode = if tracking.metadata.next_episode.is_known() {
            // Another device already resolved it for this watched state.
            tracking.metadata.next_episode.clone()
        } else {
            match (&metadata, &last_watched, &active_episodes) {
                (Some(show_metadata), Some(last), Some(episodes)) => {
                    compute_next_episode(last.key, episodes, Some(&show_metadata.seasons), today)
                        .map_or(NextEpisodeState::CaughtUp, NextEpisodeState::Upcoming)
                }
                _ => NextEpisodeState::Unknown,
            }
        };

        let estimated_remaining_minutes = match (
            &progress,
            metadata.as_ref().and_then(|m| m.avg_runtime),
        ) {
            (Some(p), Some(runtime)) => Some(p.aired_remaining().saturating_mul(runtime)),
            _ => None,
        };

        let enriched = metadata.is_some();
        let record = InProgressShow {
            show_id: id,
            name: tracking.metadata.show_name.clone(),
            poster_path: tracking.metadata.poster_path.clone(),
            last_updated: tracking.metadata.last_updated,
            watched_count: u32::try_from(tracking.watched_count()).unwrap_or(u32::MAX),
            progress,
            next_episode,
            last_watched,
            estimated_remaining_minutes,
        };

        (record, enriched)
    }
}
