//! Season- and show-level completion accounting.
//!
//! Pure functions: callers pass `today` explicitly, so identical inputs
//! always produce identical outputs and the cache layer may memoize results.

use chrono::NaiveDate;

use crate::models::catalog::{EpisodeMetadata, SeasonMetadata};
use crate::models::progress::{SeasonProgress, ShowProgress};
use crate::models::tracking::TvShowTracking;

/// Everything known about one season at aggregation time.
///
/// The per-episode list is optional: the pipeline loads episode lists
/// lazily, and aggregation must still produce sound figures for seasons
/// whose list has not been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonInventory {
    pub number: i32,
    pub episode_count: u32,
    pub air_date: Option<NaiveDate>,
    pub episodes: Option<Vec<EpisodeMetadata>>,
}

impl SeasonInventory {
    #[must_use]
    pub fn from_metadata(season: &SeasonMetadata, episodes: Option<Vec<EpisodeMetadata>>) -> Self {
        Self {
            number: season.number,
            episode_count: season.episode_count,
            air_date: season.air_date,
            episodes,
        }
    }

    /// Episodes aired on or before `today`.
    ///
    /// Without a per-episode list this falls back to the declared count,
    /// except that a season whose own premiere date is still in the future
    /// counts zero aired.
    fn aired_count(&self, today: NaiveDate) -> u32 {
        match &self.episodes {
            Some(list) => {
                let aired = list.iter().filter(|e| e.aired_by(today)).count();
                u32::try_from(aired).unwrap_or(u32::MAX).min(self.episode_count)
            }
            None => match self.air_date {
                Some(premiere) if premiere > today => 0,
                _ => self.episode_count,
            },
        }
    }
}

fn percentage(watched: u32, aired: u32) -> u8 {
    if aired == 0 {
        return 0;
    }
    let pct = (f64::from(watched) / f64::from(aired) * 100.0).round();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = pct.clamp(0.0, 100.0) as u8;
    pct
}

/// Computes completion figures for a single season.
///
/// `watched` is clamped to `aired` so the `watched <= aired <= total`
/// invariant holds even when the tracking map and the catalog disagree
/// (e.g. an episode was watched through a source that listed it early).
#[must_use]
pub fn compute_season_progress(
    tracking: &TvShowTracking,
    season: &SeasonInventory,
    today: NaiveDate,
) -> SeasonProgress {
    let watched = tracking
        .episodes
        .keys()
        .filter(|key| key.season == season.number)
        .count();
    let watched = u32::try_from(watched).unwrap_or(u32::MAX);

    let total = season.episode_count;
    let aired = season.aired_count(today).min(total);
    let watched = watched.min(aired);

    SeasonProgress {
        season: season.number,
        watched,
        total,
        aired,
        percentage: percentage(watched, aired),
    }
}

/// Computes show-level completion figures from all non-special seasons.
///
/// Seasons with `number <= 0` (specials) are excluded from every count, no
/// matter how much of them the user has watched.
#[must_use]
pub fn compute_show_progress(
    tracking: &TvShowTracking,
    seasons: &[SeasonInventory],
    today: NaiveDate,
) -> ShowProgress {
    let per_season: Vec<SeasonProgress> = seasons
        .iter()
        .filter(|s| s.number > 0)
        .map(|s| compute_season_progress(tracking, s, today))
        .collect();

    let watched = per_season.iter().map(|s| s.watched).sum();
    let total = per_season.iter().map(|s| s.total).sum();
    let aired = per_season.iter().map(|s| s.aired).sum();

    ShowProgress {
        watched,
        total,
        aired,
        percentage: percentage(watched, aired),
        seasons: per_season,
    }
}
