//! Next-episode resolution, including season rollover.

use chrono::NaiveDate;

use crate::domain::EpisodeKey;
use crate::models::catalog::{EpisodeMetadata, SeasonMetadata};
use crate::models::tracking::{NextEpisodeConfidence, NextEpisodeInfo};

/// Computes the episode to watch after `current`, or `None` when caught up.
///
/// Within the current season only aired episodes (air date on or before
/// `today`) are considered, sorted by episode number. When `current` is the
/// last aired episode of its season — or is not present in the aired list —
/// the resolver rolls over to the earliest later season in `all_seasons`,
/// producing a synthetic "episode 1" placeholder: the next season's episode
/// list may not be loaded yet, so the placeholder carries the *season's*
/// air date and a generated title, and is marked
/// [`NextEpisodeConfidence::Approximate`].
///
/// Passing `None` for `all_seasons` disables rollover entirely. That is a
/// degraded-but-valid mode (season-local result or `None`), not an error.
#[must_use]
pub fn compute_next_episode(
    current: EpisodeKey,
    episodes_in_season: &[EpisodeMetadata],
    all_seasons: Option<&[SeasonMetadata]>,
    today: NaiveDate,
) -> Option<NextEpisodeInfo> {
    let mut aired: Vec<&EpisodeMetadata> = episodes_in_season
        .iter()
        .filter(|e| e.aired_by(today))
        .collect();
    aired.sort_by_key(|e| e.episode_number);

    let position = aired
        .iter()
        .position(|e| e.episode_number == current.episode);

    if let Some(pos) = position
        && let Some(next) = aired.get(pos + 1)
    {
        return Some(NextEpisodeInfo {
            season: current.season,
            episode: next.episode_number,
            title: next
                .name
                .clone()
                .unwrap_or_else(|| format!("Episode {}", next.episode_number)),
            air_date: next.air_date,
            confidence: NextEpisodeConfidence::Exact,
        });
    }

    // Last aired episode of the season, or not found in it: roll over to
    // the earliest following season.
    season_rollover(current, all_seasons?)
}

fn season_rollover(current: EpisodeKey, seasons: &[SeasonMetadata]) -> Option<NextEpisodeInfo> {
    let next_season = seasons
        .iter()
        .filter(|s| s.number > current.season && s.number > 0)
        .min_by_key(|s| s.number)?;

    Some(NextEpisodeInfo {
        season: next_season.number,
        episode: 1,
        title: format!("{} Episode 1", next_season.display_name()),
        // Known limitation: the season's premiere date stands in for the
        // episode's own air date until the season episode list is loaded.
        air_date: next_season.air_date,
        confidence: NextEpisodeConfidence::Approximate,
    })
}
