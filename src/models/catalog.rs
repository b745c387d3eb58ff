//! Show metadata as served by the external catalog.
//!
//! These are the engine-side shapes; raw API payloads live in
//! [`crate::clients::catalog`] and are converted on receipt.

use chrono::NaiveDate;

/// One season as listed on a show's catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonMetadata {
    pub number: i32,
    pub episode_count: u32,
    /// Premiere date of the season, when announced.
    pub air_date: Option<NaiveDate>,
    pub name: Option<String>,
}

impl SeasonMetadata {
    /// Display name, falling back to `"Season {n}"` when the catalog has
    /// none.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Season {}", self.number))
    }
}

/// One episode from a season's episode list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMetadata {
    pub id: i64,
    pub episode_number: i32,
    pub name: Option<String>,
    pub air_date: Option<NaiveDate>,
}

impl EpisodeMetadata {
    /// Whether the episode has aired on or before `today`.
    ///
    /// Episodes without an announced air date count as unaired.
    #[must_use]
    pub fn aired_by(&self, today: NaiveDate) -> bool {
        self.air_date.is_some_and(|d| d <= today)
    }
}

/// Show-level metadata needed by the progress engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowMetadata {
    pub total_episodes: Option<u32>,
    /// Average episode runtime in minutes, when the catalog reports any.
    pub avg_runtime: Option<u32>,
    pub seasons: Vec<SeasonMetadata>,
}

impl ShowMetadata {
    /// Seasons eligible for progress accounting (`number > 0`).
    pub fn regular_seasons(&self) -> impl Iterator<Item = &SeasonMetadata> {
        self.seasons.iter().filter(|s| s.number > 0)
    }
}
