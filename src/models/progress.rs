//! Derived progress figures. Nothing in this module is persisted; every
//! value is recomputed from a tracking document plus catalog metadata.

use chrono::{DateTime, Utc};

use crate::domain::ShowId;
use crate::models::tracking::{NextEpisodeState, WatchedEpisode};

/// Completion figures for one season.
///
/// Invariant: `0 <= watched <= aired <= total`. `percentage` is
/// `round(watched / aired * 100)` clamped to `[0, 100]`, and `0` when
/// nothing has aired — unaired episodes never enter the denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonProgress {
    pub season: i32,
    pub watched: u32,
    pub total: u32,
    pub aired: u32,
    pub percentage: u8,
}

/// Completion figures for a whole show: sums over its non-special seasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowProgress {
    pub watched: u32,
    pub total: u32,
    pub aired: u32,
    pub percentage: u8,
    pub seasons: Vec<SeasonProgress>,
}

impl ShowProgress {
    /// Aired episodes not yet watched.
    #[must_use]
    pub const fn aired_remaining(&self) -> u32 {
        self.aired.saturating_sub(self.watched)
    }
}

/// Display-ready record for the dashboard's in-progress list.
///
/// Entirely derived; built per read by the enrichment pipeline. `progress`
/// is `None` in degraded mode (catalog metadata unavailable), in which case
/// `watched_count` still carries the raw figure.
#[derive(Debug, Clone, PartialEq)]
pub struct InProgressShow {
    pub show_id: ShowId,
    pub name: String,
    pub poster_path: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub watched_count: u32,
    pub progress: Option<ShowProgress>,
    pub next_episode: NextEpisodeState,
    pub last_watched: Option<WatchedEpisode>,
    /// `avg_runtime × aired-but-unwatched`, when both inputs are known.
    pub estimated_remaining_minutes: Option<u32>,
}
