pub mod catalog;
pub mod progress;
pub mod tracking;

pub use catalog::{EpisodeMetadata, SeasonMetadata, ShowMetadata};
pub use progress::{InProgressShow, SeasonProgress, ShowProgress};
pub use tracking::{
    NextEpisodeConfidence, NextEpisodeInfo, NextEpisodeState, TrackingMetadata, TvShowTracking,
    WatchedEpisode,
};
