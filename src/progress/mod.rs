pub mod aggregator;
pub mod next_episode;

pub use aggregator::{SeasonInventory, compute_season_progress, compute_show_progress};
pub use next_episode::compute_next_episode;
